use ratatui::style::Color;

pub struct Theme {
    pub border_focus: Color,
    pub border_inactive: Color,
    pub chat_border: Color,
    pub sidebar_selected_fg: Color,
    pub sidebar_selected_bg: Color,
    pub unread: Color,
    pub user: Color,
    pub assistant: Color,
    pub system: Color,
    pub hint: Color,
    pub toast_info: Color,
    pub toast_error: Color,
}

pub const THEME: Theme = Theme {
    border_focus: Color::Cyan,
    border_inactive: Color::DarkGray,
    chat_border: Color::DarkGray,
    sidebar_selected_fg: Color::Black,
    sidebar_selected_bg: Color::Cyan,
    unread: Color::Yellow,
    user: Color::Green,
    assistant: Color::Magenta,
    system: Color::Blue,
    hint: Color::DarkGray,
    toast_info: Color::Cyan,
    toast_error: Color::Red,
};
