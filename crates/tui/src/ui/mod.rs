use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};
use tutor_core::llm::{Role, StreamPhase};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::chat::role_prefix;
use crate::app::{App, Focus};
use crate::strings::{
    build_status_line, build_stick_label, sidebar_entry, BUSY_HINT, INPUT_HINT, TITLE_CHAT,
    TITLE_CONVERSATIONS, TITLE_INPUT,
};
use crate::theme::THEME;
use crate::toast::Level;

pub fn draw(f: &mut Frame, app: &mut App) {
    let mut constraints: Vec<Constraint> = Vec::new();
    if app.state.show_sidebar {
        constraints.push(Constraint::Length(28));
    }
    constraints.push(Constraint::Min(10));
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(f.area());
    let main_area = if app.state.show_sidebar {
        app.sidebar_area = Some(chunks[0]);
        draw_sidebar(f, chunks[0], app);
        chunks[1]
    } else {
        app.sidebar_area = None;
        chunks[0]
    };
    draw_main(f, main_area, app);
}

fn inner_rect(area: Rect) -> Rect {
    Rect {
        x: area.x.saturating_add(1),
        y: area.y.saturating_add(1),
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    }
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(THEME.border_focus)
    } else {
        Style::default().fg(THEME.border_inactive)
    }
}

fn draw_sidebar(f: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus == Focus::Sidebar;
    let block = Block::default()
        .title(Span::styled(
            TITLE_CONVERSATIONS,
            Style::default()
                .fg(THEME.unread)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(border_style(focused));
    let inner_h = area.height.saturating_sub(2) as usize;
    let start = app.sidebar_scroll as usize;
    let mut lines: Vec<Line> = Vec::new();
    for (i, c) in app
        .state
        .conversations
        .iter()
        .enumerate()
        .skip(start)
        .take(inner_h)
    {
        let selected = i == app.state.current;
        let prefix = if selected { "> " } else { "  " };
        let unread = app.unread.get(&c.id);
        let style = if selected && focused {
            Style::default()
                .fg(THEME.sidebar_selected_fg)
                .bg(THEME.sidebar_selected_bg)
                .add_modifier(Modifier::BOLD)
        } else if selected {
            Style::default()
                .fg(THEME.border_focus)
                .add_modifier(Modifier::BOLD)
        } else if unread > 0 {
            Style::default().fg(THEME.unread)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{}{}", prefix, sidebar_entry(&c.title, unread)),
            style,
        )));
    }
    f.render_widget(Paragraph::new(lines).block(block), area);

    let inner = inner_rect(area);
    let total = app.state.conversations.len();
    if total > inner.height as usize {
        let mut sb_state = ScrollbarState::new(total).position(start);
        let sb = Scrollbar::default().orientation(ScrollbarOrientation::VerticalRight);
        f.render_stateful_widget(sb, inner, &mut sb_state);
    }
}

fn draw_main(f: &mut Frame, area: Rect, app: &mut App) {
    let inner_width = area.width.saturating_sub(2);
    let input_total_lines = measure_total_lines(&app.input, inner_width).max(1) as u16;
    let target_lines = input_total_lines.min(app.input_max_lines);
    let current = app.input_visible_lines.max(1);
    app.input_visible_lines = match current.cmp(&target_lines) {
        std::cmp::Ordering::Less => current + 1,
        std::cmp::Ordering::Greater => current - 1,
        std::cmp::Ordering::Equal => current,
    };
    let input_height = app.input_visible_lines + 2;

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(input_height),
        ])
        .split(area);

    app.chat_area = Some(main_chunks[0]);
    draw_chat(f, main_chunks[0], app);
    draw_status(f, main_chunks[1], app);
    draw_input(f, main_chunks[2], app, inner_width);
}

fn header_style(role: Role) -> Style {
    let fg = match role {
        Role::User => THEME.user,
        Role::Assistant => THEME.assistant,
        Role::System => THEME.system,
    };
    Style::default().fg(fg).add_modifier(Modifier::BOLD)
}

/// First line to show when the view is `scroll` lines above the bottom.
fn chat_start_offset(total: usize, viewport: usize, scroll: u16) -> usize {
    total
        .saturating_sub(viewport)
        .saturating_sub(scroll as usize)
}

fn draw_chat(f: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default()
        .title(TITLE_CHAT)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(THEME.chat_border));

    let inner = inner_rect(area);
    app.ensure_chat_wrapped(inner.width);
    app.chat_viewport = inner.height;
    let max_scroll = app
        .chat_total_lines
        .saturating_sub(inner.height as usize)
        .min(u16::MAX as usize) as u16;
    app.chat_scroll = app.chat_scroll.min(max_scroll);
    let start = chat_start_offset(app.chat_total_lines, inner.height as usize, app.chat_scroll);

    let mut vis_lines: Vec<Line> = Vec::new();
    let rows = app
        .chat_cache
        .iter()
        .flat_map(|w| w.lines.iter().enumerate().map(move |(i, l)| (w.role, i, l)))
        .skip(start)
        .take(inner.height as usize);
    for (role, i, line) in rows {
        if i == 0 {
            let mut cut = role_prefix(role).len().min(line.len());
            if !line.is_char_boundary(cut) {
                cut = 0;
            }
            vis_lines.push(Line::from(vec![
                Span::styled(line[..cut].to_string(), header_style(role)),
                Span::raw(line[cut..].to_string()),
            ]));
        } else {
            vis_lines.push(Line::from(line.as_str()));
        }
    }
    f.render_widget(Paragraph::new(vis_lines).block(block), area);

    if app.chat_total_lines > inner.height as usize {
        let mut sb_state = ScrollbarState::new(app.chat_total_lines).position(start);
        let sb = Scrollbar::default().orientation(ScrollbarOrientation::VerticalRight);
        f.render_stateful_widget(sb, inner, &mut sb_state);
    }
}

fn phase_label(phase: Option<StreamPhase>) -> &'static str {
    match phase.unwrap_or_default() {
        StreamPhase::Idle => "idle",
        StreamPhase::Streaming => "streaming",
        StreamPhase::Done => "done",
        StreamPhase::Errored => "error",
    }
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let line = match app.toasts.current(Instant::now()) {
        Some(t) => {
            let fg = match t.level {
                Level::Info => THEME.toast_info,
                Level::Error => THEME.toast_error,
            };
            Line::from(Span::styled(
                t.text.clone(),
                Style::default().fg(fg).add_modifier(Modifier::BOLD),
            ))
        }
        None => {
            let focus = match app.focus {
                Focus::Input => "Input",
                Focus::Sidebar => "Conversations",
            };
            let tips = build_status_line(
                &build_stick_label(app.chat_scroll),
                focus,
                phase_label(app.current_view().map(|v| v.phase())),
                app.session.label(),
                app.unread.total(),
                area.width,
            );
            Line::from(Span::styled(tips, Style::default().fg(THEME.hint)))
        }
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_input(f: &mut Frame, area: Rect, app: &App, inner_width: u16) {
    let focused = app.focus == Focus::Input;
    let block = Block::default()
        .title(TITLE_INPUT)
        .borders(Borders::ALL)
        .border_style(border_style(focused));
    let graphemes: Vec<&str> = app.input.graphemes(true).collect();
    let upto = app.input_cursor.min(graphemes.len());
    let (line_idx, col_width) = measure_prefix_line_col(&graphemes, upto, inner_width);
    let offset_y = line_idx.saturating_sub(app.input_visible_lines.saturating_sub(1));

    let para = if app.input.is_empty() {
        let hint = if app.is_streaming() { BUSY_HINT } else { INPUT_HINT };
        Paragraph::new(Line::from(Span::styled(hint, Style::default().fg(THEME.hint))))
            .block(block)
            .wrap(Wrap { trim: false })
    } else {
        Paragraph::new(app.input.clone())
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((offset_y, 0))
    };
    f.render_widget(para, area);

    if focused {
        let cursor_x = area.x + 1 + col_width;
        let cursor_y = area.y + 1 + line_idx.saturating_sub(offset_y);
        f.set_cursor_position(Position::new(cursor_x, cursor_y));
    }
}

fn measure_total_lines(s: &str, width: u16) -> usize {
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    measure_prefix_line_col(&graphemes, graphemes.len(), width).0 as usize + 1
}

fn measure_prefix_line_col(graphemes: &[&str], upto: usize, width: u16) -> (u16, u16) {
    if width == 0 {
        return (0, 0);
    }
    let mut line = 0usize;
    let mut col = 0usize;
    for g in graphemes.iter().take(upto) {
        if *g == "\n" {
            line += 1;
            col = 0;
            continue;
        }
        let w = UnicodeWidthStr::width(*g);
        if col + w > width as usize {
            line += 1;
            col = 0;
        }
        col += w;
    }
    (line as u16, col as u16)
}
