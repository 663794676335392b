use std::time::{Duration, Instant};

use crossterm::event::{self, Event, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{backend::Backend, layout::Rect, Terminal};
use tracing::info;

use crate::{
    app::{App, Focus},
    ui,
};

const POLL: Duration = Duration::from_millis(50);
const HEARTBEAT: Duration = Duration::from_millis(500);
const WHEEL_LINES: u16 = 3;

fn contains(area: Rect, x: u16, y: u16) -> bool {
    x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
}

pub fn run<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    let mut last_draw = Instant::now();
    loop {
        if app.dirty || last_draw.elapsed() >= HEARTBEAT {
            terminal.draw(|f| ui::draw(f, app))?;
            app.dirty = false;
            last_draw = Instant::now();
        }
        if app.focus == Focus::Input {
            let _ = terminal.show_cursor();
        } else {
            let _ = terminal.hide_cursor();
        }

        if event::poll(POLL)? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Paste(s) => {
                    app.insert_text(&s);
                    app.dirty = true;
                }
                Event::Resize(_, _) => app.dirty = true,
                Event::Mouse(me) => on_mouse(app, me),
                _ => {}
            }
        }

        app.on_tick();

        if app.should_quit {
            app.save_state();
            info!(target: "tui", "quit");
            break;
        }
    }
    Ok(())
}

fn on_mouse(app: &mut App, me: MouseEvent) {
    let (x, y) = (me.column, me.row);
    if app.chat_area.is_some_and(|a| contains(a, x, y)) {
        match me.kind {
            MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
            MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
            MouseEventKind::Down(MouseButton::Left) => {
                app.focus = Focus::Input;
                app.dirty = true;
            }
            _ => {}
        }
        return;
    }
    if !app.state.show_sidebar {
        return;
    }
    let Some(area) = app.sidebar_area.filter(|a| contains(*a, x, y)) else {
        return;
    };
    match me.kind {
        MouseEventKind::ScrollUp => {
            app.sidebar_scroll = app.sidebar_scroll.saturating_sub(1);
            app.dirty = true;
        }
        MouseEventKind::ScrollDown => {
            app.sidebar_scroll = (app.sidebar_scroll + 1).min(app.sidebar_max_scroll());
            app.dirty = true;
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if y > area.y && y + 1 < area.y + area.height {
                let idx = app.sidebar_scroll as usize + (y - (area.y + 1)) as usize;
                app.focus = Focus::Sidebar;
                app.select_conversation(idx);
                app.dirty = true;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_testing_is_half_open() {
        let r = Rect::new(2, 3, 4, 2);
        assert!(contains(r, 2, 3));
        assert!(contains(r, 5, 4));
        assert!(!contains(r, 6, 4));
        assert!(!contains(r, 5, 5));
        assert!(!contains(r, 1, 3));
    }
}
