// UI strings and labels. ASCII-friendly by default.

use unicode_width::UnicodeWidthStr;

pub const PREFIX_USER: &str = "| ";
pub const PREFIX_ASSISTANT: &str = "> ";
pub const PREFIX_SYSTEM: &str = "# ";

// Shown in the assistant placeholder until the first delta arrives.
pub const TYPING: &str = "...";

pub const INPUT_HINT: &str = "Ask the tutor, Enter to send / Shift+Enter for newline";
pub const BUSY_HINT: &str = "Waiting for the tutor...";

pub const TITLE_CONVERSATIONS: &str = " Conversations ";
pub const TITLE_CHAT: &str = " Tutor ";
pub const TITLE_INPUT: &str = " Message ";

pub fn sidebar_entry(title: &str, unread: usize) -> String {
    if unread == 0 {
        title.to_string()
    } else {
        format!("{} ({})", title, unread)
    }
}

pub fn build_stick_label(scroll: u16) -> String {
    if scroll == 0 {
        "Bottom".to_string()
    } else {
        format!("+{} lines", scroll)
    }
}

// Segments are kept in order and dropped from the end once they no longer fit.
pub fn build_status_line(
    stick: &str,
    focus: &str,
    phase: &str,
    user: &str,
    unread_total: usize,
    max_width: u16,
) -> String {
    let mut segments: Vec<String> = vec![format!("[{}][{}][{}]", stick, focus, phase)];
    segments.push(format!("@{}", user));
    if unread_total > 0 {
        segments.push(format!("Unread:{}", unread_total));
    }
    let hints: [&str; 4] = [
        "Enter: send; Shift+Enter: newline",
        "PgUp/PgDn: scroll",
        "F2: conversations; Tab: focus",
        "Esc: quit",
    ];
    segments.extend(hints.iter().map(|h| h.to_string()));

    let sep = "  |  ";
    let sep_w = UnicodeWidthStr::width(sep);
    let mut out = String::new();
    let mut used = 0usize;
    for (i, seg) in segments.iter().enumerate() {
        let segw = UnicodeWidthStr::width(seg.as_str());
        let addw = segw + if i == 0 { 0 } else { sep_w };
        if used + addw > max_width as usize {
            break;
        }
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(seg);
        used += addw;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_drops_trailing_segments() {
        let full = build_status_line("Bottom", "Input", "idle", "ana", 2, 400);
        assert!(full.starts_with("[Bottom][Input][idle]  |  @ana  |  Unread:2"));
        assert!(full.ends_with("Esc: quit"));

        let narrow = build_status_line("Bottom", "Input", "idle", "ana", 0, 30);
        assert_eq!(narrow, "[Bottom][Input][idle]  |  @ana");
    }

    #[test]
    fn unread_badge() {
        assert_eq!(sidebar_entry("Algebra", 0), "Algebra");
        assert_eq!(sidebar_entry("Algebra", 3), "Algebra (3)");
    }
}
