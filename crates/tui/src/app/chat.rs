use textwrap::{wrap, Options};
use tutor_core::llm::{ChatMessage, Role};
use unicode_width::UnicodeWidthStr;

use crate::strings::{PREFIX_ASSISTANT, PREFIX_SYSTEM, PREFIX_USER, TYPING};

use super::{App, WrappedMsg};

pub fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::User => PREFIX_USER,
        Role::Assistant => PREFIX_ASSISTANT,
        Role::System => PREFIX_SYSTEM,
    }
}

impl App {
    /// Re-wraps the current conversation for `width`. Only the last message is
    /// redone when the width and message count are unchanged, which is the
    /// streaming case.
    pub fn ensure_chat_wrapped(&mut self, width: u16) {
        let width = width.max(1);
        let count = self.messages().len();
        if self.chat_wrap_width != width || self.chat_cache.len() != count {
            let cache: Vec<WrappedMsg> = self
                .messages()
                .iter()
                .map(|m| wrap_message(m, width))
                .collect();
            self.chat_cache = cache;
            self.chat_total_lines = self.chat_cache.iter().map(|w| w.lines.len()).sum();
            self.chat_wrap_width = width;
            return;
        }
        let stale = match (self.messages().last(), self.chat_cache.last()) {
            (Some(m), Some(w)) => m.content.len() != w.content_len,
            _ => false,
        };
        if stale {
            if let Some(last) = self.messages().last().map(|m| wrap_message(m, width)) {
                let idx = self.chat_cache.len() - 1;
                self.chat_cache[idx] = last;
                self.chat_total_lines = self.chat_cache.iter().map(|w| w.lines.len()).sum();
            }
        }
    }
}

fn wrap_message(m: &ChatMessage, width: u16) -> WrappedMsg {
    let prefix = role_prefix(m.role);
    let body = if m.is_assistant() && m.content.is_empty() {
        TYPING
    } else {
        m.content.as_str()
    };
    let full = format!("{}{}", prefix, body);
    let indent = " ".repeat(UnicodeWidthStr::width(prefix));
    let opts = Options::new(width as usize).subsequent_indent(&indent);
    let lines = wrap(&full, opts)
        .into_iter()
        .map(|c| c.into_owned())
        .collect::<Vec<_>>();
    WrappedMsg {
        role: m.role,
        content_len: m.content.len(),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_shows_typing_marker() {
        let w = wrap_message(&ChatMessage::assistant(""), 40);
        assert_eq!(w.lines, vec![format!("{}{}", PREFIX_ASSISTANT, TYPING)]);
        assert_eq!(w.content_len, 0);
    }

    #[test]
    fn continuation_lines_are_indented() {
        let w = wrap_message(&ChatMessage::user("alpha beta gamma"), 10);
        assert_eq!(w.lines, vec!["| alpha", "  beta", "  gamma"]);
    }
}
