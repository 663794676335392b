use tracing::{debug, error};
use tutor_core::llm::{ChatError, ChatMessage, StreamPhase};

use crate::toast::Toasts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy;

/// Message list of one conversation plus the state of its in-flight reply.
///
/// While streaming, the last message is the assistant placeholder and every
/// update replaces it; the list never grows per delta.
#[derive(Debug, Default)]
pub struct ChatView {
    messages: Vec<ChatMessage>,
    phase: StreamPhase,
}

impl ChatView {
    pub fn with_history(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            phase: StreamPhase::Idle,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase.is_busy()
    }

    /// Appends the user's message and an empty assistant placeholder.
    /// Returns the history to send (without the placeholder).
    pub fn begin(&mut self, text: &str) -> Result<Vec<ChatMessage>, Busy> {
        if self.is_streaming() {
            return Err(Busy);
        }
        self.messages.push(ChatMessage::user(text));
        let request = self
            .messages
            .iter()
            .filter(|m| !(m.is_assistant() && m.content.trim().is_empty()))
            .cloned()
            .collect();
        self.messages.push(ChatMessage::assistant(String::new()));
        self.phase = StreamPhase::Streaming;
        Ok(request)
    }

    /// Replaces the placeholder with the reply so far. Ignored unless streaming.
    pub fn apply(&mut self, cumulative: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() => {
                *last = ChatMessage::assistant(cumulative);
                true
            }
            _ => false,
        }
    }

    /// Ends the stream normally. Returns the reply to persist; an empty
    /// reply is removed instead.
    pub fn complete(&mut self, final_text: &str) -> Option<ChatMessage> {
        if !self.is_streaming() {
            return None;
        }
        self.phase = StreamPhase::Done;
        if final_text.is_empty() {
            self.pop_placeholder();
            debug!(target: "tui", "stream finished with an empty reply");
            return None;
        }
        let reply = ChatMessage::assistant(final_text);
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() => *last = reply.clone(),
            _ => self.messages.push(reply.clone()),
        }
        Some(reply)
    }

    /// Ends the stream with an error: the placeholder (and any partial
    /// reply in it) is removed and one error toast is raised.
    pub fn fail(&mut self, err: &ChatError, toasts: &mut Toasts) {
        if !self.is_streaming() {
            return;
        }
        error!(target: "tui", "send failed: {}", err);
        self.pop_placeholder();
        self.phase = StreamPhase::Errored;
        toasts.error(err.user_message());
    }

    fn pop_placeholder(&mut self) {
        if matches!(self.messages.last(), Some(m) if m.is_assistant()) {
            self.messages.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toast::Level;

    #[test]
    fn updates_replace_the_placeholder() {
        let mut v = ChatView::with_history(vec![
            ChatMessage::user("earlier"),
            ChatMessage::assistant("answer"),
        ]);
        let request = v.begin("next").unwrap();
        assert_eq!(request.len(), 3);
        assert_eq!(request.last(), Some(&ChatMessage::user("next")));
        assert_eq!(v.messages().len(), 4);

        for cumulative in ["H", "He", "Hel", "Hell", "Hello"] {
            assert!(v.apply(cumulative));
        }
        assert_eq!(v.messages().len(), 4);
        assert_eq!(v.messages().last(), Some(&ChatMessage::assistant("Hello")));

        assert_eq!(v.complete("Hello"), Some(ChatMessage::assistant("Hello")));
        assert_eq!(v.phase(), StreamPhase::Done);
        assert_eq!(v.messages().len(), 4);
    }

    #[test]
    fn one_send_at_a_time() {
        let mut v = ChatView::default();
        v.begin("a").unwrap();
        assert_eq!(v.begin("b"), Err(Busy));
        assert_eq!(v.messages().len(), 2);
        v.complete("done");
        assert!(v.begin("b").is_ok());
    }

    #[test]
    fn failure_rolls_back_partial_reply() {
        let mut v = ChatView::with_history(vec![ChatMessage::user("hello"), ChatMessage::assistant("hey")]);
        let mut toasts = Toasts::new();
        v.begin("Say hi").unwrap();
        v.apply("Hi");
        v.apply("Hi there");
        v.fail(&ChatError::Network("connection reset".into()), &mut toasts);

        assert_eq!(v.phase(), StreamPhase::Errored);
        assert_eq!(
            v.messages(),
            &[
                ChatMessage::user("hello"),
                ChatMessage::assistant("hey"),
                ChatMessage::user("Say hi"),
            ]
        );
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts.count(Level::Error), 1);

        v.fail(&ChatError::Network("again".into()), &mut toasts);
        assert_eq!(toasts.len(), 1);
        assert_eq!(v.messages().len(), 3);
    }

    #[test]
    fn late_events_after_finish_are_ignored() {
        let mut v = ChatView::default();
        v.begin("q").unwrap();
        v.complete("a");
        assert!(!v.apply("stale"));
        assert_eq!(v.complete("stale"), None);
        assert_eq!(v.messages().last(), Some(&ChatMessage::assistant("a")));
    }

    #[test]
    fn empty_reply_leaves_no_bubble() {
        let mut v = ChatView::default();
        v.begin("q").unwrap();
        assert_eq!(v.complete(""), None);
        assert_eq!(v.messages(), &[ChatMessage::user("q")]);
    }
}
