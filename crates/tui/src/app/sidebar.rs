use tracing::warn;

use super::App;
use crate::persist::DEFAULT_TITLE;

impl App {
    pub fn sidebar_inner_height(&self) -> u16 {
        self.sidebar_area
            .map(|a| a.height.saturating_sub(2))
            .unwrap_or(0)
    }

    pub fn sidebar_max_scroll(&self) -> u16 {
        let h = self.sidebar_inner_height() as usize;
        if h == 0 {
            0
        } else {
            self.state.conversations.len().saturating_sub(h) as u16
        }
    }

    pub fn sidebar_select_up(&mut self) {
        if self.state.current > 0 {
            self.select_conversation(self.state.current - 1);
        }
    }

    pub fn sidebar_select_down(&mut self) {
        if self.state.current + 1 < self.state.conversations.len() {
            self.select_conversation(self.state.current + 1);
        }
    }

    pub fn select_conversation(&mut self, idx: usize) {
        if idx >= self.state.conversations.len() || idx == self.state.current {
            return;
        }
        self.state.current = idx;
        self.ensure_sidebar_visible();
        self.save_state();
        self.open_current();
    }

    pub fn ensure_sidebar_visible(&mut self) {
        let h = self.sidebar_inner_height() as usize;
        if h == 0 {
            return;
        }
        let start = self.sidebar_scroll as usize;
        let current = self.state.current;
        if current < start {
            self.sidebar_scroll = current as u16;
        } else if current >= start + h {
            self.sidebar_scroll = (current + 1 - h) as u16;
        }
        self.sidebar_scroll = self.sidebar_scroll.min(self.sidebar_max_scroll());
    }

    pub fn sidebar_new_conversation(&mut self) {
        match self.store.create(&mut self.state, DEFAULT_TITLE) {
            Ok(_) => {
                self.ensure_sidebar_visible();
                self.open_current();
            }
            Err(e) => {
                warn!(target: "tui", "create conversation failed: {:#}", e);
                self.toasts.error("Could not create a conversation");
            }
        }
    }

    /// Deletes the selected conversation unless a reply is still streaming into it.
    pub fn sidebar_delete_current(&mut self) {
        if self.is_streaming() {
            self.toasts.info("Wait for the current reply to finish");
            return;
        }
        let id = self.current_id().to_string();
        if let Err(e) = self.store.delete(&mut self.state, &id) {
            warn!(target: "tui", "delete conversation failed: {:#}", e);
            self.toasts.error("Could not delete the conversation");
            return;
        }
        self.views.remove(&id);
        self.unread.mark_read(&id);
        if self.state.conversations.is_empty() {
            self.sidebar_new_conversation();
        } else {
            self.ensure_sidebar_visible();
            self.open_current();
        }
    }
}
