use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::warn;

const TOAST_TTL: Duration = Duration::from_secs(4);
const MAX_TOASTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub level: Level,
    pub text: String,
    raised_at: Instant,
}

#[derive(Debug)]
pub struct Toasts {
    items: VecDeque<Toast>,
    ttl: Duration,
}

impl Default for Toasts {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            ttl: TOAST_TTL,
        }
    }
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info<S: Into<String>>(&mut self, text: S) {
        self.raise(Level::Info, text.into(), Instant::now());
    }

    pub fn error<S: Into<String>>(&mut self, text: S) {
        let text = text.into();
        warn!(target: "tui", "toast: {}", text);
        self.raise(Level::Error, text, Instant::now());
    }

    fn raise(&mut self, level: Level, text: String, raised_at: Instant) {
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            level,
            text,
            raised_at,
        });
    }

    /// Newest toast still within its display time.
    pub fn current(&self, now: Instant) -> Option<&Toast> {
        self.items
            .iter()
            .rev()
            .find(|t| now.saturating_duration_since(t.raised_at) < self.ttl)
    }

    /// Drops expired toasts; returns true when something was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.items.len();
        let ttl = self.ttl;
        self.items
            .retain(|t| now.saturating_duration_since(t.raised_at) < ttl);
        before != self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, level: Level) -> usize {
        self.items.iter().filter(|t| t.level == level).count()
    }
}
