use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const MESSAGES_TOPIC: &str = "messages";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageEvent {
    Inserted {
        conversation_id: String,
        sender_id: String,
    },
}

/// Per-conversation counters of messages the viewer has not seen yet.
#[derive(Debug, Default)]
pub struct UnreadCounts {
    counts: HashMap<String, usize>,
}

impl UnreadCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &MessageEvent, viewer: &str, active: Option<&str>) {
        match event {
            MessageEvent::Inserted {
                conversation_id,
                sender_id,
            } => {
                if sender_id == viewer || active == Some(conversation_id.as_str()) {
                    return;
                }
                *self.counts.entry(conversation_id.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn mark_read(&mut self, conversation_id: &str) {
        self.counts.remove(conversation_id);
    }

    pub fn get(&self, conversation_id: &str) -> usize {
        self.counts.get(conversation_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}
