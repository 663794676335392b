use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tutor_core::realtime::Hub;
use tutor_core::unread::{MessageEvent, MESSAGES_TOPIC};
use tutor_core::ChatMessage;

pub const DEFAULT_TITLE: &str = "New conversation";
const TITLE_MAX_CHARS: usize = 40;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedState {
    pub conversations: Vec<Conversation>,
    pub current: usize,
    pub show_sidebar: bool,
}

impl Default for SavedState {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            current: 0,
            show_sidebar: true,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Row {
    #[serde(flatten)]
    message: ChatMessage,
    sender_id: String,
    at: u64,
}

/// Conversations on disk: an index file plus one JSONL file of messages per
/// conversation. Every inserted message is announced on the hub.
pub struct ConversationStore {
    root: PathBuf,
    hub: Hub<MessageEvent>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn sanitize(id: &str) -> String {
    let s: String = id
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() {
        "default".to_string()
    } else {
        s
    }
}

/// Title derived from the first user message of a conversation.
pub fn title_from(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    let mut out: String = line.chars().take(TITLE_MAX_CHARS).collect();
    if line.chars().count() > TITLE_MAX_CHARS {
        out.push_str("...");
    }
    out
}

impl ConversationStore {
    pub fn open<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            hub: Hub::new(),
        }
    }

    pub fn default_root() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.data_dir().join("tutor"))
    }

    pub fn hub(&self) -> &Hub<MessageEvent> {
        &self.hub
    }

    fn state_path(&self) -> PathBuf {
        self.root.join("conversations.json")
    }

    fn messages_path(&self, id: &str) -> PathBuf {
        self.root
            .join("messages")
            .join(format!("{}.jsonl", sanitize(id)))
    }

    pub fn load_state(&self) -> Result<SavedState> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(SavedState::default());
        }
        let data = fs::read(&path).with_context(|| format!("read state file: {}", path.display()))?;
        let mut s: SavedState = serde_json::from_slice(&data).with_context(|| "parse state json")?;
        if !s.conversations.is_empty() {
            s.current = s.current.min(s.conversations.len() - 1);
        }
        Ok(s)
    }

    pub fn save_state(&self, state: &SavedState) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create data dir: {}", self.root.display()))?;
        let path = self.state_path();
        let data = serde_json::to_vec_pretty(state)?;
        let mut tmp = path.clone();
        tmp.set_extension("json.tmp");
        {
            let mut f =
                fs::File::create(&tmp).with_context(|| format!("create tmp: {}", tmp.display()))?;
            f.write_all(&data)?;
            f.flush()?;
        }
        fs::rename(tmp, &path).with_context(|| format!("persist state to {}", path.display()))?;
        Ok(())
    }

    /// Adds a conversation to `state` (selected) and persists the index.
    pub fn create(&self, state: &mut SavedState, title: &str) -> Result<Conversation> {
        let created_at = now_millis();
        let mut id = format!("c{}", created_at);
        let mut n = 1;
        while state.conversations.iter().any(|c| c.id == id) {
            n += 1;
            id = format!("c{}-{}", created_at, n);
        }
        let conv = Conversation {
            id,
            title: title.to_string(),
            created_at,
        };
        state.conversations.push(conv.clone());
        state.current = state.conversations.len() - 1;
        self.save_state(state)?;
        debug!(target: "tui::persist", "created conversation id={}", conv.id);
        Ok(conv)
    }

    pub fn rename(&self, state: &mut SavedState, id: &str, title: &str) -> Result<()> {
        if let Some(c) = state.conversations.iter_mut().find(|c| c.id == id) {
            c.title = title.to_string();
            self.save_state(state)?;
        }
        Ok(())
    }

    pub fn delete(&self, state: &mut SavedState, id: &str) -> Result<()> {
        let Some(idx) = state.conversations.iter().position(|c| c.id == id) else {
            return Ok(());
        };
        state.conversations.remove(idx);
        if state.current > idx || state.current >= state.conversations.len() {
            state.current = state.current.saturating_sub(1);
        }
        self.save_state(state)?;
        let path = self.messages_path(id);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(target: "tui::persist", "remove {} failed: {}", path.display(), e);
            }
        }
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Vec<ChatMessage>> {
        let path = self.messages_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("read messages file: {}", path.display()))?;
        let mut out = Vec::new();
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Row>(line) {
                Ok(r) => out.push(r.message),
                Err(e) => warn!(target: "tui::persist", "skip bad row in {}: {}", path.display(), e),
            }
        }
        Ok(out)
    }

    /// Appends one message and publishes `MessageEvent::Inserted`.
    pub fn insert(&self, id: &str, message: &ChatMessage, sender_id: &str) -> Result<()> {
        let path = self.messages_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create messages dir: {}", parent.display()))?;
        }
        let row = Row {
            message: message.clone(),
            sender_id: sender_id.to_string(),
            at: now_millis(),
        };
        let mut line = serde_json::to_string(&row)?;
        line.push('\n');
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open messages file: {}", path.display()))?;
        f.write_all(line.as_bytes())?;
        f.flush()?;
        let delivered = self.hub.publish(
            MESSAGES_TOPIC,
            MessageEvent::Inserted {
                conversation_id: id.to_string(),
                sender_id: sender_id.to_string(),
            },
        );
        debug!(target: "tui::persist", "insert conversation={} sender={} delivered={}", id, sender_id, delivered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_insert_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path());
        let mut state = store.load_state().unwrap();
        assert!(state.conversations.is_empty());

        let a = store.create(&mut state, DEFAULT_TITLE).unwrap();
        let b = store.create(&mut state, "Second").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(state.current, 1);

        store.insert(&a.id, &ChatMessage::user("q"), "u1").unwrap();
        store.insert(&a.id, &ChatMessage::assistant("a"), "assistant").unwrap();
        assert_eq!(
            store.load(&a.id).unwrap(),
            vec![ChatMessage::user("q"), ChatMessage::assistant("a")]
        );
        assert!(store.load(&b.id).unwrap().is_empty());

        let reloaded = store.load_state().unwrap();
        assert_eq!(reloaded.conversations.len(), 2);

        store.delete(&mut state, &a.id).unwrap();
        assert_eq!(state.conversations, vec![b.clone()]);
        assert_eq!(state.current, 0);
        assert!(store.load(&a.id).unwrap().is_empty());
    }

    #[test]
    fn insert_announces_on_hub() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path());
        let sub = store.hub().subscribe(MESSAGES_TOPIC);
        store.insert("c1", &ChatMessage::assistant("hi"), "assistant").unwrap();
        assert_eq!(
            sub.drain(),
            vec![MessageEvent::Inserted {
                conversation_id: "c1".into(),
                sender_id: "assistant".into()
            }]
        );
    }

    #[test]
    fn corrupt_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path());
        store.insert("c1", &ChatMessage::user("first"), "u1").unwrap();
        let path = store.messages_path("c1");
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"role\":\"user\",\"conte\n\nnot json at all\n").unwrap();
        drop(f);
        store.insert("c1", &ChatMessage::assistant("second"), "assistant").unwrap();

        assert_eq!(
            store.load("c1").unwrap(),
            vec![ChatMessage::user("first"), ChatMessage::assistant("second")]
        );
    }

    #[test]
    fn titles_from_first_line() {
        assert_eq!(title_from("  \n Explain recursion\nplease"), "Explain recursion");
        assert_eq!(title_from("   "), DEFAULT_TITLE);
        let long = "x".repeat(50);
        assert_eq!(title_from(&long), format!("{}...", "x".repeat(40)));
    }
}
