use std::collections::HashMap;
use std::sync::{
    mpsc::{self, Receiver, Sender, TryRecvError},
    Arc,
};
use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use providers::{ChatClient, ChatConfig};
use ratatui::layout::Rect;
use tracing::{info, warn};
use tutor_core::llm::{ChatMessage, Role};
use tutor_core::ratelimit::{MemoryStore, RateLimiter};
use tutor_core::realtime::Subscription;
use tutor_core::unread::{MessageEvent, UnreadCounts, MESSAGES_TOPIC};
use tutor_core::Session;

use crate::persist::{title_from, ConversationStore, SavedState, DEFAULT_TITLE};
use crate::toast::Toasts;

pub mod chat;
pub mod input;
pub mod sidebar;
pub mod view;
pub mod worker;

use view::ChatView;
use worker::{StreamJob, WorkerEvent};

pub const ASSISTANT_SENDER: &str = "assistant";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

pub struct WrappedMsg {
    pub role: Role,
    pub content_len: usize,
    pub lines: Vec<String>,
}

pub struct App {
    pub session: Session,
    client: Arc<ChatClient>,
    max_pending: usize,
    store: ConversationStore,
    pub state: SavedState,
    views: HashMap<String, ChatView>,
    pub input: String,
    pub input_cursor: usize,
    pub should_quit: bool,
    pub dirty: bool,
    pub focus: Focus,
    pub chat_scroll: u16,
    pub chat_area: Option<Rect>,
    pub sidebar_area: Option<Rect>,
    pub sidebar_scroll: u16,
    pub chat_wrap_width: u16,
    pub chat_cache: Vec<WrappedMsg>,
    pub chat_total_lines: usize,
    pub chat_viewport: u16,
    pub input_visible_lines: u16,
    pub input_max_lines: u16,
    pub toasts: Toasts,
    pub unread: UnreadCounts,
    inserts: Subscription<MessageEvent>,
    limiter: RateLimiter<MemoryStore>,
    worker_tx: Sender<WorkerEvent>,
    worker_rx: Receiver<WorkerEvent>,
}

impl App {
    pub fn new(cfg: ChatConfig, store: ConversationStore) -> Result<Self> {
        let session = cfg.session()?;
        let max_pending = cfg.max_pending_bytes;
        let limiter = RateLimiter::new(cfg.rate, MemoryStore::new());
        let client = Arc::new(ChatClient::new(cfg)?);
        let mut state = store.load_state()?;
        if state.conversations.is_empty() {
            store.create(&mut state, DEFAULT_TITLE)?;
        }
        let inserts = store.hub().subscribe(MESSAGES_TOPIC);
        let (worker_tx, worker_rx) = mpsc::channel();
        let mut app = Self {
            session,
            client,
            max_pending,
            store,
            state,
            views: HashMap::new(),
            input: String::new(),
            input_cursor: 0,
            should_quit: false,
            dirty: true,
            focus: Focus::Input,
            chat_scroll: 0,
            chat_area: None,
            sidebar_area: None,
            sidebar_scroll: 0,
            chat_wrap_width: 0,
            chat_cache: Vec::new(),
            chat_total_lines: 0,
            chat_viewport: 0,
            input_visible_lines: 1,
            input_max_lines: 6,
            toasts: Toasts::new(),
            unread: UnreadCounts::new(),
            inserts,
            limiter,
            worker_tx,
            worker_rx,
        };
        app.open_current();
        info!(target: "tui", "app ready user={} conversations={}", app.session.user_id, app.state.conversations.len());
        Ok(app)
    }

    pub fn current_id(&self) -> &str {
        self.state
            .conversations
            .get(self.state.current)
            .map(|c| c.id.as_str())
            .unwrap_or("")
    }

    pub fn current_view(&self) -> Option<&ChatView> {
        self.views.get(self.current_id())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.current_view().map(|v| v.messages()).unwrap_or(&[])
    }

    pub fn is_streaming(&self) -> bool {
        self.current_view().map(|v| v.is_streaming()).unwrap_or(false)
    }

    /// Makes sure the selected conversation has a loaded view and clears its unread badge.
    pub fn open_current(&mut self) {
        let id = self.current_id().to_string();
        if !self.views.contains_key(&id) {
            let history = match self.store.load(&id) {
                Ok(h) => h,
                Err(e) => {
                    warn!(target: "tui", "load conversation {} failed: {:#}", id, e);
                    self.toasts.error("Could not load this conversation");
                    Vec::new()
                }
            };
            self.views.insert(id.clone(), ChatView::with_history(history));
        }
        self.unread.mark_read(&id);
        self.invalidate_chat();
    }

    pub fn invalidate_chat(&mut self) {
        self.chat_wrap_width = 0;
        self.chat_cache.clear();
        self.chat_total_lines = 0;
        self.chat_scroll = 0;
        self.dirty = true;
    }

    pub fn submit(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.is_streaming() {
            self.toasts.info("Wait for the current reply to finish");
            self.dirty = true;
            return;
        }
        if let Err(e) = self.limiter.check(&self.session) {
            self.toasts.error(e.user_message());
            self.dirty = true;
            return;
        }
        let id = self.current_id().to_string();
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        let first_message = view.messages().is_empty();
        let request = match view.begin(&text) {
            Ok(r) => r,
            Err(_) => return,
        };
        if let Err(e) = self.store.insert(&id, &ChatMessage::user(text.clone()), &self.session.user_id) {
            warn!(target: "tui", "persist user message failed: {:#}", e);
        }
        let untitled = self
            .state
            .conversations
            .get(self.state.current)
            .is_some_and(|c| c.title == DEFAULT_TITLE);
        if first_message && untitled {
            if let Err(e) = self.store.rename(&mut self.state, &id, &title_from(&text)) {
                warn!(target: "tui", "rename conversation failed: {:#}", e);
            }
        }
        info!(target: "tui", "submit conversation={} input_len={} history={}", id, text.len(), request.len());
        worker::spawn(
            StreamJob {
                client: self.client.clone(),
                session: self.session.clone(),
                conversation: id,
                messages: request,
                max_pending: self.max_pending,
            },
            self.worker_tx.clone(),
        );
        self.input.clear();
        self.input_cursor = 0;
        self.chat_scroll = 0;
        self.dirty = true;
    }

    pub fn handle_worker_event(&mut self, ev: WorkerEvent) {
        let on_screen = ev.conversation() == self.current_id();
        let Some(view) = self.views.get_mut(ev.conversation()) else {
            return;
        };
        match ev {
            WorkerEvent::Update { content, .. } => {
                view.apply(&content);
            }
            WorkerEvent::Done {
                conversation,
                content,
            } => {
                if let Some(reply) = view.complete(&content) {
                    if let Err(e) = self.store.insert(&conversation, &reply, ASSISTANT_SENDER) {
                        warn!(target: "tui", "persist reply failed: {:#}", e);
                        self.toasts.error("Reply could not be saved");
                    }
                }
            }
            WorkerEvent::Failed { error, .. } => {
                view.fail(&error, &mut self.toasts);
            }
        }
        if on_screen {
            self.dirty = true;
        }
    }

    pub fn on_tick(&mut self) {
        for _ in 0..256 {
            match self.worker_rx.try_recv() {
                Ok(ev) => self.handle_worker_event(ev),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        let active = self.current_id().to_string();
        for ev in self.inserts.drain() {
            self.unread.apply(&ev, &self.session.user_id, Some(active.as_str()));
            self.dirty = true;
        }
        let now = Instant::now();
        self.limiter.purge(now);
        if self.toasts.prune(now) {
            self.dirty = true;
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::F(2) => {
                self.state.show_sidebar = !self.state.show_sidebar;
                if !self.state.show_sidebar {
                    self.focus = Focus::Input;
                }
                self.save_state();
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Input if self.state.show_sidebar => Focus::Sidebar,
                    _ => Focus::Input,
                };
            }
            KeyCode::PageUp => self.scroll_up(self.chat_viewport.max(1)),
            KeyCode::PageDown => self.scroll_down(self.chat_viewport.max(1)),
            _ => match self.focus {
                Focus::Sidebar => self.on_sidebar_key(key),
                Focus::Input => self.on_input_key(key),
            },
        }
        self.dirty = true;
    }

    fn on_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.sidebar_select_up(),
            KeyCode::Down => self.sidebar_select_down(),
            KeyCode::Char('n') => self.sidebar_new_conversation(),
            KeyCode::Char('d') | KeyCode::Delete => self.sidebar_delete_current(),
            KeyCode::Enter => self.focus = Focus::Input,
            _ => {}
        }
    }

    fn on_input_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Enter if shift => self.insert_text("\n"),
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => self.delete_left_grapheme(),
            KeyCode::Delete => self.delete_right_grapheme(),
            KeyCode::Left if ctrl => self.move_cursor_word_left(),
            KeyCode::Right if ctrl => self.move_cursor_word_right(),
            KeyCode::Left => self.input_cursor = self.input_cursor.saturating_sub(1),
            KeyCode::Right => {
                self.input_cursor = (self.input_cursor + 1).min(self.input_len());
            }
            KeyCode::Home => self.move_cursor_line_start(),
            KeyCode::End => self.move_cursor_line_end(),
            KeyCode::Char('a') if ctrl => self.move_cursor_line_start(),
            KeyCode::Char('e') if ctrl => self.move_cursor_line_end(),
            KeyCode::Char('w') if ctrl => self.delete_prev_word(),
            KeyCode::Char('u') if ctrl => self.kill_to_line_start(),
            KeyCode::Char('k') if ctrl => self.kill_to_line_end(),
            KeyCode::Char(ch) if !ctrl => {
                let mut buf = [0u8; 4];
                self.insert_text(ch.encode_utf8(&mut buf));
            }
            _ => {}
        }
    }

    pub fn scroll_up(&mut self, n: u16) {
        let max = self
            .chat_total_lines
            .saturating_sub(self.chat_viewport as usize)
            .min(u16::MAX as usize) as u16;
        self.chat_scroll = self.chat_scroll.saturating_add(n).min(max);
        self.dirty = true;
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(n);
        self.dirty = true;
    }

    pub fn save_state(&self) {
        if let Err(e) = self.store.save_state(&self.state) {
            warn!(target: "tui", "save state failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::chat::config::ChatFileConfig;
    use crate::toast::Level;
    use tutor_core::llm::{ChatError, StreamPhase};

    pub(super) fn test_app(dir: &std::path::Path) -> App {
        test_app_with(dir, ChatFileConfig::default())
    }

    fn test_app_with(dir: &std::path::Path, file: ChatFileConfig) -> App {
        let cfg = ChatConfig::resolve(file, |k| match k {
            "TUTOR_ACCESS_TOKEN" => Some("tok".to_string()),
            "TUTOR_USER_ID" => Some("student".to_string()),
            "TUTOR_CHAT_URL" => Some("http://127.0.0.1:9/chat".to_string()),
            _ => None,
        })
        .unwrap();
        App::new(cfg, ConversationStore::open(dir)).unwrap()
    }

    fn start_stream(app: &mut App, text: &str) -> String {
        let id = app.current_id().to_string();
        app.views.get_mut(&id).unwrap().begin(text).unwrap();
        id
    }

    #[test]
    fn new_app_has_one_empty_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        assert_eq!(app.state.conversations.len(), 1);
        assert!(app.messages().is_empty());
        assert!(!app.is_streaming());
    }

    #[test]
    fn finished_reply_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let id = start_stream(&mut app, "hi");
        for c in ["Hel", "Hello"] {
            app.handle_worker_event(WorkerEvent::Update {
                conversation: id.clone(),
                content: c.into(),
            });
        }
        assert_eq!(app.messages().len(), 2);
        app.handle_worker_event(WorkerEvent::Done {
            conversation: id.clone(),
            content: "Hello".into(),
        });
        assert_eq!(app.current_view().map(|v| v.phase()), Some(StreamPhase::Done));
        assert_eq!(
            app.store.load(&id).unwrap(),
            vec![ChatMessage::assistant("Hello")]
        );
    }

    #[test]
    fn failed_reply_rolls_back_and_toasts_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let id = start_stream(&mut app, "hi");
        for c in ["Hi", "Hi there"] {
            app.handle_worker_event(WorkerEvent::Update {
                conversation: id.clone(),
                content: c.into(),
            });
        }
        app.handle_worker_event(WorkerEvent::Failed {
            conversation: id.clone(),
            error: ChatError::Network("reset".into()),
        });
        assert_eq!(app.messages(), &[ChatMessage::user("hi")]);
        assert_eq!(app.toasts.len(), 1);
        assert!(app.store.load(&id).unwrap().is_empty());
    }

    #[test]
    fn background_reply_counts_as_unread() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let first = start_stream(&mut app, "question");
        app.sidebar_new_conversation();
        assert_ne!(app.current_id(), first);

        app.handle_worker_event(WorkerEvent::Update {
            conversation: first.clone(),
            content: "answer".into(),
        });
        app.handle_worker_event(WorkerEvent::Done {
            conversation: first.clone(),
            content: "answer".into(),
        });
        app.on_tick();
        assert_eq!(app.unread.get(&first), 1);

        app.state.current = 0;
        app.open_current();
        assert_eq!(app.unread.get(&first), 0);
        assert_eq!(app.messages().last(), Some(&ChatMessage::assistant("answer")));
    }

    fn type_and_send(app: &mut App, text: &str) {
        app.insert_text(text);
        app.submit();
    }

    #[test]
    fn send_persists_user_message_and_names_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let id = app.current_id().to_string();
        type_and_send(&mut app, "  Explain recursion\nplease ");

        assert!(app.is_streaming());
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
        assert_eq!(app.messages().len(), 2);
        assert_eq!(
            app.store.load(&id).unwrap(),
            vec![ChatMessage::user("Explain recursion\nplease")]
        );
        assert_eq!(app.state.conversations[0].title, "Explain recursion");
        assert_eq!(app.store.load_state().unwrap().conversations[0].title, "Explain recursion");
    }

    #[test]
    fn send_while_streaming_is_dropped_with_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let id = app.current_id().to_string();
        type_and_send(&mut app, "first");
        assert!(app.is_streaming());

        type_and_send(&mut app, "second");
        assert_eq!(app.messages().len(), 2);
        assert_eq!(app.input, "second");
        assert_eq!(app.toasts.len(), 1);
        assert_eq!(app.toasts.count(Level::Info), 1);
        assert_eq!(app.store.load(&id).unwrap(), vec![ChatMessage::user("first")]);
    }

    #[test]
    fn rate_limited_send_leaves_view_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = ChatFileConfig {
            rate_limit: Some(1),
            ..ChatFileConfig::default()
        };
        let mut app = test_app_with(dir.path(), file);
        type_and_send(&mut app, "first");
        assert!(app.is_streaming());

        app.sidebar_new_conversation();
        let id = app.current_id().to_string();
        type_and_send(&mut app, "second");
        assert!(!app.is_streaming());
        assert!(app.messages().is_empty());
        assert_eq!(app.toasts.count(Level::Error), 1);
        assert!(app.store.load(&id).unwrap().is_empty());
        assert_eq!(app.state.conversations[app.state.current].title, DEFAULT_TITLE);
    }

    #[test]
    fn blank_input_is_not_sent() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        type_and_send(&mut app, "   \n ");
        assert!(!app.is_streaming());
        assert!(app.messages().is_empty());
        assert!(app.toasts.is_empty());
    }

    #[test]
    fn events_for_unknown_conversations_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.handle_worker_event(WorkerEvent::Done {
            conversation: "gone".into(),
            content: "x".into(),
        });
        assert!(app.toasts.is_empty());
    }
}
