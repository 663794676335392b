pub mod llm;
pub mod ratelimit;
pub mod realtime;
pub mod session;
pub mod unread;

pub use llm::{ChatError, ChatMessage, Role};
pub use session::Session;
