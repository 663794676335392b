pub mod chat;
pub mod sse;

pub use chat::{stream_reply, ChatClient, ChatConfig};
pub use sse::{accumulate, SseAccumulator};
