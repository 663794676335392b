pub mod client;
pub mod config;

pub use client::ChatClient;
pub use config::ChatConfig;

use tutor_core::llm::{ChatBackend, ChatError, ChatMessage};
use tutor_core::Session;

use crate::sse::SseAccumulator;

/// Sends `msgs` and streams the reply, calling `on_update` with the whole
/// reply so far after every delta. Returns the final reply text.
pub async fn stream_reply<B, F>(
    backend: &B,
    session: &Session,
    msgs: &[ChatMessage],
    max_pending: usize,
    on_update: F,
) -> Result<String, ChatError>
where
    B: ChatBackend,
    F: FnMut(&str),
{
    let stream = backend.open_stream(session, msgs).await?;
    SseAccumulator::with_max_pending(max_pending)
        .drive(stream, on_update)
        .await
}
