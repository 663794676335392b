use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Session;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user<S: Into<String>>(s: S) -> Self {
        Self {
            role: Role::User,
            content: s.into(),
        }
    }

    pub fn assistant<S: Into<String>>(s: S) -> Self {
        Self {
            role: Role::Assistant,
            content: s.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self.role, Role::Assistant)
    }
}

/// One `data:` payload of an OpenAI-style streaming completion.
///
/// Only `choices[0].delta.content` carries meaning; unknown fields are
/// accepted and dropped.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaPayload {
    #[serde(default)]
    pub choices: Vec<DeltaChoice>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DeltaPayload {
    pub fn text<S: Into<String>>(s: S) -> Self {
        Self {
            choices: vec![DeltaChoice {
                delta: Delta {
                    content: Some(s.into()),
                },
            }],
        }
    }

    /// Content of the first choice, if it is a non-empty string.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Interprets an already-parsed JSON value. Shapes that do not match
    /// (missing `choices`, `content` that is not a string, ...) yield `None`.
    pub fn content_of(v: serde_json::Value) -> Option<String> {
        serde_json::from_value::<DeltaPayload>(v)
            .ok()
            .and_then(|p| p.content().map(str::to_string))
    }
}

/// Lifecycle of one streamed reply as seen by a chat view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming,
    Done,
    Errored,
}

impl StreamPhase {
    pub fn is_busy(self) -> bool {
        matches!(self, StreamPhase::Streaming)
    }
}

pub const GENERIC_FAILURE: &str = "Failed to get a response from the tutor";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("auth error: {0}")]
    Auth(String),
    #[error("rate limit: {0}")]
    RateLimit(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("network: {0}")]
    Network(String),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("config: {0}")]
    Config(String),
    #[error("other: {0}")]
    Other(String),
}

impl ChatError {
    /// Text for the single toast shown when a send fails.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Auth(m) | ChatError::RateLimit(m) => m.clone(),
            ChatError::Http { message, .. } => message.clone(),
            ChatError::Timeout(_) => "The tutor took too long to respond".to_string(),
            ChatError::Network(_) => "Connection to the tutor was lost".to_string(),
            ChatError::Config(m) => format!("Configuration problem: {}", m),
            ChatError::Decode(_) | ChatError::Other(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send + 'a>>;

/// Opens a streamed chat completion. The returned stream carries the raw
/// response body; framing is left to the caller.
#[allow(async_fn_in_trait)]
pub trait ChatBackend: Send + Sync {
    async fn open_stream<'a>(
        &'a self,
        session: &Session,
        msgs: &[ChatMessage],
    ) -> Result<ByteStream<'a>, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_serializes_lowercase() {
        let m = ChatMessage::assistant("hi");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v, json!({"role": "assistant", "content": "hi"}));
        let back: ChatMessage = serde_json::from_value(json!({"role": "user", "content": "q"})).unwrap();
        assert_eq!(back, ChatMessage::user("q"));
    }

    #[test]
    fn delta_content_reads_first_choice() {
        let v = json!({"id": "x", "choices": [{"index": 0, "delta": {"content": "Hel"}}]});
        assert_eq!(DeltaPayload::content_of(v).as_deref(), Some("Hel"));
    }

    #[test]
    fn delta_content_ignores_unexpected_shapes() {
        assert_eq!(DeltaPayload::content_of(json!({})), None);
        assert_eq!(DeltaPayload::content_of(json!({"choices": []})), None);
        assert_eq!(DeltaPayload::content_of(json!({"choices": [{"delta": {}}]})), None);
        assert_eq!(DeltaPayload::content_of(json!({"choices": [{"delta": {"content": ""}}]})), None);
        assert_eq!(DeltaPayload::content_of(json!({"choices": [{"delta": {"content": 7}}]})), None);
        assert_eq!(DeltaPayload::content_of(json!({"choices": "nope"})), None);
        assert_eq!(DeltaPayload::content_of(json!([1, 2])), None);
    }

    #[test]
    fn delta_text_matches_wire_shape() {
        let v = serde_json::to_value(DeltaPayload::text(" world")).unwrap();
        assert_eq!(v, json!({"choices": [{"delta": {"content": " world"}}]}));
    }

    #[test]
    fn user_message_prefers_server_text() {
        let e = ChatError::Http {
            status: 500,
            message: "model overloaded".into(),
        };
        assert_eq!(e.user_message(), "model overloaded");
        assert_eq!(ChatError::Other("boom".into()).user_message(), GENERIC_FAILURE);
    }
}
