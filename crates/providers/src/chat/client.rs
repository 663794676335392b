use crate::chat::config::ChatConfig;
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use tokio::time::Duration;
use tracing::{debug, error, info};
use tutor_core::llm::{ByteStream, ChatBackend, ChatError, ChatMessage, GENERIC_FAILURE};
use tutor_core::Session;

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    cfg: ChatConfig,
}

impl ChatClient {
    pub fn new(cfg: ChatConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .connect_timeout(cfg.connect_timeout);
        if let Some(p) = &cfg.proxy {
            builder = builder.proxy(reqwest::Proxy::all(p)?);
        }
        let http = builder.build()?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.cfg
    }
}

#[allow(async_fn_in_trait)]
impl ChatBackend for ChatClient {
    async fn open_stream<'a>(
        &'a self,
        session: &Session,
        msgs: &[ChatMessage],
    ) -> Result<ByteStream<'a>, ChatError> {
        let url = self.cfg.endpoint.as_str();
        info!(target: "providers::chat", "open stream url={} user={} messages={}", url, session.user_id, msgs.len());
        let resp = self
            .http
            .post(url)
            .header(header::AUTHORIZATION, session.bearer())
            .header(header::ACCEPT, "text/event-stream")
            .json(&ChatRequest { messages: msgs })
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.ok();
            error!(target: "providers::chat", "chat non-2xx status={} body={:?}", status, body);
            return Err(map_status_err(status, body.as_deref()));
        }
        let mut body = Box::pin(resp.bytes_stream());
        let s = async_stream::stream! {
            let mut read = 0usize;
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(b) => {
                        read += b.len();
                        yield Ok(b);
                    }
                    Err(e) => {
                        yield Err(map_reqwest_err(e));
                        return;
                    }
                }
            }
            debug!(target: "providers::chat", "response body closed bytes={}", read);
        };
        Ok(Box::pin(s))
    }
}

pub(crate) fn map_reqwest_err(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout(e.to_string())
    } else if e.is_request() || e.is_connect() || e.is_body() {
        ChatError::Network(e.to_string())
    } else {
        ChatError::Other(e.to_string())
    }
}

/// Builds the error for a rejected request. The message comes from the
/// body's `error` string when there is one.
pub(crate) fn map_status_err(status: StatusCode, body: Option<&str>) -> ChatError {
    let message = body
        .and_then(|b| serde_json::from_str::<serde_json::Value>(b).ok())
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimit(message),
        _ => ChatError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_takes_body_message() {
        let e = map_status_err(StatusCode::BAD_GATEWAY, Some(r#"{"error":"AI gateway unavailable"}"#));
        assert_eq!(
            e,
            ChatError::Http {
                status: 502,
                message: "AI gateway unavailable".into()
            }
        );
    }

    #[test]
    fn status_error_falls_back_to_generic() {
        for body in [None, Some("<html>oops</html>"), Some(r#"{"error":{"code":1}}"#), Some(r#"{"error":""}"#)] {
            let e = map_status_err(StatusCode::INTERNAL_SERVER_ERROR, body);
            assert_eq!(e.user_message(), GENERIC_FAILURE, "body {:?}", body);
        }
    }

    #[test]
    fn auth_and_rate_limit_statuses() {
        let e = map_status_err(StatusCode::UNAUTHORIZED, Some(r#"{"error":"Invalid token"}"#));
        assert_eq!(e, ChatError::Auth("Invalid token".into()));
        let e = map_status_err(StatusCode::TOO_MANY_REQUESTS, Some(r#"{"error":"Slow down"}"#));
        assert_eq!(e, ChatError::RateLimit("Slow down".into()));
    }
}
