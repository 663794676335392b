//! Incremental reader for OpenAI-style `text/event-stream` chat replies.
//!
//! Network chunks may split a UTF-8 sequence or a `data:` line anywhere. The
//! accumulator keeps a decoder and a text buffer alive across chunks, cuts
//! complete lines, and folds every `choices[0].delta.content` into one
//! growing message. Each time the message grows the callback receives the
//! whole message so far.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, trace};
use tutor_core::llm::{ChatError, DeltaPayload};

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";
pub const DEFAULT_MAX_PENDING: usize = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// Streaming UTF-8 decoder. An incomplete trailing sequence is held until
/// the next chunk; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);
        let mut start = 0usize;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(s) => {
                    out.push_str(s);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..start + valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += valid + bad;
                        }
                        None => {
                            start += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug)]
pub struct SseAccumulator {
    decoder: Utf8Decoder,
    buf: String,
    message: String,
    done: bool,
    deltas: usize,
    max_pending: usize,
}

impl Default for SseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// `max_pending` bounds the unconsumed text (an unterminated line plus
    /// anything queued behind a line that failed to parse).
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            decoder: Utf8Decoder::default(),
            buf: String::new(),
            message: String::new(),
            done: false,
            deltas: 0,
            max_pending: max_pending.max(1),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn into_message(self) -> String {
        self.message
    }

    /// Feeds one network chunk. After `Flow::Done` further input is ignored.
    pub fn push<F: FnMut(&str)>(&mut self, chunk: &[u8], on_update: &mut F) -> Result<Flow, ChatError> {
        if self.done {
            return Ok(Flow::Done);
        }
        self.decoder.decode_into(chunk, &mut self.buf);
        let flow = self.drain_lines(on_update);
        if flow == Flow::Continue && self.buf.len() > self.max_pending {
            error!(target: "providers::sse", "pending buffer exceeded {} bytes", self.max_pending);
            return Err(ChatError::Decode(format!(
                "unterminated event data exceeds {} bytes",
                self.max_pending
            )));
        }
        Ok(flow)
    }

    /// Processes every complete line, then drops the consumed prefix of the
    /// buffer in one step. A line that fails to parse stays at the front.
    fn drain_lines<F: FnMut(&str)>(&mut self, on_update: &mut F) -> Flow {
        let mut consumed = 0usize;
        let mut flow = Flow::Continue;
        while let Some(rel) = self.buf[consumed..].find('\n') {
            let end = consumed + rel;
            let raw = &self.buf[consumed..end];
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.trim().is_empty() || line.starts_with(':') {
                consumed = end + 1;
                continue;
            }
            let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
                trace!(target: "providers::sse", "skip non-data line: {:?}", line);
                consumed = end + 1;
                continue;
            };
            let payload = rest.trim();
            if payload == DONE_SENTINEL {
                self.done = true;
                consumed = end + 1;
                flow = Flow::Done;
                break;
            }
            match serde_json::from_str::<serde_json::Value>(payload) {
                Ok(v) => {
                    if let Some(text) = DeltaPayload::content_of(v) {
                        self.message.push_str(&text);
                        self.deltas += 1;
                        on_update(&self.message);
                    }
                    consumed = end + 1;
                }
                Err(e) => {
                    // Not complete yet: keep the line and wait for more bytes.
                    debug!(target: "providers::sse", "rebuffer unparsable line ({}): {} bytes", e, line.len());
                    break;
                }
            }
        }
        self.buf.drain(..consumed);
        flow
    }

    /// Runs the accumulator over a byte stream until `[DONE]` or end of
    /// stream. A transport error aborts and is returned as is.
    pub async fn drive<S, F>(mut self, mut stream: S, mut on_update: F) -> Result<String, ChatError>
    where
        S: Stream<Item = Result<Bytes, ChatError>> + Unpin,
        F: FnMut(&str),
    {
        let mut chunks = 0usize;
        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(b) => b,
                Err(e) => {
                    error!(target: "providers::sse", "stream read failed after {} deltas: {}", self.deltas, e);
                    return Err(e);
                }
            };
            chunks += 1;
            if self.push(&chunk, &mut on_update)? == Flow::Done {
                break;
            }
        }
        if !self.done && (!self.buf.is_empty() || self.decoder.pending_len() > 0) {
            debug!(target: "providers::sse", "end of stream with {} unterminated bytes", self.buf.len() + self.decoder.pending_len());
        }
        info!(target: "providers::sse", "stream finished chunks={} deltas={} done={} len={}", chunks, self.deltas, self.done, self.message.len());
        Ok(self.message)
    }
}

pub async fn accumulate<S, F>(stream: S, on_update: F) -> Result<String, ChatError>
where
    S: Stream<Item = Result<Bytes, ChatError>> + Unpin,
    F: FnMut(&str),
{
    SseAccumulator::new().drive(stream, on_update).await
}
