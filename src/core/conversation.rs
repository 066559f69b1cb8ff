use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::message::ImageRef;
use crate::core::session_id::SessionId;

/// Immutable snapshot of one submission.
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub session_id: SessionId,
    pub text: String,
    pub image: Option<ImageRef>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    session_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<WireImage<'a>>,
}

#[derive(Serialize)]
struct WireImage<'a> {
    name: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(alias = "reply")]
    text: String,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a ConversationRequest) -> Self {
        Self {
            session_id: request.session_id.as_str(),
            text: &request.text,
            image: request.image.as_ref().map(|image| WireImage {
                name: &image.name,
                media_type: &image.media_type,
                data: base64::prelude::BASE64_STANDARD.encode(&image.bytes),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The request never produced a response (connect failure, timeout, reset).
    Transport(String),
    /// The endpoint answered with a non-success status.
    Status { status: u16, summary: String },
    /// The endpoint answered, but not with a usable reply.
    Malformed(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(detail) => {
                write!(f, "Could not reach the chat service: {detail}")
            }
            RequestError::Status { status, summary } if summary.is_empty() => {
                write!(f, "The chat service returned HTTP {status}")
            }
            RequestError::Status { status, summary } => {
                write!(f, "The chat service returned HTTP {status}: {summary}")
            }
            RequestError::Malformed(detail) => {
                write!(f, "The chat service sent an unusable reply: {detail}")
            }
        }
    }
}

impl StdError for RequestError {}

/// Something that can turn a request into one assistant reply.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn send(&self, request: &ConversationRequest) -> Result<String, RequestError>;
}

/// Replies larger than this are rejected instead of buffered.
pub const DEFAULT_MAX_REPLY_BYTES: usize = 4 * 1024 * 1024;

pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    max_reply_bytes: usize,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
        }
    }

    pub fn with_max_reply_bytes(mut self, max_reply_bytes: usize) -> Self {
        self.max_reply_bytes = max_reply_bytes;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    async fn send(&self, request: &ConversationRequest) -> Result<String, RequestError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json, text/plain")
            .json(&WireRequest::from_request(request))
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));

        // The reply may arrive as a stream of text chunks; collect all of it.
        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RequestError::Transport(e.to_string()))?;
            if body.len() + chunk.len() > self.max_reply_bytes {
                return Err(RequestError::Malformed(format!(
                    "reply exceeds {} bytes",
                    self.max_reply_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                summary: summarize_error_body(&String::from_utf8_lossy(&body)),
            });
        }

        let body = String::from_utf8(body)
            .map_err(|e| RequestError::Malformed(format!("reply is not valid UTF-8: {e}")))?;
        let text = if is_json {
            serde_json::from_str::<WireReply>(&body)
                .map_err(|e| RequestError::Malformed(e.to_string()))?
                .text
        } else {
            body
        };

        if text.trim().is_empty() {
            return Err(RequestError::Malformed("empty reply".to_string()));
        }
        Ok(text)
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("detail")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

const MAX_SUMMARY_CHARS: usize = 200;

/// One-line description of an error body, preferring a JSON message field.
fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json).filter(|s| !s.is_empty()) {
            return summary;
        }
    }

    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_SUMMARY_CHARS {
        let cut: String = collapsed.chars().take(MAX_SUMMARY_CHARS).collect();
        format!("{cut}…")
    } else {
        collapsed
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversationEvent {
    Delivered(String),
    Failed(String),
}

/// Runs requests on the tokio runtime and reports outcomes tagged with the
/// request id they belong to.
#[derive(Clone)]
pub struct ConversationService {
    backend: Arc<dyn ConversationBackend>,
    tx: mpsc::UnboundedSender<(ConversationEvent, u64)>,
}

impl ConversationService {
    pub fn new(
        backend: Arc<dyn ConversationBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<(ConversationEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { backend, tx }, rx)
    }

    pub fn spawn_request(&self, request_id: u64, request: ConversationRequest) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            debug!(request_id, session_id = %request.session_id, "Sending conversation request");
            let event = match backend.send(&request).await {
                Ok(text) => ConversationEvent::Delivered(text),
                Err(err) => {
                    debug!(request_id, error = %err, "Conversation request failed");
                    ConversationEvent::Failed(err.to_string())
                }
            };
            let _ = tx.send((event, request_id));
        });
    }
}
