//! Anthropic Messages API backend.
//!
//! Blocking generation posts a single-turn request and joins the returned
//! text blocks. Streaming sets `"stream": true` and forwards every
//! `text_delta` from the server-sent event stream as one fragment.

use super::sse::{SseDecoder, SseEvent};
use super::{FragmentStream, Model, SamplingConfig};
use crate::error::{GenerationError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Default Messages API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Messages API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Fragments buffered between the network task and the consumer.
const STREAM_BUFFER: usize = 32;

/// Model backend for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicModel {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    sampling: SamplingConfig,
}

impl AnthropicModel {
    /// Creates a backend for `model` using the default API base.
    #[must_use]
    pub fn new(api_key: String, model: String, sampling: SamplingConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            model,
            sampling,
        }
    }

    /// Overrides the API base URL (gateways, local test servers).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Returns the Messages endpoint URL.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }

    fn request_body<'a>(&'a self, prompt: &'a str, stream: bool) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.sampling.max_output_tokens,
            temperature: self.sampling.temperature,
            top_k: self.sampling.top_k,
            top_p: self.sampling.top_p,
            stop_sequences: &self.sampling.stop_sequences,
            messages: [RequestMessage {
                role: "user",
                content: prompt,
            }],
            stream,
        }
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(GenerationError::from_status(status.as_u16(), error_message(&text)).into())
    }
}

#[async_trait]
impl Model for AnthropicModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send(&self.request_body(prompt, false)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::transport(&e))?;

        let text = extract_text(&body)?;
        debug!(model = %self.model, chars = text.len(), "generation complete");
        Ok(text)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let response = self.send(&self.request_body(prompt, true)).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(forward_events(response, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Reads the event stream and forwards fragments until the message stops,
/// an error occurs, or the consumer goes away.
async fn forward_events(response: reqwest::Response, tx: mpsc::Sender<Result<String>>) {
    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut fragments = 0usize;

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(GenerationError::transport(&e).into())).await;
                return;
            }
        };

        let events = match decoder.push(&chunk) {
            Ok(events) => events,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        for event in events {
            if !forward_event(&event, &tx, &mut fragments).await {
                return;
            }
        }
    }

    if let Some(event) = decoder.finish() {
        forward_event(&event, &tx, &mut fragments).await;
    }
    debug!(fragments, "event stream closed");
}

/// Forwards a single event. Returns `false` when forwarding should stop.
async fn forward_event(
    event: &SseEvent,
    tx: &mpsc::Sender<Result<String>>,
    fragments: &mut usize,
) -> bool {
    match decode_event(event) {
        Ok(StreamStep::Fragment(text)) => {
            if tx.send(Ok(text)).await.is_err() {
                debug!(fragments = *fragments, "stream consumer dropped");
                return false;
            }
            *fragments += 1;
            true
        }
        Ok(StreamStep::Skip) => true,
        Ok(StreamStep::Done) => {
            debug!(fragments = *fragments, "message stopped");
            false
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

/// Outcome of decoding one stream event.
#[derive(Debug, PartialEq, Eq)]
enum StreamStep {
    Fragment(String),
    Skip,
    Done,
}

fn decode_event(event: &SseEvent) -> Result<StreamStep> {
    let parsed: StreamEvent = serde_json::from_str(&event.data)
        .map_err(|e| GenerationError::Malformed(format!("stream event: {e}")))?;

    match parsed {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } if !text.is_empty() => Ok(StreamStep::Fragment(text)),
        StreamEvent::MessageStop => Ok(StreamStep::Done),
        StreamEvent::Error { error } => Err(error.into_generation_error().into()),
        _ => Ok(StreamStep::Skip),
    }
}

/// Joins the text blocks of a Messages response.
fn extract_text(body: &str) -> Result<String> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    let mut texts = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .peekable();

    if texts.peek().is_none() {
        return Err(GenerationError::EmptyResponse.into());
    }
    Ok(texts.collect())
}

/// Pulls the message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |wrapper| wrapper.error.message)
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    stop_sequences: &'a [String],
    messages: [RequestMessage<'a>; 1],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: Delta,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl ErrorBody {
    fn into_generation_error(self) -> GenerationError {
        match self.kind.as_str() {
            "rate_limit_error" => GenerationError::RateLimited(self.message),
            "timeout_error" => GenerationError::Timeout(self.message),
            _ => GenerationError::Upstream {
                status: None,
                message: format!("{}: {}", self.kind, self.message),
            },
        }
    }
}
