//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing `/v1/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Finish reasons, so truncated replies can be flagged
//! - Authentication failures as a distinguished error

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use wigli_config::Credentials;
use wigli_core::error::ProviderError;
use wigli_core::message::{Message, Role};
use wigli_core::provider::*;

/// An OpenAI-compatible chat provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    /// Create a provider from explicit credentials.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, ProviderError> {
        Self::new("openai", credentials.api_url.clone(), credentials.api_key.clone())
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .filter(|m| m.role != Role::Quit)
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }
        body
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::AuthenticationFailed("No API key configured".into()))
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.key()?))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(
                body["model"].as_str().unwrap_or_default().to_string(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::parse)
            .unwrap_or_default();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            finish_reason,
            usage,
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward parsed chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        SseEvent::Skip => {}
                        SseEvent::Done => {
                            let _ = tx.send(Ok(done_chunk())).await;
                            return;
                        }
                        SseEvent::Chunk(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseEvent::Malformed(data) => {
                            trace!(provider = %provider_name, data = %data, "Ignoring unparseable SSE chunk");
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(done_chunk())).await;
        });

        Ok(rx)
    }
}

fn done_chunk() -> StreamChunk {
    StreamChunk {
        content: None,
        finish_reason: None,
        done: true,
    }
}

/// Splits an incoming byte stream into complete lines.
///
/// Bytes are held until a newline arrives, so a multi-byte character cut
/// between two network reads is decoded whole.
#[derive(Default)]
struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let text = String::from_utf8_lossy(&line[..line_end]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }
}

#[derive(Debug)]
enum SseEvent {
    Skip,
    Done,
    Chunk(StreamChunk),
    Malformed(String),
}

fn parse_sse_line(line: &str) -> SseEvent {
    // Empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => {
            let Some(choice) = resp.choices.into_iter().next() else {
                return SseEvent::Skip;
            };
            let has_content = choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());
            let finish_reason = choice.finish_reason.as_deref().map(FinishReason::parse);
            if !has_content && finish_reason.is_none() {
                return SseEvent::Skip;
            }
            SseEvent::Chunk(StreamChunk {
                content: choice.delta.content,
                finish_reason,
                done: false,
            })
        }
        Err(_) => SseEvent::Malformed(data.to_string()),
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_constructor() {
        let creds = Credentials {
            api_key: Some("sk-test".into()),
            api_url: "https://api.openai.com/v1/".into(),
        };
        let provider = OpenAiCompatProvider::from_credentials(&creds).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[tokio::test]
    async fn missing_key_is_an_auth_failure() {
        let provider = OpenAiCompatProvider::new("openai", "http://127.0.0.1:9", None).unwrap();
        let err = provider
            .complete(ProviderRequest::new("gpt-3.5-turbo", &[Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[test]
    fn message_conversion_drops_quit() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::quit(),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn request_body_shape() {
        let mut req = ProviderRequest::new("gpt-4", &[Message::user("hi")]).temperature(0.5);
        req.stop = vec!["END".into()];
        let body = OpenAiCompatProvider::request_body(&req, true);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stop"][0], "END");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn parse_complete_response_with_length_finish() {
        let data = r#"{"model":"gpt-3.5-turbo","choices":[{"message":{"role":"assistant","content":"partial"},"finish_reason":"length"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("length"));
        assert!(parsed.usage.is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn sse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(chunk.finish_reason.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sse_finish_chunk() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"length"}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert!(chunk.content.is_none());
                assert_eq!(chunk.finish_reason, Some(FinishReason::Length));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sse_control_lines() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseEvent::Done));
        assert!(matches!(parse_sse_line(""), SseEvent::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseEvent::Skip));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":null}]}"#),
            SseEvent::Skip
        ));
        assert!(matches!(parse_sse_line("data: {oops"), SseEvent::Malformed(_)));
    }

    #[test]
    fn line_buffer_handles_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\r\n\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buf.push(b"NE]\n"), vec!["data: [DONE]".to_string()]);
    }

    #[test]
    fn line_buffer_keeps_characters_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café 😀\"}}]}\n";
        let bytes = line.as_bytes();
        let cut = line.find('é').unwrap() + 1;

        let mut buf = LineBuffer::default();
        assert!(buf.push(&bytes[..cut]).is_empty());
        let lines = buf.push(&bytes[cut..]);
        assert_eq!(lines.len(), 1);

        match parse_sse_line(&lines[0]) {
            SseEvent::Chunk(chunk) => assert_eq!(chunk.content.as_deref(), Some("café 😀")),
            other => panic!("expected a chunk, got {other:?}"),
        }
    }
}
