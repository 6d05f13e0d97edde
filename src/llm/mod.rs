pub mod gemini;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use serde_json::Value as JsonValue;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::{ debug, warn };

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key is required for the model service")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
    },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Model returned no text")]
    EmptyResponse,
}

/// A finite, non-restartable sequence of text fragments for one turn.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Single-shot generation constrained to a JSON schema.
#[async_trait]
pub trait StructuredModel: Send + Sync {
    async fn generate_json(
        &self,
        prompt: &str,
        schema: &JsonValue,
        temperature: f32
    ) -> Result<String, LlmError>;
}

/// Factory for conversational handles seeded with a system instruction.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn start_chat(&self, system_instruction: &str) -> Result<Box<dyn ChatHandle>, LlmError>;
}

/// One live conversation with the model service. Keeps its own turn history.
#[async_trait]
pub trait ChatHandle: Send {
    async fn send_message_stream(&mut self, message: &str) -> Result<TextStream, LlmError>;
}

/// Pull the payload out of one server-sent-events line, if it carries one.
pub fn sse_data(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Sends `request` and turns the SSE response body into a stream of text
/// fragments. `event_parser` maps one `data:` payload to a fragment.
pub async fn http_stream_generate(
    request: reqwest::RequestBuilder,
    event_parser: fn(&str) -> Result<Option<String>, LlmError>
) -> Result<TextStream, LlmError> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let buf = match chunk {
                Ok(buf) => buf,
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Http(e))).await;
                    return;
                }
            };
            buffer.extend_from_slice(&buf);

            // Only complete lines are decoded; the tail waits for the next chunk.
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                if let Some(data) = sse_data(line.trim_end_matches('\n')) {
                    match event_parser(data) {
                        Ok(Some(text)) => {
                            if tx.send(Ok(text)).await.is_err() {
                                debug!("Stream consumer dropped, stopping read");
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Unparsable stream event: {}", e);
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }
        }
        let tail = String::from_utf8_lossy(&buffer);
        if let Some(data) = sse_data(tail.trim()) {
            match event_parser(data) {
                Ok(Some(text)) => {
                    let _ = tx.send(Ok(text)).await;
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}
