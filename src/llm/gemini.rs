use async_trait::async_trait;
use futures::StreamExt;
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use std::sync::{ Arc, Mutex };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::{ debug, info };

use super::{
    http_stream_generate,
    ChatHandle,
    ChatModel,
    LlmConfig,
    LlmError,
    StructuredModel,
    TextStream,
    DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};

#[derive(Serialize, Deserialize, Clone, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: JsonValue,
    temperature: f32,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

impl GoogleResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

fn parse_stream_event(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: GoogleResponse = serde_json
        ::from_str(data)
        .map_err(|e| LlmError::Parse(format!("stream chunk: {}", e)))?;
    let text = chunk.text();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        Ok(Self::new(api_key, config.model.clone(), config.base_url.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url.trim_end_matches('/'), self.model, method)
    }

    fn post(&self, url: &str, body: &GeminiRequest) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl StructuredModel for GeminiClient {
    async fn generate_json(
        &self,
        prompt: &str,
        schema: &JsonValue,
        temperature: f32
    ) -> Result<String, LlmError> {
        info!(
            "GeminiClient::generate_json() → model={} temperature={}",
            self.model,
            temperature
        );
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema.clone(),
                temperature,
            }),
        };

        let resp = self.post(&self.endpoint("generateContent"), &body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GoogleResponse = resp.json().await?;
        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn start_chat(&self, system_instruction: &str) -> Result<Box<dyn ChatHandle>, LlmError> {
        info!("GeminiClient::start_chat() → model={}", self.model);
        Ok(
            Box::new(GeminiChat {
                client: self.clone(),
                system_instruction: system_instruction.to_string(),
                history: Arc::new(Mutex::new(Vec::new())),
            })
        )
    }
}

/// Conversation state for the stateless REST API: the full turn history is
/// replayed on every request.
pub struct GeminiChat {
    client: GeminiClient,
    system_instruction: String,
    history: Arc<Mutex<Vec<GeminiContent>>>,
}

#[async_trait]
impl ChatHandle for GeminiChat {
    async fn send_message_stream(&mut self, message: &str) -> Result<TextStream, LlmError> {
        let user_turn = GeminiContent::text(Some("user"), message);
        let mut contents = self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        contents.push(user_turn.clone());

        let body = GeminiRequest {
            contents,
            system_instruction: Some(GeminiContent::text(None, self.system_instruction.clone())),
            generation_config: None,
        };
        let url = format!("{}?alt=sse", self.client.endpoint("streamGenerateContent"));
        debug!("Streaming chat turn from {}", url);

        let mut inner = http_stream_generate(self.client.post(&url, &body), parse_stream_event).await?;

        // The exchange joins the history only once the reply streamed to completion.
        let history = Arc::clone(&self.history);
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut reply = String::new();
            while let Some(item) = inner.next().await {
                match item {
                    Ok(text) => {
                        reply.push_str(&text);
                        if tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            let mut turns = history.lock().unwrap_or_else(|e| e.into_inner());
            turns.push(user_turn);
            turns.push(GeminiContent::text(Some("model"), reply));
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
