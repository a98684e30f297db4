/// LLM Client — the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the model API directly.
/// The extractor depends on the `CompletionModel` trait; `LlmClient` is the
/// production implementation, constructed once in `main` and injected.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM returned JSON that is not an object")]
    NotAnObject,
}

/// Requested output format for a completion.
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    /// Unconstrained JSON-object mode.
    JsonObject,
    /// Strict JSON-Schema-constrained mode.
    JsonSchema { name: String, schema: Value },
}

impl ResponseFormat {
    fn to_value(&self) -> Value {
        match self {
            ResponseFormat::JsonObject => json!({ "type": "json_object" }),
            ResponseFormat::JsonSchema { name, schema } => json!({
                "type": "json_schema",
                "json_schema": { "name": name, "strict": true, "schema": schema }
            }),
        }
    }
}

/// Everything the model needs for one completion, independent of model id.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    /// OpenAI multimodal content parts for the user message.
    pub user_content: Vec<Value>,
    pub response_format: ResponseFormat,
}

/// The model collaborator. Returns the raw text content of the completion.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, model: &str, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: Value,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// Chat Completions client. One HTTP attempt per call; fallback between
/// models is the extractor's job.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(
        api_key: String,
        api_url: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            api_url,
            max_tokens,
        })
    }

    /// Makes a raw call to the chat completions endpoint, returning the full response object.
    pub async fn call(&self, model: &str, request: &CompletionRequest) -> Result<ChatResponse, LlmError> {
        let body = ChatRequest {
            model,
            temperature: 0.0,
            max_tokens: self.max_tokens,
            response_format: request.response_format.to_value(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Value::String(request.system.clone()),
                },
                ChatMessage {
                    role: "user",
                    content: Value::Array(request.user_content.clone()),
                },
            ],
        };

        debug!(model, url = %self.api_url, "sending chat completion request");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(chat)
    }
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, model: &str, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = self.call(model, request).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }
}

/// Parses model output into a JSON object, tolerating markdown code fences.
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, LlmError> {
    match serde_json::from_str::<Value>(strip_json_fences(text))? {
        Value::Object(map) => Ok(map),
        _ => Err(LlmError::NotAnObject),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
