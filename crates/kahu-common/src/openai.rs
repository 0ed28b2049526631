use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conversation::{ConversationTurn, TurnRole};

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_error_body_bytes: usize,
}

impl OpenAiClientConfig {
    /// Read the client settings from the environment.
    ///
    /// Every variable is optional; unparseable numbers fall back to the defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "http://ai:8001/v1".to_string());

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let default_timeout = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(15));

        let temperature = std::env::var("KAHU_LLM_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .unwrap_or(0.1);

        let max_tokens = std::env::var("KAHU_LLM_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok());

        let max_error_body_bytes = std::env::var("OPENAI_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_timeout,
            temperature,
            max_tokens,
            max_error_body_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("completion has no choices")]
    EmptyChoices,

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

/// A single-shot text completion endpoint.
///
/// `history` is sent in order between the system prompt and the user message.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String, OpenAiClientError>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    model: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig, model: impl Into<String>) -> Result<Self, OpenAiClientError> {
        let http = reqwest::Client::builder()
            .user_agent("kahu/recommender")
            .build()?;
        Ok(Self {
            config,
            model: model.into(),
            http,
        })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /chat/completions once. There are no retries: callers that need availability
    /// handle the error themselves.
    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut builder = self
            .http
            .post(&url)
            .timeout(self.config.default_timeout)
            .json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;

        if resp.status().is_success() {
            return Ok(resp.json::<ChatCompletionResponse>().await?);
        }
        Err(Self::to_upstream_error(resp, self.config.max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> OpenAiClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return OpenAiClientError::Upstream { status, message };
        }
        OpenAiClientError::UpstreamBody { status, body }
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String, OpenAiClientError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(system_prompt, history, user_message),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
        };

        let response = self.chat_completions(&request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(OpenAiClientError::EmptyChoices)
    }
}

/// Lay out a chat request: system prompt, prior turns in order, then the new user message.
pub fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    user_message: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });
    for turn in history {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        messages.push(Message {
            role: role.to_string(),
            content: turn.text.clone(),
        });
    }
    messages.push(Message {
        role: "user".to_string(),
        content: user_message.to_string(),
    });
    messages
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(b) => {
            let end = b.len().min(max_bytes);
            String::from_utf8_lossy(&b[..end]).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorObject,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorObject {
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}
