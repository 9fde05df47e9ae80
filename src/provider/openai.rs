//! OpenAI-compatible chat completion client.

use super::{ChatMessage, CompletionRequest, ProviderClient, ProviderConfig, RawText};
use crate::error::{PipelineError, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Slack on the transport-level timeout so the wall-clock deadline fires first
const TRANSPORT_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for `POST <base_url>/chat/completions`
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout() + TRANSPORT_TIMEOUT_SLACK)
            .build()
            .map_err(|e| PipelineError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, request: &CompletionRequest) -> Result<RawText, ProviderError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(|e| self.map_http_error(e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.map_http_error(e))?;
        classify_response(status, text)
    }

    fn map_http_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                after: self.timeout,
            }
        } else if error.is_connect() {
            ProviderError::Transport(format!("Connection error: {}", error))
        } else {
            ProviderError::Transport(format!("HTTP error: {}", error))
        }
    }
}

/// Map an HTTP status and body to a provider outcome.
pub(crate) fn classify_response(status: u16, body: String) -> Result<RawText, ProviderError> {
    if status == 429 {
        return Err(ProviderError::RateLimited { body });
    }
    if !(200..300).contains(&status) {
        return Err(ProviderError::Upstream { status, body });
    }

    let envelope: ChatCompletionResponse = serde_json::from_str(&body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    // Some providers report quota problems inside a 200 payload.
    if envelope.error.as_ref().is_some_and(|e| !e.is_null()) {
        return Err(ProviderError::Upstream { status, body });
    }

    let choice = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;
    let content = choice
        .message
        .content
        .ok_or_else(|| ProviderError::InvalidResponse("Choice has no content".to_string()))?;

    Ok(RawText {
        content,
        finish_reason: choice.finish_reason,
    })
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    async fn call(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<RawText, ProviderError> {
        let started = Instant::now();
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            timeout_secs = self.timeout.as_secs(),
            "Sending provider request"
        );

        let result = tokio::select! {
            result = self.send(request) => result,
            _ = tokio::time::sleep(self.timeout) => Err(ProviderError::Timeout { after: self.timeout }),
            _ = cancel.cancelled() => Err(ProviderError::Timeout { after: started.elapsed() }),
        };

        let duration_ms = started.elapsed().as_millis();
        match &result {
            Ok(raw) => debug!(
                duration_ms,
                finish_reason = raw.finish_reason.as_deref().unwrap_or("unknown"),
                content_len = raw.content.len(),
                "Provider request completed"
            ),
            Err(ProviderError::RateLimited { .. }) => {
                warn!(duration_ms, model = %self.model, "Provider rate limited request")
            }
            Err(ProviderError::Timeout { .. }) => {
                warn!(duration_ms, model = %self.model, "Provider request timed out")
            }
            Err(e) => warn!(duration_ms, error = %e, "Provider request failed"),
        }
        result
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
