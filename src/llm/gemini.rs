use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{ContentError, Result};
use crate::llm::{
    Completion, CompletionRequest, LanguageModel, LlmSettings, ModelProvider, Role, TokenUsage,
};

const MODEL_PREFIX: &str = "gemini/";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(client: Client, api_base: &str, settings: &LlmSettings, max_retries: u32) -> Self {
        let model = settings
            .model
            .strip_prefix(MODEL_PREFIX)
            .unwrap_or(&settings.model)
            .to_string();

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            api_key: settings.api_key.clone(),
            max_retries,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// Gemini has no system role in `contents`; system text goes to `systemInstruction`.
    pub fn build_body(request: &CompletionRequest) -> Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": request.temperature },
        });

        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }

        body
    }

    pub fn parse_response(body: &Value) -> Result<Completion> {
        if let Some(reason) = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(ContentError::LlmError(format!("Prompt was blocked: {}", reason)).into());
        }

        let candidate = body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| ContentError::LlmError("Response contained no candidates".to_string()))?;

        let text: String = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let finish = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN");
            return Err(ContentError::LlmError(format!("Empty completion (finish reason: {})", finish)).into());
        }

        let token = |name: &str| {
            body.pointer(&format!("/usageMetadata/{}", name))
                .and_then(Value::as_u64)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or(0)
        };

        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: token("promptTokenCount"),
                completion_tokens: token("candidatesTokenCount"),
                successful_requests: 1,
            },
        })
    }

    fn backoff(attempt: u32) -> Duration {
        let base = 500 * 2_u64.pow(attempt.min(5));
        let jitter = rand::thread_rng().gen_range(0..=250);
        Duration::from_millis(base + jitter)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = Self::build_body(&request);
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .post(self.endpoint())
                .header(API_KEY_HEADER, self.api_key.as_str())
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    ContentError::NetworkError(format!("Failed to reach Gemini API: {}", e.without_url()))
                })?;

            let status = response.status();
            if status.is_success() {
                let payload: Value = response
                    .json()
                    .await
                    .map_err(|e| ContentError::ParseError(format!("Invalid Gemini response: {}", e.without_url())))?;
                debug!("Gemini completion received from {}", self.model);
                return Self::parse_response(&payload);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                let delay = Self::backoff(attempt);
                warn!("Gemini API returned {}, retrying in {:?}", status, delay);
                sleep(delay).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(ContentError::LlmError(format!(
                "Gemini API request failed with status {}: {}",
                status, message
            ))
            .into());
        }
    }
}

/// Hands out [`GeminiClient`]s that share one connection pool.
pub struct GeminiProvider {
    client: Client,
    api_base: String,
    max_retries: u32,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout_duration()?)
            .build()
            .map_err(|e| ContentError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            max_retries: config.max_retries,
        })
    }
}

impl ModelProvider for GeminiProvider {
    fn model(&self, settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
        if settings.api_key.trim().is_empty() {
            return Err(ContentError::ValidationError("API key is required".to_string()).into());
        }
        Ok(Arc::new(GeminiClient::new(
            self.client.clone(),
            &self.api_base,
            settings,
            self.max_retries,
        )))
    }
}
