//! Scripted model for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ContentError, Result};
use crate::llm::{
    Completion, CompletionRequest, LanguageModel, LlmSettings, ModelProvider, TokenUsage,
};

/// Returns predefined responses in sequence and keeps every request it saw.
///
/// Once the script is exhausted the last response is repeated. A response
/// beginning with `!error ` is returned as an LLM error instead.
#[derive(Debug)]
pub struct MockModel {
    model_id: String,
    responses: Vec<String>,
    index: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockModel {
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            model_id: "mock-model".to_string(),
            responses: responses.into_iter().map(Into::into).collect(),
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let index = self.index.fetch_add(1, Ordering::SeqCst);
        let text = self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();

        if let Some(message) = text.strip_prefix("!error ") {
            return Err(ContentError::LlmError(message.to_string()).into());
        }

        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                successful_requests: 1,
            },
        })
    }
}

/// Provider that always hands out the same [`MockModel`] and records the settings it was asked for.
#[derive(Debug)]
pub struct MockProvider {
    model: Arc<MockModel>,
    settings: Mutex<Vec<LlmSettings>>,
}

impl MockProvider {
    pub fn new(model: Arc<MockModel>) -> Self {
        Self {
            model,
            settings: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> Vec<LlmSettings> {
        self.settings.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ModelProvider for MockProvider {
    fn model(&self, settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
        if let Ok(mut seen) = self.settings.lock() {
            seen.push(settings.clone());
        }
        Ok(self.model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user(text)],
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_mock_model_repeats_last_response() {
        let model = MockModel::new(vec!["first", "second"]);

        assert_eq!(model.complete(request("a")).await.unwrap().text, "first");
        assert_eq!(model.complete(request("b")).await.unwrap().text, "second");
        assert_eq!(model.complete(request("c")).await.unwrap().text, "second");

        let seen = model.requests();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].messages[0].content, "c");
    }

    #[tokio::test]
    async fn test_mock_model_scripted_error() {
        let model = MockModel::new(vec!["!error quota exceeded"]).with_model_id("custom-mock");
        let err = model.complete(request("a")).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(model.model_id(), "custom-mock");
    }
}
