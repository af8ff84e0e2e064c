pub mod prompts;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ContentError, Result};
use crate::llm::{LlmSettings, ModelProvider, TokenUsage};
use crate::tools::Tool;

pub use prompts::{build_content_crew, CrewSettings, RESEARCHER_ROLE, WRITER_ROLE};

pub const SEARCH_UNAVAILABLE_WARNING: &str =
    "Search tool initialization failed. Proceeding without search capability.";

/// What the user submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentRequest {
    pub topic: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub temperature: Option<f32>,
}

// Form posts send every value as text, and an empty field means "use the default".
fn optional_number<'de, D>(deserializer: D) -> std::result::Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f32),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid temperature: {:?}", text))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub topic: String,
    pub markdown: String,
    pub research: String,
    pub file_name: String,
    pub model: String,
    pub temperature: f32,
    pub created_at: DateTime<Utc>,
    pub usage: TokenUsage,
    pub warnings: Vec<String>,
}

/// `"Rust Async"` becomes `"rust_async_article.md"`.
pub fn download_file_name(topic: &str) -> String {
    let stem: String = topic
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' | '\\' | '"' | ':' | '*' | '?' | '<' | '>' | '|' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    if stem.is_empty() {
        "article.md".to_string()
    } else {
        format!("{}_article.md", stem)
    }
}

/// Turns a topic into an article by running the research and writing crew.
pub struct ContentGenerator {
    config: Arc<Config>,
    provider: Arc<dyn ModelProvider>,
    search: Option<Arc<dyn Tool>>,
}

impl ContentGenerator {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn ModelProvider>,
        search: Option<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            config,
            provider,
            search,
        }
    }

    pub fn default_temperature(&self) -> f32 {
        self.config.llm.temperature
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    fn resolve_api_key(&self, submitted: Option<&str>) -> Result<String> {
        submitted
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var(&self.config.llm.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .ok_or_else(|| ContentError::ValidationError("API key is required".to_string()).into())
    }

    /// Check a request and settle its model settings.
    pub fn validate(&self, request: &ContentRequest) -> Result<(String, LlmSettings)> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(ContentError::ValidationError("Please enter a topic".to_string()).into());
        }
        let max = self.config.server.max_topic_length;
        if topic.chars().count() > max {
            return Err(ContentError::ValidationError(format!("Topic is too long (max {} characters)", max)).into());
        }

        let temperature = request.temperature.unwrap_or(self.config.llm.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ContentError::ValidationError("Temperature must be between 0.0 and 1.0".to_string()).into());
        }

        let api_key = self.resolve_api_key(request.api_key.as_deref())?;

        Ok((
            topic.to_string(),
            LlmSettings {
                model: self.config.llm.model.clone(),
                temperature,
                api_key,
            },
        ))
    }

    pub async fn generate(&self, request: ContentRequest) -> Result<Article> {
        let (topic, settings) = self.validate(&request)?;

        let mut warnings = Vec::new();
        let tools: Vec<Arc<dyn Tool>> = match &self.search {
            Some(tool) => vec![tool.clone()],
            None => {
                if self.config.search.enabled {
                    warn!("{}", SEARCH_UNAVAILABLE_WARNING);
                    warnings.push(SEARCH_UNAVAILABLE_WARNING.to_string());
                }
                Vec::new()
            }
        };

        info!("Generating content for topic {:?} with {:?}", topic, settings);

        let output = self
            .run_crew(&topic, &settings, tools)
            .await
            .map_err(|e| {
                error!("Content generation failed for {:?}: {}", topic, e);
                ContentError::GenerationFailed(e)
            })?;

        let research = output
            .tasks_output
            .first()
            .map(|t| t.raw.clone())
            .unwrap_or_default();

        info!(
            "Generated {} chars for {:?} ({} tokens)",
            output.raw.len(),
            topic,
            output.token_usage.total_tokens()
        );

        Ok(Article {
            id: Uuid::new_v4(),
            file_name: download_file_name(&topic),
            topic,
            markdown: output.raw,
            research,
            model: settings.model,
            temperature: settings.temperature,
            created_at: Utc::now(),
            usage: output.token_usage,
            warnings,
        })
    }

    async fn run_crew(
        &self,
        topic: &str,
        settings: &LlmSettings,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Result<crate::agents::CrewOutput> {
        let llm = self.provider.model(settings)?;
        let crew = build_content_crew(
            llm,
            tools,
            &CrewSettings {
                temperature: settings.temperature,
                verbose: self.config.crew.verbose,
                max_iterations: self.config.crew.max_iterations,
            },
        )?;

        let inputs = HashMap::from([("topic".to_string(), topic.to_string())]);
        crew.kickoff(&inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockModel, MockProvider};
    use crate::tools::MockTool;

    fn generator(model: Arc<MockModel>, search: Option<Arc<dyn Tool>>) -> (ContentGenerator, Arc<MockProvider>) {
        let mut config = Config::default();
        config.llm.api_key_env = "CONTENT_CREW_TEST_UNSET_GEMINI_KEY".to_string();
        let provider = Arc::new(MockProvider::new(model));
        (
            ContentGenerator::new(Arc::new(config), provider.clone(), search),
            provider,
        )
    }

    fn request(topic: &str) -> ContentRequest {
        ContentRequest {
            topic: topic.to_string(),
            api_key: Some("form-key".to_string()),
            temperature: Some(0.3),
        }
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name("Rust Async Runtimes"), "rust_async_runtimes_article.md");
        assert_eq!(download_file_name("  AI/ML: \"hype\"?  "), "aiml_hype_article.md");
        assert_eq!(download_file_name("???"), "article.md");
        assert_eq!(download_file_name("Émile Zola"), "émile_zola_article.md");
    }

    #[test]
    fn test_request_temperature_accepts_text_and_numbers() {
        let from_json: ContentRequest =
            serde_json::from_value(serde_json::json!({ "topic": "Rust", "temperature": 0.3 })).unwrap();
        assert_eq!(from_json.temperature, Some(0.3));

        let from_text: ContentRequest =
            serde_json::from_value(serde_json::json!({ "topic": "Rust", "temperature": "0.5" })).unwrap();
        assert_eq!(from_text.temperature, Some(0.5));

        let blank: ContentRequest =
            serde_json::from_value(serde_json::json!({ "topic": "Rust", "temperature": "" })).unwrap();
        assert_eq!(blank.temperature, None);

        let missing: ContentRequest = serde_json::from_value(serde_json::json!({ "topic": "Rust" })).unwrap();
        assert_eq!(missing.temperature, None);

        let bad = serde_json::from_value::<ContentRequest>(serde_json::json!({ "topic": "Rust", "temperature": "hot" }));
        assert!(bad.unwrap_err().to_string().contains("invalid temperature"));
    }

    #[test]
    fn test_validation_errors() {
        let (generator, _) = generator(Arc::new(MockModel::new(vec!["x"])), None);

        let err = generator.validate(&request("   ")).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a topic");

        let mut no_key = request("Rust");
        no_key.api_key = Some("  ".to_string());
        let err = generator.validate(&no_key).unwrap_err();
        assert_eq!(err.to_string(), "API key is required");

        let mut hot = request("Rust");
        hot.temperature = Some(1.2);
        assert!(generator.validate(&hot).is_err());

        let long = request(&"x".repeat(2001));
        assert!(generator.validate(&long).is_err());
    }

    #[test]
    fn test_validation_uses_defaults_and_env_key() {
        let mut config = Config::default();
        config.llm.api_key_env = "CONTENT_CREW_TEST_ENV_GEMINI_KEY".to_string();
        std::env::set_var("CONTENT_CREW_TEST_ENV_GEMINI_KEY", "env-key");
        let generator = ContentGenerator::new(
            Arc::new(config),
            Arc::new(MockProvider::new(Arc::new(MockModel::new(vec!["x"])))),
            None,
        );

        let (topic, settings) = generator
            .validate(&ContentRequest { topic: " Rust ".to_string(), ..Default::default() })
            .unwrap();
        assert_eq!(topic, "Rust");
        assert_eq!(settings.api_key, "env-key");
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.model, "gemini/gemini-1.5-pro-latest");
    }

    #[tokio::test]
    async fn test_generate_runs_both_agents() {
        let model = Arc::new(MockModel::new(vec![
            "Thought: search\nAction: Search the internet\nAction Input: solid state batteries 2024",
            "Thought: I now know the final answer\nFinal Answer: ## Brief\n- fact [Source: https://example.com]",
            "Thought: I now can give a great answer\nFinal Answer: # Solid State Batteries\n\n### Why now\nText.",
        ]));
        let mut tool = MockTool::new();
        tool.expect_name().return_const("Search the internet".to_string());
        tool.expect_description().return_const("Searches the web".to_string());
        tool.expect_run()
            .times(1)
            .returning(|_| Ok("Title: Battery news\nLink: https://example.com\nSnippet: big".to_string()));
        let (generator, provider) = generator(model.clone(), Some(Arc::new(tool)));

        let article = generator.generate(request("Solid State Batteries")).await.unwrap();

        assert_eq!(article.markdown, "# Solid State Batteries\n\n### Why now\nText.");
        assert!(article.research.contains("[Source: https://example.com]"));
        assert_eq!(article.file_name, "solid_state_batteries_article.md");
        assert_eq!(article.temperature, 0.3);
        assert!(article.warnings.is_empty());
        assert_eq!(article.usage.successful_requests, 3);

        let settings = provider.settings();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].api_key, "form-key");

        let requests = model.requests();
        assert!(requests[0].messages[0].content.starts_with("You are Senior Research Analyst."));
        assert!(requests[0].messages[0].content.contains("information on Solid State Batteries from reliable web sources"));
        assert!(requests[0].messages[1].content.contains("Conduct comprehensive research on Solid State Batteries"));
        assert!(requests[2].messages[0].content.starts_with("You are Content Writer."));
        assert!(requests[2].messages[1].content.contains("## Brief"));
        assert!(requests.iter().all(|r| (r.temperature - 0.3).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_generate_without_search_warns() {
        let model = Arc::new(MockModel::new(vec!["Final Answer: brief", "Final Answer: # Post"]));
        let (generator, _) = generator(model.clone(), None);

        let article = generator.generate(request("Rust")).await.unwrap();
        assert_eq!(article.markdown, "# Post");
        assert_eq!(article.warnings, vec![SEARCH_UNAVAILABLE_WARNING.to_string()]);
        assert!(!model.requests()[0].messages[0].content.contains("Tool Name:"));
    }

    #[tokio::test]
    async fn test_generate_wraps_model_failure() {
        let model = Arc::new(MockModel::new(vec!["!error API key not valid"]));
        let (generator, _) = generator(model, None);

        let err = generator.generate(request("Rust")).await.unwrap_err();
        assert_eq!(err.to_string(), "Content generation failed: LLM error: API key not valid");
        assert_eq!(crate::error::status_of(err.as_ref()), axum::http::StatusCode::BAD_GATEWAY);
    }
}
