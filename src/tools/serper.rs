use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::error::{ContentError, Result};
use crate::tools::Tool;

pub const TOOL_NAME: &str = "Search the internet";

/// Google search through the serper.dev API.
pub struct SerperDevTool {
    client: Client,
    endpoint: String,
    api_key: String,
    results: usize,
}

impl SerperDevTool {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, results: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ContentError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            results,
        })
    }

    /// Build the tool from config, reading the key from the configured environment variable.
    pub fn from_env(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ContentError::ToolError(format!("{} is not set", config.api_key_env)))?;

        info!("Serper search enabled with {} results per query", config.results);
        Self::new(config.endpoint.clone(), api_key, config.results)
    }

    pub fn format_results(body: &Value, limit: usize) -> String {
        let mut sections = Vec::new();

        if let Some(kg) = body.get("knowledgeGraph") {
            let title = kg.get("title").and_then(Value::as_str).unwrap_or_default();
            let description = kg.get("description").and_then(Value::as_str).unwrap_or_default();
            if !title.is_empty() || !description.is_empty() {
                sections.push(format!("Knowledge Graph: {}\n{}", title, description).trim_end().to_string());
            }
        }

        let organic = body
            .get("organic")
            .and_then(Value::as_array)
            .map(|items| items.iter().take(limit).collect::<Vec<_>>())
            .unwrap_or_default();

        for item in organic {
            let field = |name: &str| item.get(name).and_then(Value::as_str).unwrap_or_default();
            sections.push(format!(
                "Title: {}\nLink: {}\nSnippet: {}",
                field("title"),
                field("link"),
                field("snippet")
            ));
        }

        if sections.is_empty() {
            return "No results found".to_string();
        }

        format!("Search results:\n\n{}", sections.join("\n---\n"))
    }
}

#[async_trait]
impl Tool for SerperDevTool {
    fn name(&self) -> String {
        TOOL_NAME.to_string()
    }

    fn description(&self) -> String {
        "Searches the internet with a query and returns titles, links and snippets of the top results. \
         Input should be a plain search query."
            .to_string()
    }

    async fn run(&self, input: &str) -> Result<String> {
        let query = input.trim().trim_matches('"');
        if query.is_empty() {
            return Err(ContentError::ToolError("Search query cannot be empty".to_string()).into());
        }

        debug!("Searching the internet for {:?}", query);
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": self.results }))
            .send()
            .await
            .map_err(|e| ContentError::NetworkError(format!("Failed to reach Serper: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ContentError::ToolError(format!(
                "Serper search failed with status {}: {}",
                status, body
            ))
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ContentError::ParseError(format!("Invalid Serper response: {}", e)))?;

        Ok(Self::format_results(&body, self.results))
    }
}
