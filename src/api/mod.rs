pub mod auth;
pub mod pages;
pub mod web;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::auth::auth_middleware;
use crate::api::pages::PageRenderer;
use crate::config::Config;
use crate::content::{Article, ContentGenerator, ContentRequest};
use crate::error::{status_of, ContentError, Result};
use crate::storage::{ArticleStore, ArticleSummary, StorageStats};

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub generator: Arc<ContentGenerator>,
    pub store: Arc<ArticleStore>,
    pub pages: Arc<PageRenderer>,
}

impl AppState {
    pub fn new(config: Arc<Config>, generator: ContentGenerator) -> Result<Self> {
        let env_key = std::env::var(&config.llm.api_key_env)
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        let pages = PageRenderer::new(generator.has_search(), env_key)?;
        let store = ArticleStore::new(config.output.max_articles, config.output.directory.clone());

        Ok(Self {
            config,
            generator: Arc::new(generator),
            store: Arc::new(store),
            pages: Arc::new(pages),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/generate", post(api_generate))
        .route("/api/articles", get(api_list_articles))
        .route("/api/stats", get(api_stats))
        .route_layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    Router::new()
        .merge(web::create_web_router())
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ContentError::NetworkError(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Content server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .map_err(|e| ContentError::NetworkError(format!("Server error: {}", e)))?;

    Ok(())
}

async fn api_generate(
    State(state): State<AppState>,
    Json(request): Json<ContentRequest>,
) -> (StatusCode, Json<ApiResponse<Article>>) {
    let generated = match state.generator.generate(request).await {
        Ok(article) => state.store.insert(article.clone()).await.map(|_| article),
        Err(e) => Err(e),
    };

    match generated {
        Ok(article) => (StatusCode::OK, Json(ApiResponse::success(article))),
        Err(e) => (status_of(e.as_ref()), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn api_list_articles(State(state): State<AppState>) -> Json<ApiResponse<Vec<ArticleSummary>>> {
    Json(ApiResponse::success(state.store.list().await))
}

async fn api_stats(State(state): State<AppState>) -> Json<ApiResponse<StorageStats>> {
    Json(ApiResponse::success(state.store.stats().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockModel, MockProvider};
    use serde_json::{json, Value};

    async fn spawn_app(config: Config, responses: Vec<&str>) -> (String, Arc<MockModel>) {
        let model = Arc::new(MockModel::new(responses));
        let mut config = config;
        config.search.enabled = false;
        config.llm.api_key_env = "CONTENT_CREW_TEST_UNSET_API_KEY".to_string();
        let config = Arc::new(config);
        let generator = ContentGenerator::new(
            config.clone(),
            Arc::new(MockProvider::new(model.clone())),
            None,
        );
        let app = create_router(AppState::new(config, generator).unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), model)
    }

    fn blog_responses() -> Vec<&'static str> {
        vec![
            "Final Answer: research notes",
            "Final Answer: # Solar Power\n\n### Growth\nPanels are cheap.",
        ]
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let (base, _) = spawn_app(Config::default(), blog_responses()).await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        let page = client.get(&base).send().await.unwrap();
        assert!(page.status().is_success());
        let html = page.text().await.unwrap();
        assert!(html.contains("Enter topic for the blog post"));
        assert!(html.contains("Generate Content"));
    }

    #[tokio::test]
    async fn test_form_generation_and_download() {
        let (base, model) = spawn_app(Config::default(), blog_responses()).await;
        let client = reqwest::Client::new();

        let page = client
            .post(format!("{}/generate", base))
            .form(&[("topic", "Solar Power"), ("temperature", "0.5"), ("api_key", "k")])
            .send()
            .await
            .unwrap();
        assert!(page.status().is_success());
        let html = page.text().await.unwrap();
        assert!(html.contains("Generated Content"));
        assert!(html.contains("<h1>Solar Power</h1>"));
        assert_eq!(model.call_count(), 2);

        let articles: Value = client
            .get(format!("{}/api/articles", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = articles["data"][0]["id"].as_str().unwrap().to_string();
        assert!(html.contains(&format!("/articles/{}/download", id)));

        let download = client
            .get(format!("{}/articles/{}/download", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(download.headers()["content-type"], "text/markdown; charset=utf-8");
        assert!(download.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("filename=\"solar_power_article.md\""));
        assert_eq!(
            download.text().await.unwrap(),
            "# Solar Power\n\n### Growth\nPanels are cheap."
        );

        let again = client.get(format!("{}/articles/{}", base, id)).send().await.unwrap();
        assert!(again.text().await.unwrap().contains("<h3>Growth</h3>"));
    }

    #[tokio::test]
    async fn test_form_errors_rerender_form() {
        let (base, model) = spawn_app(Config::default(), blog_responses()).await;
        let client = reqwest::Client::new();

        let missing_topic = client
            .post(format!("{}/generate", base))
            .form(&[("topic", "  "), ("temperature", "0.7"), ("api_key", "k")])
            .send()
            .await
            .unwrap();
        assert_eq!(missing_topic.status().as_u16(), 422);
        assert!(missing_topic.text().await.unwrap().contains("An error occurred: Please enter a topic"));

        let missing_key = client
            .post(format!("{}/generate", base))
            .form(&[("topic", "Solar"), ("temperature", "0.7"), ("api_key", "")])
            .send()
            .await
            .unwrap();
        assert_eq!(missing_key.status().as_u16(), 422);
        let html = missing_key.text().await.unwrap();
        assert!(html.contains("API key is required"));
        assert!(html.contains(">Solar</textarea>"));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_form_temperature_field_handling() {
        let (base, model) = spawn_app(Config::default(), blog_responses()).await;
        let client = reqwest::Client::new();

        let blank = client
            .post(format!("{}/generate", base))
            .form(&[("topic", "Solar"), ("temperature", ""), ("api_key", "k")])
            .send()
            .await
            .unwrap();
        assert!(blank.status().is_success());
        assert!(blank.text().await.unwrap().contains("Generated Content"));
        assert_eq!(model.requests()[0].temperature, Config::default().llm.temperature);

        let garbled = client
            .post(format!("{}/generate", base))
            .form(&[("topic", "Solar"), ("temperature", "hot"), ("api_key", "k")])
            .send()
            .await
            .unwrap();
        assert_eq!(garbled.status().as_u16(), 422);
        let html = garbled.text().await.unwrap();
        assert!(html.contains("An error occurred:"));
        assert!(html.contains("Generate Content"));
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_bad_gateway() {
        let (base, _) = spawn_app(Config::default(), vec!["!error API key not valid"]).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/api/generate", base))
            .json(&json!({ "topic": "Solar", "api_key": "bad" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 502);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Content generation failed: LLM error: API key not valid");
    }

    #[tokio::test]
    async fn test_unknown_article_is_404() {
        let (base, _) = spawn_app(Config::default(), blog_responses()).await;
        let response = reqwest::get(format!("{}/articles/{}/download", base, uuid::Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_api_requires_token_when_configured() {
        let mut config = Config::default();
        config.server.api_token = Some("s3cret".to_string());
        let (base, _) = spawn_app(config, blog_responses()).await;
        let client = reqwest::Client::new();

        let denied = client.get(format!("{}/api/stats", base)).send().await.unwrap();
        assert_eq!(denied.status().as_u16(), 401);

        let created = client
            .post(format!("{}/api/generate", base))
            .bearer_auth("s3cret")
            .json(&json!({ "topic": "Solar", "api_key": "k", "temperature": 0.2 }))
            .send()
            .await
            .unwrap();
        assert!(created.status().is_success());
        let body: Value = created.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["file_name"], "solar_article.md");

        let stats: Value = client
            .get(format!("{}/api/stats", base))
            .bearer_auth("s3cret")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["data"]["total_articles"], 1);

        // the HTML form stays open
        let page = client.get(&base).send().await.unwrap();
        assert!(page.status().is_success());
    }
}
