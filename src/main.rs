use anyhow::Context;
use content_crew::api::{start_server, AppState};
use content_crew::config::{ConfigManager, FileConfigManager};
use content_crew::content::ContentGenerator;
use content_crew::llm::GeminiProvider;
use content_crew::tools::{SerperDevTool, Tool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry GEMINI_API_KEY / SERPER_API_KEY
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config_manager = FileConfigManager::new(config_path);
    let config = config_manager
        .load_config()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load configuration")?;
    let config = Arc::new(config);

    tracing::info!("Starting Content Researcher & Writer");

    let provider = GeminiProvider::new(&config.llm)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to set up the Gemini client")?;

    let search: Option<Arc<dyn Tool>> = if config.search.enabled {
        match SerperDevTool::from_env(&config.search) {
            Ok(tool) => Some(Arc::new(tool)),
            Err(e) => {
                tracing::warn!("Web search disabled: {}", e);
                None
            }
        }
    } else {
        tracing::info!("Web search disabled in configuration");
        None
    };

    let generator = ContentGenerator::new(config.clone(), Arc::new(provider), search);
    let state = AppState::new(config, generator)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to build application state")?;

    start_server(state)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Server stopped with an error")?;

    tracing::info!("Content Researcher & Writer stopped.");
    Ok(())
}
