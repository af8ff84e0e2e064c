use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ContentError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub crew: CrewConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,
    pub max_topic_length: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub api_base: String,
    pub api_key_env: String,
    pub timeout: String, // "120s"
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    pub enabled: bool,
    pub results: usize,
    pub endpoint: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrewConfig {
    pub verbose: bool,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
    pub max_articles: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8501,
                api_token: None,
                max_topic_length: 2000,
            },
            llm: LlmConfig {
                model: "gemini/gemini-1.5-pro-latest".to_string(),
                temperature: 0.7,
                api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                timeout: "120s".to_string(),
                max_retries: 3,
            },
            search: SearchConfig {
                enabled: true,
                results: 10,
                endpoint: "https://google.serper.dev/search".to_string(),
                api_key_env: "SERPER_API_KEY".to_string(),
            },
            crew: CrewConfig {
                verbose: true,
                max_iterations: 6,
            },
            output: OutputConfig {
                directory: None,
                max_articles: 100,
            },
        }
    }
}

impl LlmConfig {
    pub fn timeout_duration(&self) -> Result<Duration> {
        FileConfigManager::parse_time_to_duration(&self.timeout)
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ContentError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ContentError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        // server
        if config.server.host.trim().is_empty() {
            return Err(ContentError::ConfigError("server.host cannot be empty".to_string()).into());
        }
        if config.server.port < 1024 {
            return Err(ContentError::ConfigError("server.port must be between 1024 and 65535".to_string()).into());
        }
        if config.server.max_topic_length == 0 {
            return Err(ContentError::ConfigError("server.max_topic_length must be greater than 0".to_string()).into());
        }
        if let Some(ref token) = config.server.api_token {
            if token.trim().is_empty() {
                return Err(ContentError::ConfigError("server.api_token cannot be blank when set".to_string()).into());
            }
        }

        // llm
        if config.llm.model.trim().is_empty() {
            return Err(ContentError::ConfigError("llm.model cannot be empty".to_string()).into());
        }
        if !(0.0..=1.0).contains(&config.llm.temperature) {
            return Err(ContentError::ConfigError(format!("llm.temperature {} must be between 0.0 and 1.0", config.llm.temperature)).into());
        }
        if !Self::is_http_url(&config.llm.api_base) {
            return Err(ContentError::ConfigError("llm.api_base must start with http:// or https://".to_string()).into());
        }
        if !Self::is_valid_time_format(&config.llm.timeout) {
            return Err(ContentError::ConfigError(format!("Invalid llm.timeout format '{}', expected format like '90s', '2m'", config.llm.timeout)).into());
        }
        if config.llm.max_retries > 10 {
            return Err(ContentError::ConfigError("llm.max_retries cannot exceed 10".to_string()).into());
        }

        // search
        if config.search.results == 0 || config.search.results > 100 {
            return Err(ContentError::ConfigError("search.results must be between 1 and 100".to_string()).into());
        }
        if !Self::is_http_url(&config.search.endpoint) {
            return Err(ContentError::ConfigError("search.endpoint must start with http:// or https://".to_string()).into());
        }

        // crew
        if config.crew.max_iterations == 0 {
            return Err(ContentError::ConfigError("crew.max_iterations must be greater than 0".to_string()).into());
        }

        // output
        if config.output.max_articles == 0 {
            return Err(ContentError::ConfigError("output.max_articles must be greater than 0".to_string()).into());
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ContentError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ContentError::ConfigError(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| ContentError::ConfigError(format!("Failed to serialize default config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ContentError::ConfigError(format!("Failed to create config directory: {}", e)))?;
            }
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ContentError::ConfigError(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }

    fn is_http_url(url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    /// Validate time format (e.g., "90s", "2m", "1h")
    fn is_valid_time_format(time_str: &str) -> bool {
        Self::parse_time_to_duration(time_str).is_ok()
    }

    /// Parse time string to duration
    pub fn parse_time_to_duration(time_str: &str) -> Result<Duration> {
        let time_str = time_str.trim().to_lowercase();
        let multipliers = [
            ("s", 1),
            ("m", 60),
            ("h", 3600),
            ("d", 86400),
        ];

        for (suffix, multiplier) in &multipliers {
            if let Some(number_part) = time_str.strip_suffix(suffix) {
                let number: u64 = number_part.parse()
                    .map_err(|_| ContentError::ConfigError(format!("Invalid time format: {}", time_str)))?;
                let seconds = number.checked_mul(*multiplier).ok_or_else(|| {
                    ContentError::ConfigError(format!("Time value out of range: {}", time_str))
                })?;
                return Ok(Duration::from_secs(seconds));
            }
        }

        Err(ContentError::ConfigError(format!("Invalid time format: {}", time_str)).into())
    }
}
