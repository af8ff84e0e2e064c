use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Content generation failed: {0}")]
    GenerationFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ContentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ContentError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ContentError::NotFound(_) => StatusCode::NOT_FOUND,
            ContentError::NetworkError(_)
            | ContentError::LlmError(_)
            | ContentError::ToolError(_)
            | ContentError::AgentError(_) => StatusCode::BAD_GATEWAY,
            ContentError::ParseError(_)
            | ContentError::StorageError(_)
            | ContentError::ConfigError(_)
            | ContentError::RenderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ContentError::GenerationFailed(source) => status_of(source.as_ref()),
        }
    }
}

/// Status code for a boxed crate error, falling back to 500 for foreign errors.
pub fn status_of(err: &(dyn std::error::Error + Send + Sync + 'static)) -> StatusCode {
    err.downcast_ref::<ContentError>()
        .map(ContentError::status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// Conversion implementations for common error types
impl From<std::io::Error> for ContentError {
    fn from(err: std::io::Error) -> Self {
        ContentError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        ContentError::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for ContentError {
    fn from(err: toml::de::Error) -> Self {
        ContentError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ContentError {
    fn from(err: reqwest::Error) -> Self {
        ContentError::NetworkError(err.to_string())
    }
}

impl From<minijinja::Error> for ContentError {
    fn from(err: minijinja::Error) -> Self {
        ContentError::RenderError(err.to_string())
    }
}
