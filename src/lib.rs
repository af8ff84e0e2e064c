pub mod agents;
pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod llm;
pub mod storage;
pub mod tools;

pub use error::{ContentError, Result};
pub use config::Config;
pub use agents::{Agent, Crew, Task};
pub use content::{Article, ContentGenerator, ContentRequest};
