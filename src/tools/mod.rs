pub mod serper;

use async_trait::async_trait;

use crate::error::Result;

pub use serper::SerperDevTool;

/// Something an agent can call between reasoning steps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> String;
    fn description(&self) -> String;
    async fn run(&self, input: &str) -> Result<String>;
}
