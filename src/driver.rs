use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The primitive failed but the page is still usable.
    #[error("{0}")]
    Failed(String),

    /// The page or browser is gone; nothing further can run against it.
    #[error("page closed: {0}")]
    Closed(String),
}

impl DriverError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DriverError::Closed(_))
    }
}

/// The primitives the engine needs from one browser page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn fill(&self, selector: &str, text: &str, timeout: Duration)
    -> Result<(), DriverError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
    -> Result<(), DriverError>;

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Evaluate a script and return its value. Scripts that build structured
    /// data return it as a JSON string.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    async fn url(&self) -> Result<String, DriverError>;

    /// Full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
}
