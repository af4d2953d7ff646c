use thiserror::Error;

/// Errors surfaced by the engine outside of planning, which never fails loudly.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The page could not be described at all (closed tab, lost connection).
    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("model provider error: {0}")]
    Provider(String),

    #[error("credential store error: {0}")]
    Credentials(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}
