use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_STEP_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Runtime settings, read from the environment (and `.env`, loaded by the binary).
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub step_delay: Duration,
    pub request_timeout: Duration,
    /// DevTools endpoint to attach to instead of launching Chrome.
    pub chrome_attach_url: Option<String>,
    pub credentials_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            model: get("BROWSER_AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("BROWSER_AGENT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            step_delay: Duration::from_millis(parse_u64(
                "BROWSER_AGENT_STEP_DELAY_MS",
                get("BROWSER_AGENT_STEP_DELAY_MS"),
                DEFAULT_STEP_DELAY_MS,
            )?),
            request_timeout: Duration::from_secs(parse_u64(
                "BROWSER_AGENT_REQUEST_TIMEOUT_SECS",
                get("BROWSER_AGENT_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            chrome_attach_url: get("BROWSER_AGENT_CHROME_URL"),
            credentials_path: get("BROWSER_AGENT_CREDENTIALS").map(PathBuf::from),
        })
    }
}

fn parse_u64(key: &str, raw: Option<String>, default: u64) -> Result<u64, AgentError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| AgentError::config(format!("{key} must be a whole number, got '{v}'"))),
    }
}
