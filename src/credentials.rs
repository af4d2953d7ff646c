use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AgentError;

const APP_DIR: &str = "ai-browser-agent";
const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Site credentials kept in a JSON file readable only by the owner.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform's local data directory.
    pub fn default_location() -> Result<Self, AgentError> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| AgentError::Credentials("no local data directory".into()))?;
        Ok(Self::new(dir.join(APP_DIR).join(CREDENTIALS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self, site: &str, username: &str, password: &str) -> Result<(), AgentError> {
        let site = normalize_site(site)?;
        let mut all = self.load()?;
        all.insert(
            site.clone(),
            Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        self.save(&all)?;
        info!(%site, "credentials stored");
        Ok(())
    }

    pub fn get(&self, site: &str) -> Result<Option<Credentials>, AgentError> {
        let site = normalize_site(site)?;
        Ok(self.load()?.remove(&site))
    }

    fn load(&self) -> Result<BTreeMap<String, Credentials>, AgentError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = std::fs::File::open(&self.path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn save(&self, all: &BTreeMap<String, Credentials>) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&self.path)?;
        serde_json::to_writer_pretty(file, all)?;
        Ok(())
    }
}

/// `https://GitHub.com/login` and `github.com` share one entry.
fn normalize_site(site: &str) -> Result<String, AgentError> {
    let trimmed = site.trim();
    let parsed_host = url::Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string));
    let host = parsed_host
        .unwrap_or_else(|| trimmed.split('/').next().unwrap_or_default().to_string());
    let host = host.to_ascii_lowercase();
    if host.is_empty() {
        return Err(AgentError::Credentials("site must not be empty".into()));
    }
    Ok(host)
}
