//! Cross-phase state persistence
//!
//! The restore phase records which key each cache domain was restored from;
//! the store phase reads it back to decide whether a save is needed.

use crate::cache::key::CacheDomain;
use crate::config::schema::StateKind;
use crate::config::{expand_home, Config, ConfigManager};
use crate::error::{XcacheError, XcacheResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Name/value storage shared between the two phases
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value; unset and empty values are `None`
    async fn get(&self, name: &str) -> XcacheResult<Option<String>>;

    async fn set(&self, name: &str, value: &str) -> XcacheResult<()>;
}

/// JSON object persisted to a file
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> XcacheResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(XcacheError::io(format!("reading state from {}", self.path.display()), e)),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, name: &str) -> XcacheResult<Option<String>> {
        let values = self.read_all().await?;
        Ok(values.get(name).filter(|v| !v.is_empty()).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> XcacheResult<()> {
        let mut values = self.read_all().await?;
        values.insert(name.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| XcacheError::io(format!("creating {}", parent.display()), e))?;
        }
        let content = serde_json::to_string_pretty(&values)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| XcacheError::io(format!("writing state to {}", self.path.display()), e))
    }
}

/// GitHub Actions step state
///
/// Values are appended to the `$GITHUB_STATE` file and come back to the
/// post step as `STATE_<name>` environment variables.
#[derive(Debug, Clone)]
pub struct GithubStateStore {
    state_file: Option<PathBuf>,
}

impl GithubStateStore {
    /// Use `$GITHUB_STATE` as the state file
    pub fn from_env() -> Self {
        Self {
            state_file: std::env::var_os("GITHUB_STATE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            state_file: Some(path.into()),
        }
    }
}

/// Heredoc record understood by the runner's state file parser
fn state_record(name: &str, value: &str) -> String {
    let digest = hex::encode(Sha256::digest(format!("{name}\n{value}")));
    let delimiter = format!("ghadelimiter_{}", &digest[..32]);
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

#[async_trait]
impl StateStore for GithubStateStore {
    async fn get(&self, name: &str) -> XcacheResult<Option<String>> {
        Ok(std::env::var(format!("STATE_{name}")).ok().filter(|v| !v.is_empty()))
    }

    async fn set(&self, name: &str, value: &str) -> XcacheResult<()> {
        let path = self
            .state_file
            .as_ref()
            .ok_or(XcacheError::ConfigMissing("GITHUB_STATE"))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| XcacheError::io(format!("opening {}", path.display()), e))?;
        file.write_all(state_record(name, value).as_bytes())
            .await
            .map_err(|e| XcacheError::io(format!("appending to {}", path.display()), e))?;
        Ok(())
    }
}

/// Default location of the file state store
pub fn default_state_file() -> PathBuf {
    ConfigManager::runner_temp_dir().join("xcache-state.json")
}

/// Create the configured state store
pub fn create_state_store(config: &Config) -> Box<dyn StateStore> {
    match config.state.kind {
        StateKind::File => {
            let path = config
                .state
                .file
                .as_deref()
                .map(expand_home)
                .unwrap_or_else(default_state_file);
            debug!("State file: {}", path.display());
            Box::new(FileStateStore::new(path))
        }
        StateKind::Github => Box::new(GithubStateStore::from_env()),
    }
}

/// Keys the restore phase actually restored, per domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredKeys {
    keys: BTreeMap<CacheDomain, String>,
}

impl RestoredKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the key `domain` was restored from
    ///
    /// Each domain is restored at most once per run.
    pub fn record(&mut self, domain: CacheDomain, key: impl Into<String>) -> XcacheResult<()> {
        if self.keys.contains_key(&domain) {
            return Err(XcacheError::StateConflict {
                domain: domain.to_string(),
            });
        }
        self.keys.insert(domain, key.into());
        Ok(())
    }

    pub fn get(&self, domain: CacheDomain) -> Option<&str> {
        self.keys.get(&domain).map(String::as_str)
    }

    /// Write every domain, clearing the ones that missed
    pub async fn persist(&self, store: &dyn StateStore) -> XcacheResult<()> {
        for domain in CacheDomain::ALL {
            let value = self.get(domain).unwrap_or_default();
            store.set(domain.state_name(), value).await?;
        }
        Ok(())
    }

    pub async fn load(store: &dyn StateStore) -> XcacheResult<Self> {
        let mut keys = Self::new();
        for domain in CacheDomain::ALL {
            if let Some(key) = store.get(domain.state_name()).await? {
                keys.record(domain, key)?;
            }
        }
        Ok(keys)
    }
}
