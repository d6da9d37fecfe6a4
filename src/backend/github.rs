//! GitHub Actions cache entry deletion
//!
//! Uses `DELETE /repos/{owner}/{repo}/actions/caches?key=<key>`. The HTTP
//! client is blocking, so each call runs on tokio's blocking pool.

use crate::backend::store::EntryPruner;
use crate::error::{XcacheError, XcacheResult};
use async_trait::async_trait;
use tracing::debug;

/// Deletes Actions cache entries through the REST API
#[derive(Clone)]
pub struct GithubPruner {
    api_url: String,
    repository: String,
    token: String,
}

impl std::fmt::Debug for GithubPruner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubPruner")
            .field("api_url", &self.api_url)
            .field("repository", &self.repository)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GithubPruner {
    /// `repository` is `owner/repo`
    pub fn new(api_url: impl Into<String>, repository: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            repository: repository.into(),
            token: token.into(),
        }
    }

    /// Endpoint for the repository's cache collection
    pub fn caches_url(&self) -> String {
        format!(
            "{}/repos/{}/actions/caches",
            self.api_url.trim_end_matches('/'),
            self.repository
        )
    }
}

#[async_trait]
impl EntryPruner for GithubPruner {
    async fn delete(&self, key: &str) -> XcacheResult<()> {
        let url = self.caches_url();
        let token = self.token.clone();
        let owned_key = key.to_string();
        debug!("DELETE {}?key={}", url, key);

        let result = tokio::task::spawn_blocking(move || {
            ureq::delete(&url)
                .header("Accept", "application/vnd.github+json")
                .header("Authorization", format!("Bearer {token}"))
                .header("X-GitHub-Api-Version", "2022-11-28")
                .query("key", &owned_key)
                .call()
        })
        .await
        .map_err(|e| XcacheError::Internal(format!("cache deletion task failed: {e}")))?;

        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(404)) => Err(XcacheError::CacheEntryNotFound { key: key.to_string() }),
            Err(ureq::Error::StatusCode(code)) => Err(XcacheError::CacheBackend(format!(
                "deleting cache {key} returned status {code}"
            ))),
            Err(e) => Err(XcacheError::CacheBackend(format!("deleting cache {key}: {e}"))),
        }
    }
}
