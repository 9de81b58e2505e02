//! The fetch boundary. Concrete HTTP/PDF fetchers are out of scope; this module only defines
//! the capability the orchestrator loop calls against, plus a deterministic
//! fixture-backed implementation for tests and `test-mode` runs.

use std::collections::BTreeMap;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no fixture registered for url '{0}'")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Failed(String),
}

/// The raw result of fetching one URL: body text plus whatever the fetcher
/// already knows about the host's authority (a real implementation would
/// derive tier/role from a per-category allowlist; the fixture fetcher
/// just carries it alongside the body).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FetchedPage {
    pub body: String,
    pub tier: specf_utils::types::Tier,
    pub role: specf_utils::types::SourceRole,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Canned responses keyed by exact URL, for tests and `test-mode run`.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: BTreeMap<String, FetchedPage>,
}

impl FixtureFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, page: FetchedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }
}

#[async_trait]
impl SourceFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.pages.get(url).cloned().ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}
