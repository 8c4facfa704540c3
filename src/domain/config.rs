//! Repository connection configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::ConfigError;

/// Environment variable holding the personal access token.
pub const TOKEN_ENV: &str = "REPOFS_TOKEN";
pub const BASE_URL_ENV: &str = "REPOFS_BASE_URL";
pub const PROJECT_ID_ENV: &str = "REPOFS_PROJECT_ID";
pub const BRANCH_ENV: &str = "REPOFS_BRANCH";

/// Largest page size the tree endpoint accepts.
pub const MAX_TREE_PAGE_SIZE: u32 = 100;

/// Connection settings loaded from `repofs.toml`.
///
/// The access token is deliberately not part of the file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Root URL of the hosting service (without `/api/v4`).
    pub base_url: Url,
    /// Numeric id or URL-encoded `namespace/name` of the project.
    pub project_id: String,
    /// Branch every read and commit targets.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the repository that callers' paths are relative to.
    #[serde(default)]
    pub prefix: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Entries requested per tree page.
    #[serde(default = "default_tree_page_size")]
    pub tree_page_size: u32,
}

impl RepositoryConfig {
    pub fn new(base_url: Url, project_id: impl Into<String>) -> Self {
        Self {
            base_url,
            project_id: project_id.into(),
            branch: default_branch(),
            prefix: String::new(),
            timeout_secs: default_timeout(),
            tree_page_size: default_tree_page_size(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid("project_id must not be empty".to_string()));
        }
        if self.branch.trim().is_empty() {
            return Err(ConfigError::Invalid("branch must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be greater than 0".to_string()));
        }
        if self.tree_page_size == 0 || self.tree_page_size > MAX_TREE_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "tree_page_size must be between 1 and {}",
                MAX_TREE_PAGE_SIZE
            )));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got '{}'",
                self.base_url.scheme()
            )));
        }
        Ok(())
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_tree_page_size() -> u32 {
    MAX_TREE_PAGE_SIZE
}

/// Personal access token, kept out of `Debug` output.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}
