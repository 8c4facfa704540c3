//! Repository configuration loading from `repofs.toml` and the environment.

use std::path::{Path, PathBuf};

use crate::domain::config::{BASE_URL_ENV, BRANCH_ENV, PROJECT_ID_ENV, TOKEN_ENV};
use crate::domain::{AccessToken, ConfigError, RepositoryConfig};

/// Environment variable naming the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "REPOFS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "repofs.toml";

/// Validated settings plus the token they authenticate with.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub repository: RepositoryConfig,
    pub token: AccessToken,
}

/// Load the configuration.
///
/// The file is `explicit`, else `$REPOFS_CONFIG`, else `./repofs.toml` when it
/// exists. A named file that cannot be read is an error; with no file at all
/// every required key must come from the environment. `REPOFS_BASE_URL`,
/// `REPOFS_PROJECT_ID` and `REPOFS_BRANCH` override file values.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let mut table = match config_path(explicit) {
        Some(path) => read_table(&path)?,
        None => toml::Table::new(),
    };

    let overrides =
        [("base_url", BASE_URL_ENV), ("project_id", PROJECT_ID_ENV), ("branch", BRANCH_ENV)];
    for (key, var) in overrides {
        if let Some(value) = env_value(var) {
            table.insert(key.to_string(), toml::Value::String(value));
        }
    }

    let repository: RepositoryConfig = toml::Value::Table(table).try_into()?;
    repository.validate()?;

    let token = env_value(TOKEN_ENV)
        .map(AccessToken::new)
        .ok_or_else(|| ConfigError::MissingToken(TOKEN_ENV.to_string()))?;

    Ok(LoadedConfig { repository, token })
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| env_value(CONFIG_ENV).map(PathBuf::from)).or_else(
        || {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        },
    )
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    Ok(content.parse::<toml::Table>()?)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
