use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CoreError, DEFAULT_BASE_URL, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Name of the per-directory config file that overrides the platform one.
pub const LOCAL_CONFIG_NAME: &str = ".textflow.toml";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub ingest: Option<IngestConfig>,
    pub account: Option<AccountConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub read_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub color: Option<bool>,
}

impl ConfigFile {
    /// A fully populated file holding the built-in defaults.
    pub fn with_defaults() -> Self {
        Self {
            server: Some(ServerConfig {
                base_url: Some(DEFAULT_BASE_URL.to_string()),
                request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            }),
            ingest: Some(IngestConfig {
                read_timeout_secs: Some(DEFAULT_READ_TIMEOUT_SECS),
            }),
            account: Some(AccountConfig::default()),
            display: Some(DisplayConfig { color: Some(true) }),
        }
    }
}

/// Platform config directory path: `<config_dir>/textflow/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("textflow").join("config.toml"))
}

/// Load config by cascading CWD `.textflow.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(LOCAL_CONFIG_NAME));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            base_url: overlay
                .server
                .as_ref()
                .and_then(|s| s.base_url.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.base_url.clone())),
            request_timeout_secs: overlay
                .server
                .as_ref()
                .and_then(|s| s.request_timeout_secs)
                .or_else(|| base.server.as_ref().and_then(|s| s.request_timeout_secs)),
        }),
        ingest: Some(IngestConfig {
            read_timeout_secs: overlay
                .ingest
                .as_ref()
                .and_then(|i| i.read_timeout_secs)
                .or_else(|| base.ingest.as_ref().and_then(|i| i.read_timeout_secs)),
        }),
        account: Some(AccountConfig {
            email: overlay
                .account
                .as_ref()
                .and_then(|a| a.email.clone())
                .or_else(|| base.account.as_ref().and_then(|a| a.email.clone())),
        }),
        display: Some(DisplayConfig {
            color: overlay
                .display
                .as_ref()
                .and_then(|d| d.color)
                .or_else(|| base.display.as_ref().and_then(|d| d.color)),
        }),
    }
}

/// Write `config` to `path`, creating parent directories as needed.
pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::Config(format!("Failed to create config directory: {}", e)))?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| CoreError::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)
        .map_err(|e| CoreError::Config(format!("Failed to write config: {}", e)))?;
    Ok(())
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, CoreError> {
    let path = config_path()
        .ok_or_else(|| CoreError::Config("Could not determine config directory".to_string()))?;
    save_to_path(config, &path)?;
    Ok(path)
}
