//! Client configuration.
//!
//! Values are layered: a JSON config file over the defaults, then the
//! `MEMORYMAP_*` environment variables over the file. Command-line flags are
//! applied last by the binary.

use crate::model::MapView;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1/memory-maps";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "MEMORYMAP_API_URL";
pub const ENV_AUTH_TOKEN: &str = "MEMORYMAP_AUTH_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "MEMORYMAP_TIMEOUT_SECS";

/// Errors loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Configuration for talking to the memory maps API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Bearer token; requests are anonymous without one.
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    /// View used for newly created maps.
    pub default_view: MapView,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_view: MapView::default(),
        }
    }
}

impl ClientConfig {
    /// Default config file location.
    ///
    /// On Linux: `~/.config/memorymap/config.json`
    /// On Windows: `%APPDATA%\memorymap\config.json`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .map(|base| base.join("memorymap").join("config.json"))
    }

    /// Load a config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Overlay values from a variable lookup.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => log::warn!("Ignoring {}={:?}: expected a positive number", ENV_TIMEOUT_SECS, raw),
            }
        }
        self
    }

    /// Overlay the process environment.
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration: the given file (or the default location
    /// if it exists), then the environment.
    ///
    /// An explicitly given file must exist; the default one is optional.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        Ok(base.with_env())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn load_default() -> Result<Self, ConfigError> {
        match Self::default_location() {
            Some(path) if path.exists() => {
                log::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn load_default() -> Result<Self, ConfigError> {
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.auth_token.is_none());
        assert_eq!(config.default_view.zoom, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"auth_token": "abc"}"#).unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("abc"));
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ClientConfig {
            api_base_url: "https://maps.example.test/api".to_string(),
            request_timeout_secs: 5,
            ..ClientConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(ClientConfig::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            ClientConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_lookup_overrides_file_values() {
        let config = ClientConfig {
            auth_token: Some("from-file".to_string()),
            ..ClientConfig::default()
        }
        .with_lookup(lookup(&[
            (ENV_API_URL, "https://maps.example.test/api"),
            (ENV_AUTH_TOKEN, "from-env"),
            (ENV_TIMEOUT_SECS, "5"),
        ]));
        assert_eq!(config.api_base_url, "https://maps.example.test/api");
        assert_eq!(config.auth_token.as_deref(), Some("from-env"));
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_bad_timeout_is_ignored() {
        let config = ClientConfig::default().with_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")]));
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_empty_token_clears() {
        let config = ClientConfig {
            auth_token: Some("from-file".to_string()),
            ..ClientConfig::default()
        }
        .with_lookup(lookup(&[(ENV_AUTH_TOKEN, "")]));
        assert!(config.auth_token.is_none());
    }
}
