//! Client configuration.
//!
//! Loaded from a RON file, by default `<config dir>/gymboard/config.ron`:
//!
//! ```ron
//! (
//!     base_url: "https://gym.example/api",
//!     request_timeout_secs: Some(15),
//! )
//! ```
//!
//! Every field is optional. `GYMBOARD_BASE_URL` overrides `base_url`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::constants::{
    BASE_URL_ENV, CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the remote store, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid base URL {0:?}")]
    BaseUrl(String),
}

impl ClientConfig {
    /// Default config file location, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validated()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), "loaded client config");
        Self::from_ron(&text)
    }

    /// Load from `path`, or from the default location if it exists, or fall
    /// back to defaults. An explicit path that can't be read is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(%url, "base URL overridden from environment");
            self.base_url = url;
        }
        self.validated()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        self.base_url = url.into();
        self.validated()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(self.base_url));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_fields_absent() {
        let config = ClientConfig::from_ron("()").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_load_from_file_trims_trailing_slash() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"(base_url: "https://gym.example/api/", request_timeout_secs: Some(15))"#
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.base_url, "https://gym.example/api");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ron");
        assert!(matches!(
            ClientConfig::load_or_default(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_override() {
        let config = ClientConfig::default()
            .apply_env(|key| (key == BASE_URL_ENV).then(|| "http://10.0.0.5:8080".to_string()))
            .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:8080");

        let untouched = ClientConfig::default().apply_env(|_| None).unwrap();
        assert_eq!(untouched.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(matches!(
            ClientConfig::default().with_base_url("ftp://gym"),
            Err(ConfigError::BaseUrl(_))
        ));
        assert!(ClientConfig::from_ron("(base_url: \"gym.example\")").is_err());
    }
}
