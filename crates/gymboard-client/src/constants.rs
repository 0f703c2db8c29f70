//! Client configuration constants.
//!
//! Centralizes the defaults a [`ClientConfig`](crate::ClientConfig) falls back
//! to when a field is absent.

/// Base URL of the remote board store for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// `User-Agent` header sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("gymboard/", env!("CARGO_PKG_VERSION"));

/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "GYMBOARD_BASE_URL";

/// Directory under the platform config dir holding gymboard settings.
pub const CONFIG_DIR_NAME: &str = "gymboard";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.ron";
