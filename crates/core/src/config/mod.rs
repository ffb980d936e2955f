//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OUTPOST_*)
//! 2. TOML config file (if OUTPOST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OUTPOST_*)
/// 2. TOML config file (if OUTPOST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the intercept server listens on.
    ///
    /// Set via OUTPOST_LISTEN environment variable.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Base URL of the single origin this proxy fronts.
    ///
    /// Set via OUTPOST_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to the SQLite store.
    ///
    /// Set via OUTPOST_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for origin requests.
    ///
    /// Set via OUTPOST_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Origin request timeout in milliseconds. Expiry is treated as a
    /// network failure and triggers the offline fallback.
    ///
    /// Set via OUTPOST_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cache generation tag for this deployment. Install writes under this
    /// tag; activation makes it current and retires every other tag.
    ///
    /// Set via OUTPOST_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Resources pre-warmed into the store at install time. Entries are
    /// origin-relative paths or absolute URLs.
    ///
    /// Set via OUTPOST_MANIFEST environment variable (comma-separated).
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// URL substrings that force a request to bypass the cache in both
    /// directions (live API traffic).
    ///
    /// Set via OUTPOST_BYPASS_PATTERNS environment variable (comma-separated).
    #[serde(default = "default_bypass_patterns")]
    pub bypass_patterns: Vec<String>,

    /// Origin-relative path of the document served to offline navigations
    /// when their own lookup misses. Also the push-notification open target.
    ///
    /// Set via OUTPOST_FALLBACK_PATH environment variable.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Title used for push-triggered notification descriptors.
    ///
    /// Set via OUTPOST_NOTIFICATION_TITLE environment variable.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./outpost-cache.sqlite")
}

fn default_user_agent() -> String {
    "outpost/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_generation() -> String {
    "outpost-v1".into()
}

fn default_manifest() -> Vec<String> {
    vec![
        "/".into(),
        "/static/css/style.css".into(),
        "/static/js/app.js".into(),
        "/static/favicon.ico".into(),
    ]
}

fn default_bypass_patterns() -> Vec<String> {
    vec!["googleapis.com".into(), "api.".into(), "/api/".into()]
}

fn default_fallback_path() -> String {
    "/".into()
}

fn default_notification_title() -> String {
    "Outpost".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            origin: default_origin(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            generation: default_generation(),
            manifest: default_manifest(),
            bypass_patterns: default_bypass_patterns(),
            fallback_path: default_fallback_path(),
            notification_title: default_notification_title(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin does not parse. `load`
    /// already checks this, so a loaded config can `?` without expecting
    /// failure.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OUTPOST_`
    /// 2. TOML file from `OUTPOST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OUTPOST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OUTPOST_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.listen, SocketAddr::from(([127, 0, 0, 1], 8787)));
        assert_eq!(config.origin, "http://127.0.0.1:5000");
        assert_eq!(config.db_path, PathBuf::from("./outpost-cache.sqlite"));
        assert_eq!(config.user_agent, "outpost/0.1");
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.generation, "outpost-v1");
        assert_eq!(config.manifest.len(), 4);
        assert!(config.manifest.contains(&"/".to_string()));
        assert_eq!(config.bypass_patterns, vec!["googleapis.com", "api.", "/api/"]);
        assert_eq!(config.fallback_path, "/");
        assert_eq!(config.notification_title, "Outpost");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_origin_url_parses() {
        let config = AppConfig::default();
        let url = config.origin_url().unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(5000));
    }

    #[test]
    fn test_origin_url_invalid() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }
}
