//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL with a host
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `generation` is empty
    /// - `fallback_path` is not origin-relative
    /// - a bypass pattern or manifest entry is an empty string
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match origin.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {scheme}"),
                });
            }
        }
        if origin.host_str().is_none() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must have a host".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.generation.is_empty() {
            return Err(ConfigError::Invalid { field: "generation".into(), reason: "must not be empty".into() });
        }

        if !self.fallback_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "fallback_path".into(),
                reason: "must be an origin-relative path starting with '/'".into(),
            });
        }

        if self.bypass_patterns.iter().any(|p| p.is_empty()) {
            // An empty substring matches every URL, which would bypass the
            // cache wholesale.
            return Err(ConfigError::Invalid {
                field: "bypass_patterns".into(),
                reason: "patterns must not be empty strings".into(),
            });
        }

        if self.manifest.iter().any(|e| e.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "manifest".into(),
                reason: "entries must not be empty strings".into(),
            });
        }

        if !self.manifest.iter().any(|e| e == &self.fallback_path) {
            tracing::warn!(
                fallback_path = %self.fallback_path,
                "fallback_path is not in the manifest; offline navigations \
                 will only degrade gracefully once it is cached opportunistically"
            );
        }

        Ok(())
    }
}
