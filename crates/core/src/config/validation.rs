//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_prefix` is empty or contains characters other than `[A-Za-z0-9_-]`
    /// - `cache_version` is 0
    /// - a shell URL, the offline fallback, or a sync target does not resolve against the origin
    /// - the offline fallback is not one of the shell URLs
    /// - `backoff_base_secs` is 0 or greater than `backoff_max_secs`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `replay_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if no sync target is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if !self.cache_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(invalid("cache_prefix", "must contain only letters, digits, '-' and '_'"));
        }
        if self.cache_version == 0 {
            return Err(invalid("cache_version", "must be greater than 0"));
        }

        for suffix in &self.static_suffixes {
            if suffix.is_empty() {
                return Err(invalid("static_suffixes", "must not contain empty suffixes"));
            }
        }
        for prefix in &self.api_prefixes {
            if !prefix.starts_with('/') {
                return Err(invalid("api_prefixes", format!("'{prefix}' must start with '/'")));
            }
        }

        for shell_url in &self.shell_urls {
            origin.join(shell_url).map_err(|e| invalid("shell_urls", format!("'{shell_url}': {e}")))?;
        }
        if let Some(fallback) = &self.offline_fallback {
            origin.join(fallback).map_err(|e| invalid("offline_fallback", format!("'{fallback}': {e}")))?;
            if !self.shell_urls.contains(fallback) {
                return Err(invalid("offline_fallback", "must be listed in shell_urls so install caches it"));
            }
        }

        if self.sync_targets.is_empty() {
            return Err(ConfigError::Missing {
                field: "sync_targets".into(),
                hint: "Map at least one background-sync tag to a replay endpoint".into(),
            });
        }
        for (tag, endpoint) in &self.sync_targets {
            if tag.is_empty() {
                return Err(invalid("sync_targets", "tags must not be empty"));
            }
            origin.join(endpoint).map_err(|e| invalid("sync_targets", format!("'{tag}': {e}")))?;
        }

        if self.backoff_base_secs == 0 {
            return Err(invalid("backoff_base_secs", "must be greater than 0"));
        }
        if self.backoff_base_secs > self.backoff_max_secs {
            return Err(invalid("backoff_max_secs", "must not be less than backoff_base_secs"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.replay_timeout_ms < 100 {
            return Err(invalid("replay_timeout_ms", "must be at least 100ms"));
        }
        if self.replay_timeout_ms > 300_000 {
            return Err(invalid("replay_timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.api_max_entries == 0 {
            tracing::warn!("api_max_entries is 0; API responses will not be kept for offline use");
        }

        Ok(())
    }
}
