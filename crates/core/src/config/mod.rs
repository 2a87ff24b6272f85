//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HARBOR_*)
//! 2. TOML config file (if HARBOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HARBOR_*)
/// 2. TOML config file (if HARBOR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding cache namespaces and the sync queue.
    ///
    /// Set via HARBOR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the engine serves. Requests to any other origin pass through.
    ///
    /// Set via HARBOR_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix of every cache namespace name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Current cache version. Bumping it makes every older namespace stale.
    ///
    /// Set via HARBOR_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    /// Path suffixes classified as static assets (matched case-insensitively).
    #[serde(default = "default_static_suffixes")]
    pub static_suffixes: Vec<String>,

    /// Path prefixes classified as API requests.
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,

    /// App shell URLs warmed into the shell namespace on install.
    #[serde(default = "default_shell_urls")]
    pub shell_urls: Vec<String>,

    /// Document served from the shell namespace when a navigation cannot reach the network.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: Option<String>,

    /// Upper bound on entries kept in the API namespace; oldest entries are trimmed first.
    #[serde(default = "default_api_max_entries")]
    pub api_max_entries: usize,

    /// Background-sync tag to replay endpoint (resolved against `origin`).
    #[serde(default = "default_sync_targets")]
    pub sync_targets: BTreeMap<String, String>,

    /// Delay before the first retry of a failed replay, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Ceiling for the exponential replay backoff, in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via HARBOR_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest response body stored in a cache namespace. Larger responses
    /// are still served, just never cached.
    ///
    /// Set via HARBOR_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Timeout for a single replay request in milliseconds.
    ///
    /// Intercepted fetches carry no timeout of their own.
    #[serde(default = "default_replay_timeout_ms")]
    pub replay_timeout_ms: u64,

    /// Title used when a push payload carries none.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Icon used when a push payload carries none.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Badge used when a push payload carries none.
    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./harbor-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "harbor".into()
}

fn default_cache_version() -> u32 {
    1
}

fn default_static_suffixes() -> Vec<String> {
    [".js", ".css", ".woff", ".woff2", ".ttf", ".otf", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_prefixes() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_shell_urls() -> Vec<String> {
    vec!["/".into(), "/offline.html".into(), "/manifest.json".into()]
}

fn default_offline_fallback() -> Option<String> {
    Some("/offline.html".into())
}

fn default_api_max_entries() -> usize {
    500
}

fn default_sync_targets() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("review-sync".to_string(), "/api/review/sync".to_string()),
        ("progress-sync".to_string(), "/api/progress/sync".to_string()),
        ("statistics-sync".to_string(), "/api/statistics/sync".to_string()),
    ])
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_max_secs() -> u64 {
    3600
}

fn default_user_agent() -> String {
    "harbor/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_replay_timeout_ms() -> u64 {
    20_000
}

fn default_notification_title() -> String {
    "Harbor".into()
}

fn default_notification_icon() -> String {
    "/icons/icon-192.png".into()
}

fn default_notification_badge() -> String {
    "/icons/badge-72.png".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            static_suffixes: default_static_suffixes(),
            api_prefixes: default_api_prefixes(),
            shell_urls: default_shell_urls(),
            offline_fallback: default_offline_fallback(),
            api_max_entries: default_api_max_entries(),
            sync_targets: default_sync_targets(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            replay_timeout_ms: default_replay_timeout_ms(),
            notification_title: default_notification_title(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
        }
    }
}

impl AppConfig {
    /// Replay timeout as Duration for use with reqwest/tokio.
    pub fn replay_timeout(&self) -> Duration {
        Duration::from_millis(self.replay_timeout_ms)
    }

    /// Parsed serving origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        let url = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "scheme must be http or https".into() });
        }
        Ok(url)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HARBOR_`
    /// 2. TOML file from `HARBOR_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("HARBOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HARBOR_")
                .ignore(&["CONFIG_FILE"])
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
        assert_eq!(config.db_path, PathBuf::from("./harbor-cache.sqlite"));
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.cache_prefix, "harbor");
        assert_eq!(config.cache_version, 1);
        assert!(config.static_suffixes.contains(&".woff2".to_string()));
        assert_eq!(config.api_prefixes, vec!["/api/".to_string()]);
        assert_eq!(config.offline_fallback.as_deref(), Some("/offline.html"));
        assert_eq!(config.sync_targets.len(), 3);
        assert_eq!(config.sync_targets["review-sync"], "/api/review/sync");
        assert_eq!(config.backoff_base_secs, 30);
        assert_eq!(config.max_bytes, 5_242_880);
    }

    #[test]
    fn test_replay_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.replay_timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:3000/");

        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("HARBOR_CACHE_VERSION", "4");
            jail.set_env("HARBOR_ORIGIN", "https://app.example.com");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, 4);
            assert_eq!(config.origin, "https://app.example.com");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "harbor.toml",
                r#"
                cache_prefix = "flash"
                shell_urls = ["/", "/offline.html"]

                [sync_targets]
                review-sync = "/api/v2/review/sync"
                "#,
            )?;
            jail.set_env("HARBOR_CONFIG_FILE", "harbor.toml");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_prefix, "flash");
            assert_eq!(config.shell_urls.len(), 2);
            assert_eq!(config.sync_targets["review-sync"], "/api/v2/review/sync");
            Ok(())
        });
    }
}
