use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Engine constants — defaults for the tunables called out in the spec.
pub const DEFAULT_WORKER_INTERVAL_MINUTES: u64 = 1;
pub const DEFAULT_COLLECTOR_BATCH_LIMIT: u32 = 100;
pub const DEFAULT_PROCESSOR_BATCH_LIMIT: u32 = 100;
pub const DEFAULT_FIRST_CONTACT_WINDOW_DAYS: i64 = 5;
pub const DEFAULT_LM_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_LM_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_LM_CACHE_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_SERVER_BIND: &str = "0.0.0.0";

/// Process-wide configuration, assembled from an optional TOML file layered
/// under environment variables. Every field has a compiled-in default so a
/// missing file or missing env var never prevents the process from starting;
/// only secrets with no sane default (API keys, tokens) are empty strings
/// until the operator supplies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadscoutConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub lm_api_url: String,
    #[serde(default)]
    pub lm_api_key: String,
    #[serde(default = "default_lm_model")]
    pub lm_model: String,
    #[serde(default = "default_lm_timeout_seconds")]
    pub lm_timeout_seconds: u64,
    #[serde(default = "default_lm_retry_attempts")]
    pub lm_retry_attempts: u32,
    #[serde(default = "default_lm_cache_ttl_seconds")]
    pub lm_cache_ttl_seconds: u64,

    #[serde(default = "default_chat_platform_api_url")]
    pub chat_platform_api_url: String,
    #[serde(default)]
    pub chat_platform_app_id: String,
    #[serde(default)]
    pub chat_platform_app_secret: String,

    /// Symmetric key used to wrap credential session blobs. Read here only
    /// so the config surface for the out-of-scope credential handshake is
    /// already in place; the core engine never uses this value itself.
    #[serde(default)]
    pub encryption_key: String,

    #[serde(default = "default_worker_interval_minutes")]
    pub worker_interval_minutes: u64,
    #[serde(default = "default_collector_batch_limit")]
    pub collector_batch_limit: u32,
    #[serde(default = "default_processor_batch_limit")]
    pub processor_batch_limit: u32,
    #[serde(default = "default_first_contact_window_days")]
    pub first_contact_window_days: i64,

    #[serde(default = "default_backend_internal_url")]
    pub backend_internal_url: String,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub bot_webhook_secret: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub smtp_from: String,

    #[serde(default = "default_server_bind")]
    pub server_bind: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Default for LeadscoutConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            lm_api_url: String::new(),
            lm_api_key: String::new(),
            lm_model: default_lm_model(),
            lm_timeout_seconds: default_lm_timeout_seconds(),
            lm_retry_attempts: default_lm_retry_attempts(),
            lm_cache_ttl_seconds: default_lm_cache_ttl_seconds(),
            chat_platform_api_url: default_chat_platform_api_url(),
            chat_platform_app_id: String::new(),
            chat_platform_app_secret: String::new(),
            encryption_key: String::new(),
            worker_interval_minutes: default_worker_interval_minutes(),
            collector_batch_limit: default_collector_batch_limit(),
            processor_batch_limit: default_processor_batch_limit(),
            first_contact_window_days: default_first_contact_window_days(),
            backend_internal_url: default_backend_internal_url(),
            bot_token: String::new(),
            bot_webhook_secret: String::new(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_from: String::new(),
            server_bind: default_server_bind(),
            server_port: default_server_port(),
        }
    }
}

fn default_database_url() -> String {
    "leadscout.db".to_string()
}
fn default_chat_platform_api_url() -> String {
    "https://api.chat-platform.example/v1".to_string()
}
fn default_lm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_lm_timeout_seconds() -> u64 {
    DEFAULT_LM_TIMEOUT_SECONDS
}
fn default_lm_retry_attempts() -> u32 {
    DEFAULT_LM_RETRY_ATTEMPTS
}
fn default_lm_cache_ttl_seconds() -> u64 {
    DEFAULT_LM_CACHE_TTL_SECONDS
}
fn default_worker_interval_minutes() -> u64 {
    DEFAULT_WORKER_INTERVAL_MINUTES
}
fn default_collector_batch_limit() -> u32 {
    DEFAULT_COLLECTOR_BATCH_LIMIT
}
fn default_processor_batch_limit() -> u32 {
    DEFAULT_PROCESSOR_BATCH_LIMIT
}
fn default_first_contact_window_days() -> i64 {
    DEFAULT_FIRST_CONTACT_WINDOW_DAYS
}
fn default_backend_internal_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_smtp_host() -> String {
    "localhost".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_server_bind() -> String {
    DEFAULT_SERVER_BIND.to_string()
}
fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

impl LeadscoutConfig {
    /// Load config from an optional TOML file with env var overrides.
    ///
    /// Precedence (lowest to highest): compiled-in defaults, TOML file,
    /// environment variables. Env var names match the field names
    /// case-insensitively (e.g. `DATABASE_URL`, `LM_API_KEY`).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::raw())
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = LeadscoutConfig::default();
        assert_eq!(cfg.worker_interval_minutes, 1);
        assert_eq!(cfg.first_contact_window_days, 5);
        assert_eq!(cfg.collector_batch_limit, 100);
        assert_eq!(cfg.processor_batch_limit, 100);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults_via_explicit_default() {
        // load() with a nonexistent path still extracts successfully because
        // every field carries a serde default.
        let cfg = LeadscoutConfig::load(Some("/nonexistent/leadscout.toml"))
            .unwrap_or_else(|_| LeadscoutConfig::default());
        assert_eq!(cfg.smtp_port, 587);
    }
}
