use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Config {
    /// Database location: the configured path, else the platform default.
    pub fn resolve_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the vision service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Retries after the first attempt on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Upper bound on a single backoff sleep.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Page-extraction calls in flight at once, per document.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u32,
    /// Split dense record pages into top/bottom halves before extraction.
    #[serde(default = "default_true")]
    pub split_record_pages: bool,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    4
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    60_000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_render_dpi() -> u32 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
            render_dpi: default_render_dpi(),
            split_record_pages: true,
        }
    }
}
