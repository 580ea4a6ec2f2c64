use serde::Deserialize;
use std::net::SocketAddr;

/// Main configuration structure for Convenio-Search
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Crawl source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First listing page of the site
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Domain patterns the crawler may follow links into (e.g. "*.example.com")
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Where the crawl stage writes the intermediate JSON array
    #[serde(rename = "artifact-path")]
    pub artifact_path: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Which dataset backend serves the records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite with an FTS5 index kept in sync by triggers
    Sqlite,
    /// External Meilisearch index
    Meilisearch,
}

/// Dataset store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Path to the SQLite database file
    #[serde(rename = "database-path", default)]
    pub database_path: String,

    /// Base URL of the Meilisearch server
    #[serde(rename = "meili-url", default)]
    pub meili_url: String,

    #[serde(rename = "meili-api-key", default)]
    pub meili_api_key: Option<String>,

    /// Index uid holding the records
    #[serde(rename = "meili-index", default = "default_meili_index")]
    pub meili_index: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "bind-address", default = "default_bind_address")]
    pub bind_address: String,

    /// Origins allowed by CORS; empty allows any origin
    #[serde(rename = "allowed-origins", default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl ServerConfig {
    /// Parses the bind address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_address.parse()
    }
}

/// Search presentation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(rename = "highlight-pre-tag", default = "default_pre_tag")]
    pub highlight_pre_tag: String,

    #[serde(rename = "highlight-post-tag", default = "default_post_tag")]
    pub highlight_post_tag: String,

    /// Number of autocomplete suggestions returned with a text search
    #[serde(rename = "suggestion-limit", default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Capacity of the progress event channel
    #[serde(rename = "progress-buffer", default = "default_progress_buffer")]
    pub progress_buffer: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            highlight_pre_tag: default_pre_tag(),
            highlight_post_tag: default_post_tag(),
            suggestion_limit: default_suggestion_limit(),
            progress_buffer: default_progress_buffer(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_meili_index() -> String {
    "convenios".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_pre_tag() -> String {
    "<mark>".to_string()
}

fn default_post_tag() -> String {
    "</mark>".to_string()
}

fn default_suggestion_limit() -> usize {
    5
}

fn default_progress_buffer() -> usize {
    256
}
