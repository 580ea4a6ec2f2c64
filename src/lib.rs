//! Convenio-Search: crawl, extract and search professional-discount agreements
//!
//! This crate crawls a listing site of "convênios", extracts structured records
//! from each detail page, replaces the dataset atomically per crawl run, and
//! serves the records through a paginated, filterable full-text search API.

pub mod api;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod query;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Convenio-Search operations
#[derive(Debug, Error)]
pub enum ConvenioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Crawl job error: {0}")]
    Job(#[from] crawler::JobError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Convenio-Search operations
pub type Result<T> = std::result::Result<T, ConvenioError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEvent, JobCoordinator};
pub use extract::{Extractor, HeuristicExtractor};
pub use query::QueryEngine;
pub use storage::{DatasetStore, Record};
