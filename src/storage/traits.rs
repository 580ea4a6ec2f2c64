//! Storage traits and error types
//!
//! This module defines the capability interface shared by both dataset
//! backends and their error type.

use crate::storage::{Record, SearchHit, SearchQuery, Suggestion};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Backend task {task_uid} failed: {message}")]
    TaskFailed { task_uid: u64, message: String },

    #[error("Timed out waiting for backend task {0}")]
    TaskTimeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Capability interface over the dataset backends
///
/// Text matching is accent-insensitive and tolerates partial terms. When the
/// backend's own text engine finds nothing, matching falls back to a folded
/// substring test over title, content and discounts. `count` applies exactly
/// the filter semantics of `search`.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Clears the dataset and inserts `records`
    async fn replace_all(&self, records: &[Record]) -> StorageResult<()>;

    /// One page of matching records with their highlights
    async fn search(&self, query: &SearchQuery) -> StorageResult<Vec<SearchHit>>;

    /// Number of records matching the text and category filters
    async fn count(&self, text: Option<&str>, category: Option<&str>) -> StorageResult<u64>;

    /// Cheap title lookup for autocomplete, ordered by title
    async fn suggestions(&self, text: &str, limit: usize) -> StorageResult<Vec<Suggestion>>;

    /// Every category label in use, deduplicated and sorted
    async fn categories(&self) -> StorageResult<Vec<String>>;

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<Record>>;

    /// Records whose category field contains `category`, ordered by title
    async fn by_category(&self, category: &str) -> StorageResult<Vec<Record>>;

    /// The whole dataset, ordered by title
    async fn all(&self) -> StorageResult<Vec<Record>>;
}
