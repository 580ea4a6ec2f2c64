//! Dataset storage for convênio records
//!
//! Callers depend only on the [`DatasetStore`] trait. Two variants exist:
//! - [`SqliteStore`]: SQLite with an FTS5 index kept in sync by triggers;
//!   `replace_all` runs in one transaction and is atomic
//! - [`MeiliStore`]: an external Meilisearch index over HTTP; `replace_all`
//!   is delete-then-add and is not atomic
//!
//! The variant is chosen from configuration by [`open_store`].

mod meili;
mod schema;
mod sqlite;
pub mod text;
mod traits;

pub use meili::MeiliStore;
pub use sqlite::SqliteStore;
pub use traits::{DatasetStore, StorageError, StorageResult};

use crate::config::{StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One convênio as stored and served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD` or empty
    pub date: String,
    /// Category labels joined with `", "`
    #[serde(rename = "cats")]
    pub categories: String,
    /// Sanitized HTML
    pub content: String,
    /// Discount clauses joined with `", "`
    pub discounts: String,
}

impl Record {
    /// Splits the joined category field into trimmed, non-empty labels
    pub fn category_list(&self) -> Vec<String> {
        split_categories(&self.categories)
    }
}

pub(crate) fn split_categories(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if one label of the joined category field contains `wanted`
///
/// Both sides are accent folded and lowercased. Matching never spans the
/// `", "` separator, so every backend filters categories the same way.
///
/// ```
/// use convenio_search::storage::category_matches;
///
/// assert!(category_matches("Cultura, Educação", "educa"));
/// assert!(!category_matches("Cultura, Educação", "cultura, edu"));
/// ```
pub fn category_matches(joined: &str, wanted: &str) -> bool {
    let wanted = text::fold(wanted.trim());
    split_categories(joined)
        .iter()
        .any(|label| text::fold(label).contains(wanted.as_str()))
}

/// Columns a search can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Title,
    Date,
    Categories,
    Id,
}

impl SortField {
    /// Parses the wire name of a sortable column
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "title" => Some(Self::Title),
            "date" => Some(Self::Date),
            "cats" | "categories" => Some(Self::Categories),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    /// Column / attribute name in both backends
    pub fn column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Date => "date",
            Self::Categories => "cats",
            Self::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `desc` is ascending
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Marker pair wrapped around matched terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightTags {
    pub pre: String,
    pub post: String,
}

impl Default for HighlightTags {
    fn default() -> Self {
        Self {
            pre: "<mark>".to_string(),
            post: "</mark>".to_string(),
        }
    }
}

/// A validated search request as seen by a backend
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub sort_by: SortField,
    pub order: SortOrder,
    pub tags: HighlightTags,
}

impl SearchQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Copies of the searchable fields with matched terms wrapped in markers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlights {
    pub title: String,
    pub content: String,
    pub discounts: String,
}

impl Highlights {
    /// Highlights equal to the raw field values
    pub fn unmodified(record: &Record) -> Self {
        Self {
            title: record.title.clone(),
            content: record.content.clone(),
            discounts: record.discounts.clone(),
        }
    }
}

/// One row of a search result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: Record,
    pub highlight: Highlights,
}

/// Autocomplete entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
}

/// Opens the backend selected by configuration
pub async fn open_store(config: &StoreConfig) -> StorageResult<Arc<dyn DatasetStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            tracing::info!("Opening SQLite store at {}", config.database_path);
            let store = SqliteStore::new(Path::new(&config.database_path))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Meilisearch => {
            tracing::info!(
                "Using Meilisearch index '{}' at {}",
                config.meili_index,
                config.meili_url
            );
            let store = MeiliStore::new(
                &config.meili_url,
                &config.meili_index,
                config.meili_api_key.clone(),
            )?;
            store.ensure_index().await?;
            Ok(Arc::new(store))
        }
    }
}
