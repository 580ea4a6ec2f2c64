//! Query engine: the read path shared by both backends
//!
//! Turns raw request parameters into a [`SearchQuery`], runs the page, the
//! total count and the autocomplete lookup against the [`DatasetStore`], and
//! shapes the paginated response. A backend failure is logged and answered
//! with an empty result; only malformed paging is an error.

use crate::config::SearchConfig;
use crate::storage::{
    DatasetStore, HighlightTags, Highlights, Record, SearchHit, SearchQuery, SortField, SortOrder,
    Suggestion,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Caller errors in a list request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("page_size deve ser maior que zero")]
    InvalidPageSize,

    #[error("page deve ser maior que zero")]
    InvalidPage,
}

/// Query parameters of the list/search route, all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub category: Option<String>,
}

/// One page of results plus pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub data: Vec<SearchHit>,
    pub suggestions: Vec<Suggestion>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Number of pages needed for `total_items`
///
/// ```
/// use convenio_search::query::total_pages;
///
/// assert_eq!(total_pages(23, 10).unwrap(), 3);
/// assert_eq!(total_pages(20, 10).unwrap(), 2);
/// assert_eq!(total_pages(0, 10).unwrap(), 0);
/// assert!(total_pages(5, 0).is_err());
/// ```
pub fn total_pages(total_items: u64, page_size: u32) -> Result<u64, QueryError> {
    if page_size == 0 {
        return Err(QueryError::InvalidPageSize);
    }
    let size = u64::from(page_size);
    Ok(total_items / size + u64::from(total_items % size != 0))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct QueryEngine {
    store: Arc<dyn DatasetStore>,
    tags: HighlightTags,
    suggestion_limit: usize,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn DatasetStore>, tags: HighlightTags, suggestion_limit: usize) -> Self {
        Self {
            store,
            tags,
            suggestion_limit,
        }
    }

    pub fn from_config(store: Arc<dyn DatasetStore>, config: &SearchConfig) -> Self {
        Self::new(
            store,
            HighlightTags {
                pre: config.highlight_pre_tag.clone(),
                post: config.highlight_post_tag.clone(),
            },
            config.suggestion_limit,
        )
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }

    /// Validates paging and applies defaults
    ///
    /// An unknown `sort_by` sorts by title; any `order` other than `desc`
    /// is ascending.
    pub fn build_query(&self, params: &ListParams) -> Result<SearchQuery, QueryError> {
        let page = params.page.unwrap_or(DEFAULT_PAGE);
        let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page_size == 0 {
            return Err(QueryError::InvalidPageSize);
        }
        if page == 0 {
            return Err(QueryError::InvalidPage);
        }

        let sort_by = params
            .sort_by
            .as_deref()
            .and_then(SortField::parse)
            .unwrap_or_default();
        let order = params
            .order
            .as_deref()
            .map(SortOrder::parse)
            .unwrap_or_default();

        Ok(SearchQuery {
            text: non_blank(&params.search),
            category: non_blank(&params.category),
            page,
            page_size,
            sort_by,
            order,
            tags: self.tags.clone(),
        })
    }

    /// Runs a list/search request
    pub async fn list(&self, params: &ListParams) -> Result<ListResponse, QueryError> {
        let query = self.build_query(params)?;
        let text = query.text.as_deref();
        let category = query.category.as_deref();

        let (hits, total, suggestions) = tokio::join!(
            self.store.search(&query),
            self.store.count(text, category),
            self.suggestions(text),
        );

        let mut data = hits.unwrap_or_else(|e| {
            tracing::error!("Search failed on {}: {}", self.store.backend_name(), e);
            Vec::new()
        });
        let total_items = total.unwrap_or_else(|e| {
            tracing::error!("Count failed on {}: {}", self.store.backend_name(), e);
            0
        });

        if text.is_none() {
            for hit in &mut data {
                hit.highlight = Highlights::unmodified(&hit.record);
            }
        }

        Ok(ListResponse {
            data,
            suggestions,
            page: query.page,
            page_size: query.page_size,
            total_items,
            total_pages: total_pages(total_items, query.page_size)?,
        })
    }

    /// Autocomplete titles; empty without search text
    async fn suggestions(&self, text: Option<&str>) -> Vec<Suggestion> {
        let Some(text) = text else {
            return Vec::new();
        };
        self.store
            .suggestions(text, self.suggestion_limit)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Suggestions failed on {}: {}", self.store.backend_name(), e);
                Vec::new()
            })
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        self.store.get_by_id(id).await.unwrap_or_else(|e| {
            tracing::error!("Lookup of {} failed: {}", id, e);
            None
        })
    }

    pub async fn by_category(&self, category: &str) -> Vec<Record> {
        tracing::info!("Fetching convênios for category {}", category);
        self.store.by_category(category).await.unwrap_or_else(|e| {
            tracing::error!("Category lookup failed: {}", e);
            Vec::new()
        })
    }

    pub async fn categories(&self) -> Vec<String> {
        self.store.categories().await.unwrap_or_else(|e| {
            tracing::error!("Listing categories failed: {}", e);
            Vec::new()
        })
    }

    pub async fn all(&self) -> Vec<Record> {
        self.store.all().await.unwrap_or_else(|e| {
            tracing::error!("Listing records failed: {}", e);
            Vec::new()
        })
    }
}
