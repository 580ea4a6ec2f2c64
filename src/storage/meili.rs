//! Meilisearch storage implementation
//!
//! Records are kept in one index with `id` as primary key. Each document also
//! carries a `categories` array so the category filter can run inside the
//! engine; category text is first resolved to the matching labels and then
//! sent as an `IN [...]` filter.
//!
//! Every write returns an asynchronous task that is polled until it finishes.

use crate::storage::text;
use crate::storage::traits::{DatasetStore, StorageError, StorageResult};
use crate::storage::{
    category_matches, split_categories, Highlights, Record, SearchHit, SearchQuery, SortField, SortOrder,
    Suggestion,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

const DOCUMENT_PAGE: usize = 1000;
const TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Meilisearch storage backend
pub struct MeiliStore {
    client: Client,
    base: Url,
    index: String,
    api_key: Option<String>,
    task_timeout: Duration,
}

/// Category part of a search request
enum CategoryFilter {
    /// No category requested
    Any,
    /// Engine filter expression over the matching labels
    Labels(String),
    /// No label matches, so nothing can
    Nothing,
}

/// Document shape inside the index
#[derive(Debug, Serialize)]
struct Document<'a> {
    #[serde(flatten)]
    record: &'a Record,
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TaskInfo {
    #[serde(rename = "taskUid")]
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<H> {
    hits: Vec<H>,
    #[serde(rename = "totalHits", default)]
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(flatten)]
    record: Record,
    #[serde(rename = "_formatted", default)]
    formatted: Option<Formatted>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Formatted {
    title: String,
    content: String,
    discounts: String,
}

#[derive(Debug, Deserialize)]
struct DocumentsPage {
    results: Vec<Record>,
}

impl MeiliStore {
    /// Creates a client for `index` on the server at `base_url`
    pub fn new(base_url: &str, index: &str, api_key: Option<String>) -> StorageResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| StorageError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base,
            index: index.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        })
    }

    /// Overrides how long writes wait for their task to finish
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Creates the index if missing and applies its settings
    pub async fn ensure_index(&self) -> StorageResult<()> {
        let info: TaskInfo = self
            .send_json(
                self.request(Method::POST, &["indexes"])?
                    .json(&json!({ "uid": self.index, "primaryKey": "id" })),
            )
            .await?;

        let task = self.wait_for_task(info.task_uid).await?;
        let exists = task.status == "failed"
            && task
                .error
                .as_ref()
                .is_some_and(|e| e.code == "index_already_exists");
        if exists {
            tracing::debug!("Index '{}' already exists", self.index);
        } else {
            Self::check_task(info.task_uid, task)?;
        }

        self.apply_settings().await?;
        tracing::info!("Meilisearch index '{}' ready", self.index);
        Ok(())
    }

    /// Declares the searchable, filterable and sortable attributes
    async fn apply_settings(&self) -> StorageResult<()> {
        let settings = json!({
            "searchableAttributes": ["title", "content", "discounts"],
            "filterableAttributes": ["categories"],
            "sortableAttributes": ["title", "date", "cats", "id"],
        });
        let info: TaskInfo = self
            .send_json(
                self.request(Method::PATCH, &["indexes", &self.index, "settings"])?
                    .json(&settings),
            )
            .await?;
        self.complete(info.task_uid).await
    }

    fn endpoint(&self, segments: &[&str]) -> StorageResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> StorageResult<RequestBuilder> {
        let builder = self.client.request(method, self.endpoint(segments)?);
        Ok(match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> StorageResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or(body);
        Err(StorageError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> StorageResult<T> {
        let response = self.send(builder).await?;
        Ok(response.json::<T>().await?)
    }

    /// Polls a task until it leaves the queue
    async fn wait_for_task(&self, task_uid: u64) -> StorageResult<Task> {
        let uid = task_uid.to_string();
        let deadline = tokio::time::Instant::now() + self.task_timeout;

        loop {
            let task: Task = self
                .send_json(self.request(Method::GET, &["tasks", &uid])?)
                .await?;
            match task.status.as_str() {
                "succeeded" | "failed" | "canceled" => return Ok(task),
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StorageError::TaskTimeout(task_uid));
            }
            tokio::time::sleep(TASK_POLL_INTERVAL).await;
        }
    }

    fn check_task(task_uid: u64, task: Task) -> StorageResult<()> {
        if task.status == "succeeded" {
            return Ok(());
        }
        let message = task
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("task {}", task.status));
        Err(StorageError::TaskFailed { task_uid, message })
    }

    async fn complete(&self, task_uid: u64) -> StorageResult<()> {
        let task = self.wait_for_task(task_uid).await?;
        Self::check_task(task_uid, task)
    }

    /// Resolves the category text to the labels containing it
    async fn category_filter(&self, category: Option<&str>) -> StorageResult<CategoryFilter> {
        let Some(category) = non_empty(category) else {
            return Ok(CategoryFilter::Any);
        };

        let wanted = text::fold(category);
        let labels: Vec<String> = self
            .categories()
            .await?
            .into_iter()
            .filter(|label| text::fold(label).contains(&wanted))
            .collect();

        if labels.is_empty() {
            return Ok(CategoryFilter::Nothing);
        }

        let quoted: Vec<String> = labels
            .iter()
            .map(|l| format!("\"{}\"", l.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        Ok(CategoryFilter::Labels(format!(
            "categories IN [{}]",
            quoted.join(", ")
        )))
    }

    async fn engine_search(
        &self,
        text: Option<&str>,
        filter: Option<&str>,
        query: &SearchQuery,
        hits_per_page: u32,
    ) -> StorageResult<SearchResponse<Hit>> {
        let mut body = json!({
            "q": text.unwrap_or(""),
            "page": query.page.max(1),
            "hitsPerPage": hits_per_page,
            "sort": [
                format!("{}:{}", query.sort_by.column(), query.order.as_str()),
                "id:asc",
            ],
        });
        if let Some(filter) = filter {
            body["filter"] = Value::String(filter.to_string());
        }
        if text.is_some() {
            body["attributesToHighlight"] = json!(["title", "content", "discounts"]);
            body["highlightPreTag"] = Value::String(query.tags.pre.clone());
            body["highlightPostTag"] = Value::String(query.tags.post.clone());
        }

        self.send_json(
            self.request(Method::POST, &["indexes", &self.index, "search"])?
                .json(&body),
        )
        .await
    }

    /// Records matching the folded text in title, content or discounts
    async fn substring_matches(
        &self,
        text: &str,
        category: Option<&str>,
        sort_by: SortField,
        order: SortOrder,
    ) -> StorageResult<Vec<Record>> {
        let needle = text::fold(text.trim());
        let wanted = category.map(str::trim).filter(|c| !c.is_empty());

        let mut records: Vec<Record> = self
            .all()
            .await?
            .into_iter()
            .filter(|r| {
                text::fold(&r.title).contains(&needle)
                    || text::fold(&text::strip_tags(&r.content)).contains(&needle)
                    || text::fold(&r.discounts).contains(&needle)
            })
            .filter(|r| wanted.map_or(true, |wanted| category_matches(&r.categories, wanted)))
            .collect();

        sort_records(&mut records, sort_by, order);
        Ok(records)
    }
}

fn sort_key(record: &Record, field: SortField) -> String {
    let value = match field {
        SortField::Title => &record.title,
        SortField::Date => &record.date,
        SortField::Categories => &record.categories,
        SortField::Id => &record.id,
    };
    value.to_lowercase()
}

fn sort_records(records: &mut [Record], field: SortField, order: SortOrder) {
    records.sort_by(|a, b| {
        let primary = sort_key(a, field).cmp(&sort_key(b, field));
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

#[async_trait]
impl DatasetStore for MeiliStore {
    fn backend_name(&self) -> &'static str {
        "meilisearch"
    }

    /// Delete-then-add; a failure between the steps leaves the index partial
    async fn replace_all(&self, records: &[Record]) -> StorageResult<()> {
        let info: TaskInfo = self
            .send_json(self.request(Method::DELETE, &["indexes", &self.index, "documents"])?)
            .await?;
        self.complete(info.task_uid).await?;

        if !records.is_empty() {
            let documents: Vec<Document<'_>> = records
                .iter()
                .map(|record| Document {
                    record,
                    categories: record.category_list(),
                })
                .collect();

            let mut url = self.endpoint(&["indexes", &self.index, "documents"])?;
            url.query_pairs_mut().append_pair("primaryKey", "id");
            let mut builder = self.client.post(url).json(&documents);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }
            let info: TaskInfo = self.send_json(builder).await?;
            self.complete(info.task_uid).await?;
        }

        // attribute declarations are re-asserted after every bulk replace
        self.apply_settings().await?;

        tracing::info!(
            "Replaced Meilisearch index '{}' with {} records",
            self.index,
            records.len()
        );
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> StorageResult<Vec<SearchHit>> {
        let text = non_empty(query.text.as_deref());
        let filter = match self.category_filter(query.category.as_deref()).await? {
            CategoryFilter::Nothing => return Ok(Vec::new()),
            CategoryFilter::Labels(filter) => Some(filter),
            CategoryFilter::Any => None,
        };

        let response = self
            .engine_search(text, filter.as_deref(), query, query.page_size)
            .await?;

        if response.total_hits > 0 || text.is_none() {
            return Ok(response
                .hits
                .into_iter()
                .map(|hit| {
                    let highlight = match (text, hit.formatted) {
                        (Some(_), Some(f)) => Highlights {
                            title: f.title,
                            content: f.content,
                            discounts: f.discounts,
                        },
                        _ => Highlights::unmodified(&hit.record),
                    };
                    SearchHit {
                        record: hit.record,
                        highlight,
                    }
                })
                .collect());
        }

        let Some(text) = text else {
            return Ok(Vec::new());
        };
        tracing::debug!("No engine hits for '{}', falling back to substring", text);

        let terms = vec![text::fold(text)];
        let matches = self
            .substring_matches(text, query.category.as_deref(), query.sort_by, query.order)
            .await?;

        Ok(matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .map(|record| {
                let highlight = Highlights {
                    title: text::highlight(&record.title, &terms, &query.tags.pre, &query.tags.post),
                    content: text::highlight(
                        &text::strip_tags(&record.content),
                        &terms,
                        &query.tags.pre,
                        &query.tags.post,
                    ),
                    discounts: text::highlight(
                        &record.discounts,
                        &terms,
                        &query.tags.pre,
                        &query.tags.post,
                    ),
                };
                SearchHit { record, highlight }
            })
            .collect())
    }

    async fn count(&self, text: Option<&str>, category: Option<&str>) -> StorageResult<u64> {
        let text = non_empty(text);
        let filter = match self.category_filter(category).await? {
            CategoryFilter::Nothing => return Ok(0),
            CategoryFilter::Labels(filter) => Some(filter),
            CategoryFilter::Any => None,
        };

        let count_query = SearchQuery {
            page: 1,
            ..Default::default()
        };
        let response = self.engine_search(text, filter.as_deref(), &count_query, 0).await?;
        if response.total_hits > 0 {
            return Ok(response.total_hits);
        }

        match text {
            Some(text) => Ok(self
                .substring_matches(text, category, SortField::Id, SortOrder::Asc)
                .await?
                .len() as u64),
            None => Ok(0),
        }
    }

    async fn suggestions(&self, text: &str, limit: usize) -> StorageResult<Vec<Suggestion>> {
        let body = json!({
            "q": text,
            "limit": limit,
            "attributesToRetrieve": ["id", "title"],
            "attributesToSearchOn": ["title"],
        });
        let response: SearchResponse<Suggestion> = self
            .send_json(
                self.request(Method::POST, &["indexes", &self.index, "search"])?
                    .json(&body),
            )
            .await?;
        Ok(response.hits)
    }

    async fn categories(&self) -> StorageResult<Vec<String>> {
        let labels: BTreeSet<String> = self
            .all()
            .await?
            .iter()
            .flat_map(|r| split_categories(&r.categories))
            .collect();
        Ok(labels.into_iter().collect())
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<Record>> {
        let builder = self.request(Method::GET, &["indexes", &self.index, "documents", id])?;
        match self.send(builder).await {
            Ok(response) => Ok(Some(response.json::<Record>().await?)),
            Err(StorageError::Backend { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn by_category(&self, category: &str) -> StorageResult<Vec<Record>> {
        let mut records: Vec<Record> = self
            .all()
            .await?
            .into_iter()
            .filter(|r| category_matches(&r.categories, category))
            .collect();
        sort_records(&mut records, SortField::Title, SortOrder::Asc);
        Ok(records)
    }

    async fn all(&self) -> StorageResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut url = self.endpoint(&["indexes", &self.index, "documents"])?;
            url.query_pairs_mut()
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &DOCUMENT_PAGE.to_string());
            let mut builder = self.client.get(url);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            let page: DocumentsPage = self.send_json(builder).await?;
            let fetched = page.results.len();
            records.extend(page.results);
            if fetched < DOCUMENT_PAGE {
                break;
            }
            offset += fetched;
        }

        sort_records(&mut records, SortField::Title, SortOrder::Asc);
        Ok(records)
    }
}
