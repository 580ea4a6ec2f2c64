//! SQLite storage implementation
//!
//! Text search runs against the FTS5 table first (prefix query per term,
//! diacritics removed by the tokenizer). When that finds nothing, the same
//! request is answered by a folded `LIKE` over title, content and discounts.
//!
//! Every call runs on the blocking pool, so a long `replace_all` never stalls
//! the runtime threads serving reads.

use crate::storage::schema::{initialize_schema, register_functions};
use crate::storage::text;
use crate::storage::traits::{DatasetStore, StorageError, StorageResult};
use crate::storage::{
    split_categories, HighlightTags, Highlights, Record, SearchHit, SearchQuery, Suggestion,
};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

const RECORD_COLUMNS: &str = "r.id, r.title, r.date, r.cats, r.content, r.discounts";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// How the text part of a request is matched
enum TextFilter {
    None,
    /// FTS5 MATCH expression
    FullText(String),
    /// Folded substring, already wrapped in `%` and escaped for LIKE
    Substring(String),
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        register_functions(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StorageError::Database(format!("connection lock poisoned: {}", e)))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Database(format!("database task failed: {}", e)))?
    }

    fn read_record(row: &Row<'_>) -> rusqlite::Result<Record> {
        Ok(Record {
            id: row.get(0)?,
            title: row.get(1)?,
            date: row.get(2)?,
            categories: row.get(3)?,
            content: row.get(4)?,
            discounts: row.get(5)?,
        })
    }

    /// Picks full-text matching when it has results, substring matching otherwise
    fn text_filter(
        conn: &Connection,
        text: Option<&str>,
        category: Option<&str>,
    ) -> StorageResult<TextFilter> {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(TextFilter::None);
        };

        if let Some(expr) = fts_expression(text) {
            let hits = count_with(conn, &TextFilter::FullText(expr.clone()), category)?;
            if hits > 0 {
                return Ok(TextFilter::FullText(expr));
            }
            tracing::debug!("No full-text hits for '{}', falling back to substring", text);
        }

        Ok(TextFilter::Substring(like_pattern(text)))
    }
}

/// Builds an FTS5 query: every term must match as a prefix
fn fts_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"*", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// `%folded text%` with LIKE wildcards in the text escaped
fn like_pattern(text: &str) -> String {
    let folded = text::fold(text.trim());
    let escaped = folded
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// FROM and WHERE clauses plus their parameters
fn filter_clause(filter: &TextFilter, category: Option<&str>) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    let from = match filter {
        TextFilter::FullText(expr) => {
            conditions.push("records_fts MATCH ?".to_string());
            values.push(Value::Text(expr.clone()));
            "records_fts JOIN records r ON r.rowid = records_fts.rowid"
        }
        TextFilter::Substring(pattern) => {
            conditions.push(
                "(fold(r.title) LIKE ? ESCAPE '\\' \
                  OR fold(strip_tags(r.content)) LIKE ? ESCAPE '\\' \
                  OR fold(r.discounts) LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            for _ in 0..3 {
                values.push(Value::Text(pattern.clone()));
            }
            "records r"
        }
        TextFilter::None => "records r",
    };

    if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
        conditions.push("has_category(r.cats, ?)".to_string());
        values.push(Value::Text(category.to_string()));
    }

    let mut clause = format!(" FROM {}", from);
    if !conditions.is_empty() {
        clause.push_str(" WHERE ");
        clause.push_str(&conditions.join(" AND "));
    }

    (clause, values)
}

fn count_with(conn: &Connection, filter: &TextFilter, category: Option<&str>) -> StorageResult<u64> {
    let (clause, values) = filter_clause(filter, category);
    let sql = format!("SELECT COUNT(*){}", clause);
    let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(count as u64)
}

fn highlight_columns(tags: &HighlightTags) -> (String, Vec<Value>) {
    let sql = (0..3)
        .map(|col| format!("highlight(records_fts, {}, ?, ?)", col))
        .collect::<Vec<_>>()
        .join(", ");
    let mut values = Vec::new();
    for _ in 0..3 {
        values.push(Value::Text(tags.pre.clone()));
        values.push(Value::Text(tags.post.clone()));
    }
    (sql, values)
}

fn search_page(conn: &Connection, query: &SearchQuery) -> StorageResult<Vec<SearchHit>> {
    let category = query.category.as_deref();
    let filter = SqliteStore::text_filter(conn, query.text.as_deref(), category)?;

    let (clause, filter_values) = filter_clause(&filter, category);
    let order = format!(
        " ORDER BY r.{} COLLATE NOCASE {}, r.id LIMIT ? OFFSET ?",
        query.sort_by.column(),
        query.order.as_str()
    );

    let mut values = Vec::new();
    let select = match &filter {
        TextFilter::FullText(_) => {
            let (columns, tag_values) = highlight_columns(&query.tags);
            values.extend(tag_values);
            format!("SELECT {}, {}", RECORD_COLUMNS, columns)
        }
        _ => format!("SELECT {}", RECORD_COLUMNS),
    };
    values.extend(filter_values);
    values.push(Value::Integer(i64::from(query.page_size)));
    values.push(Value::Integer(i64::try_from(query.offset()).unwrap_or(i64::MAX)));

    let sql = format!("{}{}{}", select, clause, order);
    let mut stmt = conn.prepare(&sql)?;

    let substring_terms = match &filter {
        TextFilter::Substring(_) => query
            .text
            .as_deref()
            .map(|t| vec![text::fold(t.trim())])
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let mark = |value: &str| {
        text::highlight(value, &substring_terms, &query.tags.pre, &query.tags.post)
    };

    let rows = stmt.query_map(params_from_iter(values), |row| {
        let record = SqliteStore::read_record(row)?;
        let highlight = match &filter {
            TextFilter::FullText(_) => Highlights {
                title: row.get(6)?,
                content: row.get(7)?,
                discounts: row.get(8)?,
            },
            TextFilter::Substring(_) => Highlights {
                title: mark(&record.title),
                content: mark(&text::strip_tags(&record.content)),
                discounts: mark(&record.discounts),
            },
            TextFilter::None => Highlights::unmodified(&record),
        };
        Ok(SearchHit { record, highlight })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn query_records(conn: &Connection, sql: &str, values: Vec<Value>) -> StorageResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values), SqliteStore::read_record)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl DatasetStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn replace_all(&self, records: &[Record]) -> StorageResult<()> {
        let records = records.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            tx.execute("DELETE FROM records", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO records (id, title, date, cats, content, discounts)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.id,
                        record.title,
                        record.date,
                        record.categories,
                        record.content,
                        record.discounts
                    ])?;
                }
            }

            tx.commit()?;
            tracing::info!("Replaced dataset with {} records", records.len());
            Ok(())
        })
        .await
    }

    async fn search(&self, query: &SearchQuery) -> StorageResult<Vec<SearchHit>> {
        let query = query.clone();
        self.with_conn(move |conn| search_page(conn, &query)).await
    }

    async fn count(&self, text: Option<&str>, category: Option<&str>) -> StorageResult<u64> {
        let text = text.map(str::to_string);
        let category = category.map(str::to_string);
        self.with_conn(move |conn| {
            let filter = Self::text_filter(conn, text.as_deref(), category.as_deref())?;
            count_with(conn, &filter, category.as_deref())
        })
        .await
    }

    async fn suggestions(&self, text: &str, limit: usize) -> StorageResult<Vec<Suggestion>> {
        let pattern = like_pattern(text);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title FROM records
                 WHERE fold(title) LIKE ?1 ESCAPE '\\'
                 ORDER BY title COLLATE NOCASE, id
                 LIMIT ?2",
            )?;

            let rows = stmt.query_map(params![pattern, limit], |row| {
                Ok(Suggestion {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            })?;

            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn categories(&self) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT cats FROM records")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut categories = BTreeSet::new();
            for cats in rows {
                categories.extend(split_categories(&cats?));
            }

            Ok(categories.into_iter().collect())
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<Record>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM records r WHERE r.id = ?1", RECORD_COLUMNS);
            let record = conn
                .query_row(&sql, params![id], Self::read_record)
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn by_category(&self, category: &str) -> StorageResult<Vec<Record>> {
        let category = category.trim().to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM records r WHERE has_category(r.cats, ?1)
                 ORDER BY r.title COLLATE NOCASE, r.id",
                RECORD_COLUMNS
            );
            query_records(conn, &sql, vec![Value::Text(category)])
        })
        .await
    }

    async fn all(&self) -> StorageResult<Vec<Record>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM records r ORDER BY r.title COLLATE NOCASE, r.id",
                RECORD_COLUMNS
            );
            query_records(conn, &sql, Vec::new())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SortField, SortOrder};

    fn record(id: &str, title: &str, date: &str, cats: &str, content: &str, discounts: &str) -> Record {
        Record {
            id: id.to_string(),
            title: title.to_string(),
            date: date.to_string(),
            categories: cats.to_string(),
            content: content.to_string(),
            discounts: discounts.to_string(),
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record("1", "Livraria Central", "2024-02-05", "Cultura, Educação",
                   "<p>Rede de <b>livrarias</b></p>", "10% em livros"),
            record("2", "Clínica Sorriso", "2023-11-20", "Saúde",
                   "<p>Tratamentos odontológicos</p>", "20% em consultas"),
            record("3", "Academia Movimento", "2024-06-01", "Saúde, Esporte",
                   "<p>Musculação e natação</p>", "15% na mensalidade"),
            record("4", "Escola de Idiomas", "", "Educação",
                   "<p>Cursos de inglês</p>", ""),
        ]
    }

    async fn store_with_sample() -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        store.replace_all(&sample()).await.unwrap();
        store
    }

    fn query(text: Option<&str>) -> SearchQuery {
        SearchQuery {
            text: text.map(str::to_string),
            page: 1,
            page_size: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_replace_then_unfiltered_search_returns_everything() {
        let store = store_with_sample().await;

        let hits = store.search(&query(None)).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(store.count(None, None).await.unwrap(), 4);

        // default order is title ascending
        let titles: Vec<_> = hits.iter().map(|h| h.record.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Academia Movimento", "Clínica Sorriso", "Escola de Idiomas", "Livraria Central"]
        );
        assert_eq!(hits[0].highlight, Highlights::unmodified(&hits[0].record));
    }

    #[tokio::test]
    async fn test_replace_discards_previous_set() {
        let store = store_with_sample().await;
        store
            .replace_all(&[record("9", "Ótica Visão", "", "Saúde", "", "")])
            .await
            .unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "9");
        assert_eq!(store.count(Some("livros"), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_text_is_accent_insensitive_and_prefix() {
        let store = store_with_sample().await;

        let hits = store.search(&query(Some("clinica"))).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "2");
        assert_eq!(hits[0].highlight.title, "<mark>Clínica</mark> Sorriso");

        let hits = store.search(&query(Some("odonto"))).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].highlight.content, "Tratamentos <mark>odontológicos</mark>");
    }

    #[tokio::test]
    async fn test_substring_fallback() {
        let store = store_with_sample().await;

        // "vimento" is inside a word, so only the substring predicate finds it
        let hits = store.search(&query(Some("vimento"))).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "3");
        assert_eq!(hits[0].highlight.title, "Academia Mo<mark>vimento</mark>");
        assert_eq!(store.count(Some("vimento"), None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let store = store_with_sample().await;
        assert!(store.search(&query(Some("xyzzy"))).await.unwrap().is_empty());
        assert_eq!(store.count(Some("xyzzy"), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let store = store_with_sample().await;

        let mut q = query(None);
        q.category = Some("saude".to_string());
        let hits = store.search(&q).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(store.count(None, Some("Saúde")).await.unwrap(), 2);

        q.text = Some("academia".to_string());
        assert_eq!(store.search(&q).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_category_filter_stays_within_one_label() {
        let store = store_with_sample().await;

        assert_eq!(store.count(None, Some("cultura, edu")).await.unwrap(), 0);
        assert!(store.by_category("cultura, edu").await.unwrap().is_empty());
        assert_eq!(store.by_category("edu").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let store = store_with_sample().await;

        let mut q = query(None);
        q.page = u32::MAX;
        q.page_size = u32::MAX;
        assert!(store.search(&q).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sort_and_pagination() {
        let store = store_with_sample().await;

        let mut q = query(None);
        q.sort_by = SortField::Date;
        q.order = SortOrder::Desc;
        q.page_size = 2;
        let first = store.search(&q).await.unwrap();
        assert_eq!(first[0].record.id, "3");
        assert_eq!(first[1].record.id, "1");

        q.page = 2;
        let second = store.search(&q).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].record.id, "2");
        assert_eq!(second[1].record.id, "4");
    }

    #[tokio::test]
    async fn test_suggestions() {
        let store = store_with_sample().await;
        let suggestions = store.suggestions("li", 5).await.unwrap();
        let titles: Vec<_> = suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Clínica Sorriso", "Livraria Central"]);

        assert_eq!(store.suggestions("a", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_categories_sorted_and_deduplicated() {
        let store = store_with_sample().await;
        assert_eq!(
            store.categories().await.unwrap(),
            vec!["Cultura", "Educação", "Esporte", "Saúde"]
        );
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let store = store_with_sample().await;
        assert_eq!(store.get_by_id("2").await.unwrap().unwrap().title, "Clínica Sorriso");
        assert!(store.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_by_category() {
        let store = store_with_sample().await;
        let records = store.by_category("educação").await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1"]);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_set() {
        let store = store_with_sample().await;

        // duplicate primary key aborts the transaction
        let bad = vec![
            record("x", "Um", "", "", "", ""),
            record("x", "Dois", "", "", "", ""),
        ];
        assert!(store.replace_all(&bad).await.is_err());
        assert_eq!(store.count(None, None).await.unwrap(), 4);
    }

    #[test]
    fn test_fts_expression() {
        assert_eq!(fts_expression("liv  desc").unwrap(), "\"liv\"* \"desc\"*");
        assert_eq!(fts_expression("say \"hi\"").unwrap(), "\"say\"* \"hi\"*");
        assert!(fts_expression(" -- ").is_none());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("10%_Off"), "%10\\%\\_off%");
    }
}
