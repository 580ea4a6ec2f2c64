//! Database schema for the SQLite dataset store

use rusqlite::functions::FunctionFlags;

/// SQL schema for the database
///
/// `records_fts` holds a searchable copy of each record (content as plain
/// text) and is kept in sync by triggers. The triggers call the `strip_tags`
/// SQL function, which [`register_functions`] installs on every connection.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    date TEXT NOT NULL DEFAULT '',
    cats TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    discounts TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_records_title ON records(title COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_records_date ON records(date);

CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
    title,
    content,
    discounts,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS records_fts_insert AFTER INSERT ON records BEGIN
    INSERT INTO records_fts(rowid, title, content, discounts)
    VALUES (new.rowid, new.title, strip_tags(new.content), new.discounts);
END;

CREATE TRIGGER IF NOT EXISTS records_fts_delete AFTER DELETE ON records BEGIN
    DELETE FROM records_fts WHERE rowid = old.rowid;
END;

CREATE TRIGGER IF NOT EXISTS records_fts_update AFTER UPDATE ON records BEGIN
    UPDATE records_fts
    SET title = new.title, content = strip_tags(new.content), discounts = new.discounts
    WHERE rowid = old.rowid;
END;
"#;

fn deterministic() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
}

/// Installs the SQL functions used by triggers and queries
///
/// - `fold(text)`: lowercase with diacritics removed
/// - `strip_tags(html)`: plain text of an HTML fragment
/// - `has_category(cats, text)`: one label of `cats` contains `text`
pub fn register_functions(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.create_scalar_function("fold", 1, deterministic(), |ctx| {
        let text: Option<String> = ctx.get(0)?;
        Ok(text.map(|t| super::text::fold(&t)))
    })?;

    conn.create_scalar_function("strip_tags", 1, deterministic(), |ctx| {
        let html: Option<String> = ctx.get(0)?;
        Ok(html.map(|h| super::text::strip_tags(&h)))
    })?;

    conn.create_scalar_function("has_category", 2, deterministic(), |ctx| {
        let joined: Option<String> = ctx.get(0)?;
        let wanted: String = ctx.get(1)?;
        Ok(joined.is_some_and(|j| super::category_matches(&j, &wanted)))
    })?;

    Ok(())
}

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        conn
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = open();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_trigger_indexes_plain_text() {
        let conn = open();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO records (id, title, content) VALUES ('a', 'Ótica Visão', '<p><b>Lentes</b> multifocais</p>')",
            [],
        )
        .unwrap();

        let content: String = conn
            .query_row(
                "SELECT content FROM records_fts WHERE records_fts MATCH 'otica'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(content, "Lentes multifocais");
    }

    #[test]
    fn test_delete_trigger_empties_index() {
        let conn = open();
        initialize_schema(&conn).unwrap();

        conn.execute("INSERT INTO records (id, title) VALUES ('a', 'Academia')", [])
            .unwrap();
        conn.execute("DELETE FROM records", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records_fts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_has_category_function() {
        let conn = open();
        let matches = |cats: &str, wanted: &str| -> bool {
            conn.query_row("SELECT has_category(?1, ?2)", [cats, wanted], |row| {
                row.get(0)
            })
            .unwrap()
        };

        assert!(matches("Cultura, Educação", "EDUCACAO"));
        assert!(!matches("Cultura, Educação", "cultura, edu"));
        assert!(!matches("", "saude"));
    }

    #[test]
    fn test_fold_function() {
        let conn = open();
        let folded: String = conn
            .query_row("SELECT fold('Educação')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "educacao");
    }
}
