//! SQLite-backed lookup over one response table per survey year
//!
//! Tables are named `survey_<year>_responses` and must have at least a
//! `user_id` and a nullable `completed_at` column. A row with a non-null
//! `completed_at` means the survey was completed; the whole row becomes the
//! payload. Tables are never created here.

use super::StatusLookup;
use crate::error::CoreError;
use crate::models::{Category, LookupOutcome, SubjectKey};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Lookup reading completed survey rows from SQLite (thread-safe)
pub struct SqliteLookup {
    conn: Arc<Mutex<Connection>>,
    /// Years consulted, in order, for the `Current` category
    years: Vec<u16>,
}

impl SqliteLookup {
    /// Open an existing database read-only
    pub fn open(path: &Path, years: Vec<u16>) -> Result<Self, CoreError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| CoreError::database(format!("open {}", path.display()), e))?;

        debug!(path = %path.display(), ?years, "SQLite lookup opened");
        Ok(Self::from_connection(conn, years))
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: Connection, years: Vec<u16>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            years,
        }
    }

    pub fn table_name(year: u16) -> String {
        format!("survey_{}_responses", year)
    }

    fn lookup_blocking(
        conn: &Connection,
        subject: &str,
        category: Category,
        years: &[u16],
    ) -> Result<LookupOutcome, CoreError> {
        match category {
            Category::Year(year) => Ok(find_completed(conn, year, subject)?
                .unwrap_or_else(LookupOutcome::not_completed)),
            Category::Current => {
                let mut first_error = None;
                for &year in years {
                    match find_completed(conn, year, subject) {
                        Ok(Some(outcome)) => return Ok(outcome),
                        Ok(None) => {}
                        Err(e) => {
                            trace!(year, error = %e, "Year table unavailable for current");
                            first_error.get_or_insert(e);
                        }
                    }
                }
                // Nothing completed; if any table failed the answer is unknown
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(LookupOutcome::not_completed()),
                }
            }
        }
    }
}

#[async_trait]
impl StatusLookup for SqliteLookup {
    async fn lookup(
        &self,
        subject: &SubjectKey,
        category: Category,
    ) -> Result<LookupOutcome, CoreError> {
        let conn = Arc::clone(&self.conn);
        let subject = subject.as_str().to_string();
        let years = self.years.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::lookup_blocking(&conn, &subject, category, &years)
        })
        .await
        .map_err(|e| CoreError::TaskJoin {
            message: e.to_string(),
        })?
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// First completed row for `subject` in the year's table, if any
fn find_completed(
    conn: &Connection,
    year: u16,
    subject: &str,
) -> Result<Option<LookupOutcome>, CoreError> {
    let table = SqliteLookup::table_name(year);
    let sql = format!(
        "SELECT * FROM {} WHERE user_id = ?1 AND completed_at IS NOT NULL LIMIT 1",
        table
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| CoreError::database(format!("query {}", table), e))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let row = stmt
        .query_row(params![subject], |row| {
            let mut map = serde_json::Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            Ok(map)
        })
        .optional()
        .map_err(|e| CoreError::database(format!("read {}", table), e))?;

    Ok(row.map(|map| {
        let completed_at = match map.get("completed_at") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        LookupOutcome::completed(completed_at, Some(serde_json::Value::Object(map)))
    }))
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE survey_2021_responses (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                completed_at TEXT,
                score REAL
            );
            CREATE TABLE survey_2023_responses (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                completed_at TEXT
            );
            INSERT INTO survey_2021_responses (user_id, completed_at, score)
                VALUES ('u1', NULL, NULL);
            INSERT INTO survey_2023_responses (user_id, completed_at)
                VALUES ('u1', '2023-06-30T10:00:00Z');
            INSERT INTO survey_2023_responses (user_id, completed_at)
                VALUES ('u2', NULL);
            "#,
        )
        .unwrap();
        conn
    }

    fn key(s: &str) -> SubjectKey {
        SubjectKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_completed_row_becomes_payload() {
        let lookup = SqliteLookup::from_connection(seeded(), vec![2021, 2023]);
        let outcome = lookup.lookup(&key("u1"), Category::Year(2023)).await.unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.completed_at.as_deref(), Some("2023-06-30T10:00:00Z"));
        let payload = outcome.payload.unwrap();
        assert_eq!(payload["user_id"], "u1");
        assert_eq!(payload["id"], 1);
    }

    #[tokio::test]
    async fn test_incomplete_row_is_not_completed() {
        let lookup = SqliteLookup::from_connection(seeded(), vec![2021, 2023]);
        let outcome = lookup.lookup(&key("u1"), Category::Year(2021)).await.unwrap();
        assert_eq!(outcome, LookupOutcome::not_completed());

        let outcome = lookup.lookup(&key("u2"), Category::Year(2023)).await.unwrap();
        assert!(!outcome.completed);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let lookup = SqliteLookup::from_connection(seeded(), vec![2021, 2023]);
        let err = lookup
            .lookup(&key("u1"), Category::Year(2022))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Database { .. }));
    }

    #[tokio::test]
    async fn test_current_returns_first_completed_year() {
        let lookup = SqliteLookup::from_connection(seeded(), vec![2021, 2023]);
        let outcome = lookup.lookup(&key("u1"), Category::Current).await.unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.completed_at.as_deref(), Some("2023-06-30T10:00:00Z"));
    }

    #[tokio::test]
    async fn test_current_skips_missing_tables_when_a_match_exists() {
        let lookup = SqliteLookup::from_connection(seeded(), vec![2022, 2023]);
        let outcome = lookup.lookup(&key("u1"), Category::Current).await.unwrap();
        assert!(outcome.completed);
    }

    #[tokio::test]
    async fn test_current_unknown_when_tables_fail_and_nothing_found() {
        let lookup = SqliteLookup::from_connection(seeded(), vec![2022, 2021]);
        assert!(lookup.lookup(&key("u1"), Category::Current).await.is_err());

        let lookup = SqliteLookup::from_connection(seeded(), vec![2021, 2023]);
        let outcome = lookup.lookup(&key("nobody"), Category::Current).await.unwrap();
        assert!(!outcome.completed);
    }

    #[test]
    fn test_table_name() {
        assert_eq!(SqliteLookup::table_name(2024), "survey_2024_responses");
    }
}
