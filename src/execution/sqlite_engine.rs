//! SQLite Execution Engine
//!
//! Every call opens its own read-only connection: rusqlite handles are not
//! shared between concurrent requests, and nothing here can write.

use crate::config::PipelineConfig;
use crate::execution::engine::{StorageEngine, StorageError};
use crate::execution::profile::strip_terminator;
use crate::execution::result::{unique_column_names, Row, RowSet};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub struct SqliteEngine {
    database_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteEngine {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            busy_timeout: PipelineConfig::default().busy_timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            database_path: config.database_path.clone(),
            busy_timeout: config.busy_timeout,
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Open a fresh read-only connection.
    pub fn open(&self) -> Result<Connection, StorageError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.database_path, flags).map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", self.database_path.display(), e))
        })?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(conn)
    }
}

impl StorageEngine for SqliteEngine {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn dry_run(&self, sql: &str) -> Result<(), StorageError> {
        let conn = self.open()?;
        let plan_sql = format!("EXPLAIN QUERY PLAN {}", strip_terminator(sql));

        let mut stmt = conn.prepare(&plan_sql).map_err(statement_error)?;
        let mut rows = stmt.query([]).map_err(statement_error)?;
        let mut steps = 0usize;
        while rows.next().map_err(statement_error)?.is_some() {
            steps += 1;
        }
        debug!("Dry-run plan has {} steps", steps);
        Ok(())
    }

    fn run(&self, sql: &str, max_rows: Option<usize>) -> Result<RowSet, StorageError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(strip_terminator(sql)).map_err(statement_error)?;
        let columns = unique_column_names(stmt.column_names());

        let mut rows = stmt.query([]).map_err(statement_error)?;
        let mut out: Vec<Row> = Vec::new();
        while let Some(row) = rows.next().map_err(statement_error)? {
            if max_rows.map_or(false, |max| out.len() >= max) {
                break;
            }
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(statement_error)?;
                record.insert(name.clone(), value_to_json(value));
            }
            out.push(record);
        }

        Ok(RowSet { columns, rows: out })
    }

    fn ping(&self) -> Result<(), StorageError> {
        let conn = self.open()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

fn statement_error(err: rusqlite::Error) -> StorageError {
    StorageError::Statement(err.to_string())
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => serde_json::json!(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SqliteEngine) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, raw BLOB);
             INSERT INTO t VALUES (1, 'a', 1.5, x'0102');
             INSERT INTO t VALUES (2, NULL, 2.0, NULL);
             INSERT INTO t VALUES (3, 'c', 3.25, NULL);",
        )
        .unwrap();
        (dir, SqliteEngine::new(path))
    }

    #[test]
    fn test_run_converts_values_in_column_order() {
        let (_dir, engine) = fixture();
        let rows = engine
            .run("SELECT id, name, score, raw FROM t ORDER BY id;", None)
            .unwrap();

        assert_eq!(rows.columns, vec!["id", "name", "score", "raw"]);
        assert_eq!(rows.len(), 3);
        let first = &rows.rows[0];
        assert_eq!(first["id"], serde_json::json!(1));
        assert_eq!(first["name"], serde_json::json!("a"));
        assert_eq!(first["score"], serde_json::json!(1.5));
        assert_eq!(first["raw"], serde_json::json!([1, 2]));
        assert_eq!(rows.rows[1]["name"], Value::Null);

        let keys: Vec<&String> = first.keys().collect();
        assert_eq!(keys, vec!["id", "name", "score", "raw"]);
    }

    #[test]
    fn test_run_respects_max_rows() {
        let (_dir, engine) = fixture();
        let rows = engine.run("SELECT id FROM t", Some(2)).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_duplicate_columns_are_kept() {
        let (_dir, engine) = fixture();
        let rows = engine
            .run("SELECT a.id, b.id FROM t a JOIN t b ON a.id = b.id WHERE a.id = 1", None)
            .unwrap();
        assert_eq!(rows.columns, vec!["id", "id_2"]);
        assert_eq!(rows.rows[0]["id_2"], serde_json::json!(1));
    }

    #[test]
    fn test_dry_run_reports_engine_message() {
        let (_dir, engine) = fixture();
        assert!(engine.dry_run("SELECT name FROM t").is_ok());

        let err = engine.dry_run("SELECT nope FROM t").unwrap_err();
        match err {
            StorageError::Statement(msg) => assert!(msg.contains("no such column"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_connection_is_read_only() {
        let (_dir, engine) = fixture();
        let err = engine.run("DELETE FROM t", None).unwrap_err();
        assert!(matches!(err, StorageError::Statement(_)));
        assert_eq!(engine.run("SELECT id FROM t", None).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_database_is_unavailable() {
        let engine = SqliteEngine::new("/no/such/dir/db.sqlite");
        assert!(matches!(engine.ping(), Err(StorageError::Unavailable(_))));
        assert!(matches!(engine.dry_run("SELECT 1"), Err(StorageError::Unavailable(_))));
    }
}
