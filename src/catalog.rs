//! Schema Catalog
//!
//! Read-only accessor over SQLite metadata. Produces the human-readable schema
//! rendering and the flat `table.column` inventory the agents work from.

use crate::error::{PipelineError, Result};
use crate::execution::engine::{StorageEngine, StorageError};
use crate::execution::result::Row;
use crate::execution::sqlite_engine::SqliteEngine;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    /// None when the key implicitly targets the parent's primary key
    pub ref_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
}

/// Immutable view of the catalog, shared by in-flight requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub tables: Vec<TableSchema>,
    pub schema_text: String,
    /// Sorted `table.column` inventory
    pub columns: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    pub fn from_tables(tables: Vec<TableSchema>) -> Self {
        let schema_text = render_schema(&tables);
        let columns = flatten_columns(&tables);
        Self {
            tables,
            schema_text,
            columns,
            loaded_at: Utc::now(),
        }
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Inventory as one `table.column` per line
    pub fn column_list_text(&self) -> String {
        self.columns.join("\n")
    }
}

pub struct SchemaCatalog {
    engine: SqliteEngine,
}

impl SchemaCatalog {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            engine: SqliteEngine::new(database_path),
        }
    }

    pub fn with_engine(engine: SqliteEngine) -> Self {
        Self { engine }
    }

    fn connect(&self) -> Result<Connection> {
        self.engine.open().map_err(|e| PipelineError::Catalog(e.to_string()))
    }

    /// User tables, sorted by name.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn describe_table(&self, name: &str) -> Result<TableSchema> {
        let conn = self.connect()?;
        describe_with(&conn, name)
    }

    pub fn schema_text(&self) -> Result<String> {
        Ok(self.snapshot()?.schema_text)
    }

    pub fn flat_column_list(&self) -> Result<Vec<String>> {
        Ok(self.snapshot()?.columns)
    }

    /// Read every table once and build an immutable snapshot.
    pub fn snapshot(&self) -> Result<CatalogSnapshot> {
        let conn = self.connect()?;
        let names = self.list_tables()?;
        let tables = names
            .iter()
            .map(|name| describe_with(&conn, name))
            .collect::<Result<Vec<TableSchema>>>()?;

        let snapshot = CatalogSnapshot::from_tables(tables);
        info!(
            "Catalog snapshot: {} tables, {} columns",
            snapshot.tables.len(),
            snapshot.columns.len()
        );
        Ok(snapshot)
    }

    /// First `limit` rows of a known table.
    pub fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<Row>> {
        let tables = self.list_tables()?;
        let known = tables
            .iter()
            .find(|t| t.eq_ignore_ascii_case(table))
            .ok_or_else(|| PipelineError::Catalog(format!("Unknown table: {}", table)))?;

        let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(known), limit);
        self.engine
            .run(&sql, Some(limit))
            .map(|rows| rows.rows)
            .map_err(|e| match e {
                StorageError::Unavailable(msg) => PipelineError::Catalog(msg),
                StorageError::Statement(msg) => PipelineError::Storage(msg),
            })
    }
}

fn describe_with(conn: &Connection, name: &str) -> Result<TableSchema> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map(params![name], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(2)? != 0,
                primary_key: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<ColumnInfo>>>()?;

    if columns.is_empty() {
        return Err(PipelineError::Catalog(format!("Unknown table: {}", name)));
    }

    let mut stmt = conn.prepare(
        "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let foreign_keys = stmt
        .query_map(params![name], |row| {
            Ok(ForeignKey {
                column: row.get(0)?,
                ref_table: row.get(1)?,
                ref_column: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<ForeignKey>>>()?;

    Ok(TableSchema {
        name: name.to_string(),
        columns,
        foreign_keys,
    })
}

pub fn render_schema(tables: &[TableSchema]) -> String {
    let mut parts = Vec::new();

    for table in tables {
        let mut part = format!("Table: {}\nColumns:\n", table.name);
        for col in &table.columns {
            let mut desc = format!("  - {} ({}", col.name, col.data_type);
            if col.primary_key {
                desc.push_str(", PRIMARY KEY");
            }
            if col.not_null {
                desc.push_str(", NOT NULL");
            }
            desc.push_str(")\n");
            part.push_str(&desc);
        }

        if !table.foreign_keys.is_empty() {
            part.push_str("Foreign Keys:\n");
            for fk in &table.foreign_keys {
                match &fk.ref_column {
                    Some(col) => part.push_str(&format!(
                        "  - {} -> {}.{}\n",
                        fk.column, fk.ref_table, col
                    )),
                    None => part.push_str(&format!("  - {} -> {}\n", fk.column, fk.ref_table)),
                }
            }
        }

        parts.push(part);
    }

    parts.join("\n")
}

pub fn flatten_columns(tables: &[TableSchema]) -> Vec<String> {
    let mut columns: Vec<String> = tables
        .iter()
        .flat_map(|t| t.columns.iter().map(move |c| format!("{}.{}", t.name, c.name)))
        .collect();
    columns.sort();
    columns
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SchemaCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE customers (
                 customer_id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 city TEXT
             );
             CREATE TABLE orders (
                 order_id INTEGER PRIMARY KEY,
                 customer_id INTEGER NOT NULL,
                 total_amount DECIMAL(10,2) NOT NULL,
                 FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
             );
             CREATE TABLE notes (body TEXT, customer_id INTEGER REFERENCES customers);
             INSERT INTO customers VALUES (1, 'Ann', 'Austin'), (2, 'Bo', 'Boston');",
        )
        .unwrap();
        (dir, SchemaCatalog::new(path))
    }

    #[test]
    fn test_list_tables_sorted() {
        let (_dir, catalog) = fixture();
        assert_eq!(catalog.list_tables().unwrap(), vec!["customers", "notes", "orders"]);
    }

    #[test]
    fn test_describe_table() {
        let (_dir, catalog) = fixture();
        let orders = catalog.describe_table("orders").unwrap();
        assert_eq!(orders.columns.len(), 3);
        assert!(orders.columns[0].primary_key);
        assert!(orders.columns[1].not_null);
        assert_eq!(orders.columns[2].data_type, "DECIMAL(10,2)");
        assert_eq!(
            orders.foreign_keys,
            vec![ForeignKey {
                column: "customer_id".to_string(),
                ref_table: "customers".to_string(),
                ref_column: Some("customer_id".to_string()),
            }]
        );

        assert!(catalog.describe_table("missing").is_err());
    }

    #[test]
    fn test_schema_text_rendering() {
        let (_dir, catalog) = fixture();
        let text = catalog.schema_text().unwrap();
        assert!(text.starts_with("Table: customers\nColumns:\n  - customer_id (INTEGER, PRIMARY KEY)\n"));
        assert!(text.contains("  - name (TEXT, NOT NULL)\n"));
        assert!(text.contains("Foreign Keys:\n  - customer_id -> customers.customer_id\n"));
        assert!(text.contains("  - customer_id -> customers\n"));
    }

    #[test]
    fn test_flat_column_list_sorted() {
        let (_dir, catalog) = fixture();
        let columns = catalog.flat_column_list().unwrap();
        let mut sorted = columns.clone();
        sorted.sort();
        assert_eq!(columns, sorted);
        assert!(columns.contains(&"orders.total_amount".to_string()));
        assert_eq!(columns.len(), 8);
    }

    #[test]
    fn test_sample_rows_only_for_known_tables() {
        let (_dir, catalog) = fixture();
        let rows = catalog.sample_rows("customers", 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], serde_json::json!("Ann"));

        assert!(catalog.sample_rows("customers; DROP TABLE orders", 1).is_err());
    }
}
