//! Query Result - row sets from the engine and the execution outcome record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row, column name to value, in SELECT order.
pub type Row = Map<String, Value>;

/// Raw rows handed back by a storage engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of running a validated statement. Terminal for a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,

    pub rows: Vec<Row>,

    pub columns: Vec<String>,

    pub row_count: usize,

    pub error: Option<String>,

    /// Statement actually sent to the engine (row cap included)
    pub executed_sql: Option<String>,

    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn success(rows: RowSet, executed_sql: String, execution_time_ms: u64) -> Self {
        let row_count = rows.rows.len();
        Self {
            success: true,
            rows: rows.rows,
            columns: rows.columns,
            row_count,
            error: None,
            executed_sql: Some(executed_sql),
            execution_time_ms,
        }
    }

    pub fn failure(error: String, executed_sql: Option<String>, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            row_count: 0,
            error: Some(error),
            executed_sql,
            execution_time_ms,
        }
    }
}

/// Make result column names unique so no value is overwritten in a row map.
/// `SELECT a.id, b.id` yields `id`, `id_2`.
pub fn unique_column_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        let name = name.into();
        let mut candidate = name.clone();
        let mut suffix = 2;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_column_names() {
        assert_eq!(unique_column_names(vec!["id", "name"]), vec!["id", "name"]);
        assert_eq!(
            unique_column_names(vec!["id", "id", "id", "id_2"]),
            vec!["id", "id_2", "id_3", "id_2_2"]
        );
    }

    #[test]
    fn test_failure_carries_no_rows() {
        let result = ExecutionResult::failure("Execution error: boom".to_string(), None, 3);
        assert!(!result.success);
        assert!(result.rows.is_empty());
        assert_eq!(result.row_count, 0);
        assert_eq!(result.error.as_deref(), Some("Execution error: boom"));
    }
}
