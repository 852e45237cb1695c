//! Query Validator
//!
//! Two-phase gate in front of the storage engine:
//!
//! 1. lexical: empty text, denylisted keywords, statement count and kind
//! 2. engine-assisted: a plan-only dry run against the live catalog
//!
//! Nothing reaches [`StorageEngine::run`] without passing both phases.

use crate::error::{PipelineError, Result};
use crate::execution::engine::{StorageEngine, StorageError};
use crate::execution::profile::{strip_terminator, word_tokens, StatementKind, StatementProfile};
use crate::execution::result::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Keywords that reject a statement outright, matched as whole tokens on the
/// upper-cased text. String literals are not exempt.
pub const DENYLIST: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE", "MERGE",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub error: Option<String>,
    /// The statement as checked (terminator stripped)
    pub statement: String,
    pub kind: Option<StatementKind>,
}

impl ValidationOutcome {
    fn accepted(statement: String, kind: StatementKind) -> Self {
        Self {
            valid: true,
            error: None,
            statement,
            kind: Some(kind),
        }
    }

    fn rejected(statement: String, kind: Option<StatementKind>, error: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
            statement,
            kind,
        }
    }
}

pub struct QueryValidator {
    engine: Arc<dyn StorageEngine>,
    row_limit: usize,
}

impl QueryValidator {
    pub fn new(engine: Arc<dyn StorageEngine>, row_limit: usize) -> Self {
        Self { engine, row_limit }
    }

    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    /// Check `sql` without executing it.
    ///
    /// Rejections come back as `Ok` with `valid == false`. `Err` means the
    /// engine itself was unreachable.
    pub fn validate(&self, sql: &str) -> Result<ValidationOutcome> {
        let statement = strip_terminator(sql).to_string();

        if statement.is_empty() {
            return Ok(ValidationOutcome::rejected(
                statement,
                None,
                "Empty query".to_string(),
            ));
        }

        if let Some(keyword) = denylisted_keyword(&statement) {
            warn!("Rejected statement containing {}", keyword);
            return Ok(ValidationOutcome::rejected(
                statement,
                None,
                format!("Query rejected: contains forbidden keyword {}", keyword),
            ));
        }

        let profile = StatementProfile::from_sql(&statement);
        if profile.statement_count != 1 {
            return Ok(ValidationOutcome::rejected(
                statement,
                Some(profile.kind),
                format!(
                    "Only a single statement is allowed (found {})",
                    profile.statement_count
                ),
            ));
        }
        if !profile.is_read_only() {
            return Ok(ValidationOutcome::rejected(
                statement,
                Some(profile.kind),
                format!("Only read queries are allowed (found {} statement)", profile.kind),
            ));
        }

        match self.engine.dry_run(&statement) {
            Ok(()) => {
                debug!("Dry run accepted statement");
                Ok(ValidationOutcome::accepted(statement, profile.kind))
            }
            Err(StorageError::Statement(msg)) => Ok(ValidationOutcome::rejected(
                statement,
                Some(profile.kind),
                format!("SQL error: {}", msg),
            )),
            Err(StorageError::Unavailable(msg)) => Err(PipelineError::Storage(msg)),
        }
    }

    /// Re-validate and run `sql`, capping rows when the query does not.
    ///
    /// Never fails: every problem is reported inside the returned result.
    pub fn execute(&self, sql: &str, limit: Option<usize>) -> ExecutionResult {
        let start = Instant::now();
        let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

        let outcome = match self.validate(sql) {
            Ok(outcome) => outcome,
            Err(e) => return ExecutionResult::failure(e.to_string(), None, elapsed(start)),
        };
        if !outcome.valid {
            let error = outcome
                .error
                .unwrap_or_else(|| "Query rejected".to_string());
            return ExecutionResult::failure(error, None, elapsed(start));
        }

        let limit = limit.unwrap_or(self.row_limit);
        let profile = StatementProfile::from_sql(&outcome.statement);
        let (executed_sql, cap) = if profile.is_read_only() && !profile.has_row_cap {
            // Newline so a trailing line comment cannot swallow the cap.
            (format!("{}\nLIMIT {}", outcome.statement, limit), Some(limit))
        } else if !profile.parsed {
            // The keyword fallback may misread the query's own LIMIT.
            (outcome.statement, Some(limit))
        } else {
            (outcome.statement, None)
        };

        match self.engine.run(&executed_sql, cap) {
            Ok(rows) => {
                info!("Query returned {} rows", rows.len());
                ExecutionResult::success(rows, executed_sql, elapsed(start))
            }
            Err(e) => {
                warn!("Execution failed: {}", e);
                ExecutionResult::failure(e.to_string(), Some(executed_sql), elapsed(start))
            }
        }
    }
}

fn denylisted_keyword(statement: &str) -> Option<String> {
    let upper = statement.to_uppercase();
    word_tokens(&upper)
        .into_iter()
        .find(|token| DENYLIST.contains(token))
        .map(str::to_string)
}
