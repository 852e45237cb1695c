//! Storage Engine Trait - contract for the database that answers questions
//!
//! Engines run one statement at a time, on a connection of their own, so a
//! single engine value can be shared by concurrent requests.

use crate::execution::result::RowSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The engine could not be reached or opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The engine rejected or failed the statement itself.
    #[error("{0}")]
    Statement(String),
}

pub trait StorageEngine: Send + Sync {
    /// Engine name (e.g., "sqlite")
    fn name(&self) -> &'static str;

    /// Compile and plan `sql` without materialising rows or touching data.
    fn dry_run(&self, sql: &str) -> Result<(), StorageError>;

    /// Execute `sql`, keeping at most `max_rows` rows when a bound is given.
    fn run(&self, sql: &str, max_rows: Option<usize>) -> Result<RowSet, StorageError>;

    /// Cheap reachability probe
    fn ping(&self) -> Result<(), StorageError>;
}
