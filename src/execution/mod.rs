pub mod engine;
pub mod profile;
pub mod result;
pub mod sqlite_engine;

pub use engine::{StorageEngine, StorageError};
pub use profile::{StatementKind, StatementProfile};
pub use result::{ExecutionResult, Row, RowSet};
pub use sqlite_engine::SqliteEngine;
