//! Error Classifier
//!
//! Sorts validator rejections into coarse classes. The class only picks the
//! hint line in the refiner prompt; it never changes control flow.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlErrorClass {
    UnknownColumn,
    AmbiguousColumn,
    UnknownTable,
    Syntax,
    /// Refused by the read-only gate (write, DDL, denylisted keyword, several statements)
    Rejected,
    Other,
}

impl SqlErrorClass {
    /// One line of repair advice, if the class has any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SqlErrorClass::UnknownColumn => {
                Some("Column does not exist -> use the correct column name from the schema")
            }
            SqlErrorClass::AmbiguousColumn => {
                Some("Ambiguous column -> qualify it with a table alias (T1.column, T2.column)")
            }
            SqlErrorClass::UnknownTable => {
                Some("Table does not exist -> use a table name from the schema")
            }
            SqlErrorClass::Syntax => {
                Some("Syntax error -> check commas, parentheses and keyword order")
            }
            SqlErrorClass::Rejected => {
                Some("Only a single read-only SELECT statement is allowed -> remove any data or schema changes")
            }
            SqlErrorClass::Other => None,
        }
    }
}

impl fmt::Display for SqlErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlErrorClass::UnknownColumn => write!(f, "UnknownColumn"),
            SqlErrorClass::AmbiguousColumn => write!(f, "AmbiguousColumn"),
            SqlErrorClass::UnknownTable => write!(f, "UnknownTable"),
            SqlErrorClass::Syntax => write!(f, "Syntax"),
            SqlErrorClass::Rejected => write!(f, "Rejected"),
            SqlErrorClass::Other => write!(f, "Other"),
        }
    }
}

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a validator error message
    pub fn classify(&self, error: &str) -> SqlErrorClass {
        let error_msg = error.to_lowercase();

        if error_msg.contains("ambiguous column") {
            return SqlErrorClass::AmbiguousColumn;
        }

        if error_msg.contains("no such column")
            || (error_msg.contains("column")
                && (error_msg.contains("not found") || error_msg.contains("does not exist")))
        {
            return SqlErrorClass::UnknownColumn;
        }

        if error_msg.contains("no such table")
            || (error_msg.contains("table")
                && (error_msg.contains("not found") || error_msg.contains("does not exist")))
        {
            return SqlErrorClass::UnknownTable;
        }

        if error_msg.contains("syntax error")
            || error_msg.contains("incomplete input")
            || error_msg.contains("unrecognized token")
        {
            return SqlErrorClass::Syntax;
        }

        if error_msg.contains("rejected")
            || error_msg.contains("only read")
            || error_msg.contains("single statement")
            || error_msg.contains("empty query")
        {
            return SqlErrorClass::Rejected;
        }

        SqlErrorClass::Other
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sqlite_messages() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify("SQL error: no such column: total"),
            SqlErrorClass::UnknownColumn
        );
        assert_eq!(
            classifier.classify("SQL error: ambiguous column name: customer_id"),
            SqlErrorClass::AmbiguousColumn
        );
        assert_eq!(
            classifier.classify("SQL error: no such table: purchases"),
            SqlErrorClass::UnknownTable
        );
        assert_eq!(
            classifier.classify("SQL error: near \"FORM\": syntax error"),
            SqlErrorClass::Syntax
        );
    }

    #[test]
    fn test_classify_gate_rejections() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify("Query rejected: contains forbidden keyword DROP"),
            SqlErrorClass::Rejected
        );
        assert_eq!(classifier.classify("disk I/O error"), SqlErrorClass::Other);
        assert!(SqlErrorClass::Other.hint().is_none());
        assert!(SqlErrorClass::UnknownColumn.hint().is_some());
    }
}
