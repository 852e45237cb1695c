//! SQL agents
//!
//! Each agent wraps one model call: the selector prunes the schema, the
//! decomposer writes SQL, the refiner repairs rejected SQL.

pub mod decomposer;
pub mod refiner;
pub mod selector;

pub use decomposer::{DecomposerAgent, DecomposerOutput};
pub use refiner::{RefinerAgent, RefinerOutput};
pub use selector::{SelectedSchema, SelectorAgent};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Synthesized,
    Refined,
}

/// A generated SQL statement. Replaced, never edited, between rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlCandidate {
    pub text: String,
    pub provenance: Provenance,
    /// 0 for the decomposer's output, n for the n-th refinement
    pub attempt: u32,
}

impl SqlCandidate {
    pub fn synthesized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Synthesized,
            attempt: 0,
        }
    }

    /// The candidate that replaces `self` after one refinement.
    pub fn refined(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Refined,
            attempt: self.attempt + 1,
        }
    }
}
