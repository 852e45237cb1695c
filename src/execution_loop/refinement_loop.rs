//! Refinement Loop
//!
//! Bounded validate/refine cycle. The loop owns no model or database handle;
//! both sides come in through the [`Validate`] and [`Refine`] seams so the
//! policy can be tested with fakes.
//!
//! Policy, with `max_refinements = N`:
//! - `N == 0`: nothing is validated and the outcome carries no validation
//! - otherwise validate; stop on valid; refine and re-validate while fewer
//!   than `N` refinements have run; stop on the N-th rejection
//!
//! The returned validation always describes the returned candidate.

use crate::agents::{RefinerOutput, SqlCandidate};
use crate::error::Result;
use crate::execution_loop::error_classifier::SqlErrorClass;
use crate::validator::{QueryValidator, ValidationOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub trait Validate: Send + Sync {
    fn validate(&self, sql: &str) -> Result<ValidationOutcome>;
}

impl Validate for QueryValidator {
    fn validate(&self, sql: &str) -> Result<ValidationOutcome> {
        QueryValidator::validate(self, sql)
    }
}

#[async_trait]
pub trait Refine: Send + Sync {
    async fn refine(&self, candidate: &SqlCandidate, error: &str) -> Result<RefinerOutput>;
}

/// One rejected candidate and what replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementRound {
    pub round: u32,
    pub rejected_sql: String,
    pub error: String,
    pub error_class: SqlErrorClass,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub candidate: SqlCandidate,
    /// None only when the loop was configured not to validate at all
    pub validation: Option<ValidationOutcome>,
    pub refinements: u32,
    pub trace: Vec<RefinementRound>,
}

impl LoopOutcome {
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().map_or(false, |v| v.valid)
    }
}

pub struct RefinementLoop {
    max_refinements: u32,
}

impl RefinementLoop {
    pub fn new(max_refinements: u32) -> Self {
        Self { max_refinements }
    }

    pub fn max_refinements(&self) -> u32 {
        self.max_refinements
    }

    /// Run the cycle starting from `initial`.
    ///
    /// Errors from either side (backend unreachable) abort the loop.
    pub async fn run(
        &self,
        initial: SqlCandidate,
        validator: &dyn Validate,
        refiner: &dyn Refine,
    ) -> Result<LoopOutcome> {
        let mut candidate = initial;
        let mut refinements = 0u32;
        let mut trace = Vec::new();

        if self.max_refinements == 0 {
            warn!("Refinement disabled, candidate left unvalidated");
            return Ok(LoopOutcome {
                candidate,
                validation: None,
                refinements,
                trace,
            });
        }

        loop {
            info!("Validation attempt {}", refinements + 1);
            let outcome = validator.validate(&candidate.text)?;

            if outcome.valid {
                info!("Query valid after {} refinements", refinements);
                return Ok(LoopOutcome {
                    candidate,
                    validation: Some(outcome),
                    refinements,
                    trace,
                });
            }

            let error = outcome
                .error
                .clone()
                .unwrap_or_else(|| "Query rejected".to_string());
            warn!("Query failed: {}", error);

            if refinements >= self.max_refinements {
                warn!("Refinement budget ({}) exhausted", self.max_refinements);
                return Ok(LoopOutcome {
                    candidate,
                    validation: Some(outcome),
                    refinements,
                    trace,
                });
            }

            let output = refiner.refine(&candidate, &error).await?;
            refinements += 1;
            trace.push(RefinementRound {
                round: refinements,
                rejected_sql: candidate.text.clone(),
                error,
                error_class: output.error_class,
            });
            candidate = output.sql;
        }
    }
}
