//! Refiner Agent - repairs a rejected candidate from the validator's message

use super::SqlCandidate;
use crate::agent_prompts::{build_refiner_prompt, REFINER_SYSTEM_PROMPT};
use crate::error::Result;
use crate::execution_loop::error_classifier::{ErrorClassifier, SqlErrorClass};
use crate::extraction::{salvage_sql, REPAIR_PROFILE};
use crate::llm::{ModelGateway, SamplingOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinerOutput {
    pub sql: SqlCandidate,
    pub error_class: SqlErrorClass,
    pub fixes_applied: String,
    pub raw_response: String,
}

pub struct RefinerAgent {
    llm: Arc<dyn ModelGateway>,
    temperature: f32,
    classifier: ErrorClassifier,
}

impl RefinerAgent {
    pub fn new(llm: Arc<dyn ModelGateway>) -> Self {
        Self {
            llm,
            temperature: 0.3,
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Ask for a corrected statement. `schema` is whatever schema text the
    /// caller wants the model to see (the column inventory in practice).
    pub async fn refine(
        &self,
        question: &str,
        schema: &str,
        candidate: &SqlCandidate,
        error: &str,
    ) -> Result<RefinerOutput> {
        let error_class = self.classifier.classify(error);
        info!("Refining attempt {} ({})", candidate.attempt + 1, error_class);

        let prompt = build_refiner_prompt(question, schema, &candidate.text, error, &error_class);
        let response = self
            .llm
            .generate(
                &prompt,
                Some(REFINER_SYSTEM_PROMPT),
                &SamplingOptions::with_temperature(self.temperature),
            )
            .await?;

        let sql = salvage_sql(&response, &REPAIR_PROFILE);

        Ok(RefinerOutput {
            sql: candidate.refined(sql),
            error_class,
            fixes_applied: format!("Fixed error: {}", error),
            raw_response: response,
        })
    }
}
