//! Decomposer Agent - writes the first SQL candidate

use super::selector::SelectedSchema;
use super::SqlCandidate;
use crate::agent_prompts::{build_decomposer_prompt, DECOMPOSER_SYSTEM_PROMPT};
use crate::error::Result;
use crate::extraction::{extract_sql, SYNTHESIS_PROFILE};
use crate::llm::{ModelGateway, SamplingOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Advisory only; nothing branches on it.
pub const DECOMPOSER_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecomposerOutput {
    pub sql: SqlCandidate,
    pub confidence: f32,
    pub raw_response: String,
    /// False when no statement could be salvaged and the raw remainder was used
    pub extracted: bool,
}

pub struct DecomposerAgent {
    llm: Arc<dyn ModelGateway>,
    temperature: f32,
}

impl DecomposerAgent {
    pub fn new(llm: Arc<dyn ModelGateway>) -> Self {
        Self {
            llm,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn decompose(
        &self,
        question: &str,
        selected: &SelectedSchema,
    ) -> Result<DecomposerOutput> {
        let allowed = allowed_columns(&selected.text);
        let prompt = build_decomposer_prompt(question, &allowed);

        let response = self
            .llm
            .generate(
                &prompt,
                Some(DECOMPOSER_SYSTEM_PROMPT),
                &SamplingOptions::with_temperature(self.temperature),
            )
            .await?;

        let (sql, extracted) = match extract_sql(&response, &SYNTHESIS_PROFILE) {
            Ok(sql) => (sql, true),
            Err(failure) => {
                warn!("No SQL found in decomposer output, passing the text on as-is");
                (failure.into_remainder(), false)
            }
        };
        info!("Decomposer produced {} chars of SQL", sql.len());

        Ok(DecomposerOutput {
            sql: SqlCandidate::synthesized(sql),
            confidence: DECOMPOSER_CONFIDENCE,
            raw_response: response,
            extracted,
        })
    }
}

/// Lines of the selected schema that name a qualified column.
fn allowed_columns(selected_text: &str) -> Vec<String> {
    selected_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains('.'))
        .map(str::to_string)
        .collect()
}
