//! Selector Agent - prunes the column inventory to what a question needs

use crate::agent_prompts::{build_selector_prompt, SELECTOR_SYSTEM_PROMPT};
use crate::error::Result;
use crate::llm::{ModelGateway, SamplingOptions};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

lazy_static! {
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+").expect("marker regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSchema {
    /// Grounded entries, one `table.column` per line
    pub text: String,
    pub columns: Vec<String>,
    /// Names the model produced that are not in the inventory
    pub dropped: Vec<String>,
    pub raw_response: String,
    pub reasoning: String,
}

pub struct SelectorAgent {
    llm: Arc<dyn ModelGateway>,
    temperature: f32,
}

impl SelectorAgent {
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

    /// Pick the inventory entries relevant to `question`.
    ///
    /// Model failures propagate; there is no retry here.
    pub async fn select(&self, question: &str, inventory: &[String]) -> Result<SelectedSchema> {
        let prompt = build_selector_prompt(question, &inventory.join("\n"));
        let response = self
            .llm
            .generate(
                &prompt,
                Some(SELECTOR_SYSTEM_PROMPT),
                &SamplingOptions::with_temperature(self.temperature),
            )
            .await?;

        let (mut columns, dropped) = ground_selection(&response, inventory);
        if !dropped.is_empty() {
            warn!("Selector named unknown columns: {}", dropped.join(", "));
        }
        if columns.is_empty() {
            warn!("Selector kept no known columns, using the full inventory");
            columns = inventory.to_vec();
        }
        info!("Selector kept {} of {} columns", columns.len(), inventory.len());

        Ok(SelectedSchema {
            text: columns.join("\n"),
            columns,
            dropped,
            raw_response: response.trim().to_string(),
            reasoning: format!("Selected schema for: {}", question),
        })
    }
}

/// Match each `table.column` mention in `response` against `inventory`.
///
/// Returns (canonical matches in first-mention order, unknown names).
pub fn ground_selection(response: &str, inventory: &[String]) -> (Vec<String>, Vec<String>) {
    let canonical: HashMap<String, &String> = inventory
        .iter()
        .map(|entry| (entry.to_lowercase(), entry))
        .collect();

    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for line in response.lines() {
        let line = LIST_MARKER.replace(line, "");
        for piece in line.split(|c: char| c == ',' || c.is_whitespace()) {
            let name = piece.trim_matches(|c: char| {
                matches!(c, '`' | '"' | '\'' | ';' | ':' | '(' | ')' | '[' | ']')
            });
            let name = name.trim_end_matches('.');
            if !name.contains('.') {
                continue;
            }
            match canonical.get(&name.to_lowercase()) {
                Some(entry) => {
                    if seen.insert(entry.as_str()) {
                        kept.push((*entry).clone());
                    }
                }
                None => {
                    debug!("Dropping unknown column {}", name);
                    dropped.push(name.to_string());
                }
            }
        }
    }

    (kept, dropped)
}
