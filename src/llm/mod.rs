//! Model Gateway
//!
//! The language-model backend sits behind [`ModelGateway`] so the pipeline can
//! run against a live Ollama server or against canned responses in tests.

pub mod ollama;
pub mod scripted;

pub use ollama::OllamaClient;
pub use scripted::{RecordedCall, ScriptedGateway};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling knobs forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f32,
}

impl SamplingOptions {
    /// Deterministic sampling.
    pub fn greedy() -> Self {
        Self { temperature: 0.0 }
    }

    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self::greedy()
    }
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Configured model identifier
    fn model(&self) -> &str;

    /// Generate a completion. Failures propagate; nothing is retried here.
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: &SamplingOptions,
    ) -> Result<String>;

    /// True iff the configured model is in the backend's model list.
    async fn health_check(&self) -> Result<bool>;
}
