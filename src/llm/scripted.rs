//! Scripted gateway: replays canned responses in order.
//!
//! Used by the test suites and for offline demos where no inference backend
//! is running. Every call is recorded so tests can assert on prompts and
//! sampling options.

use super::{ModelGateway, SamplingOptions};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
}

pub struct ScriptedGateway {
    model: String,
    available_models: Vec<String>,
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            available_models: vec![model.clone()],
            model,
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a backend failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Replace the model list reported to health checks.
    pub fn with_available_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn push(&self, response: std::result::Result<String, String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: &SamplingOptions,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                prompt: prompt.to_string(),
                system: system.map(str::to_string),
                temperature: options.temperature,
            });
        }

        let next = self
            .responses
            .lock()
            .map_err(|_| PipelineError::Llm("scripted gateway poisoned".to_string()))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(PipelineError::Llm(message)),
            None => Err(PipelineError::Llm("no scripted response left".to_string())),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available_models.iter().any(|m| m == &self.model))
    }
}
