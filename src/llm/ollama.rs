//! Ollama HTTP client

use super::{ModelGateway, SamplingOptions};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    generate_timeout: Duration,
    health_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            generate_timeout: defaults.generate_timeout,
            health_timeout: defaults.health_timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.base_url.clone(), config.model.clone())
            .with_timeouts(config.generate_timeout, config.health_timeout)
    }

    pub fn with_timeouts(mut self, generate: Duration, health: Duration) -> Self {
        self.generate_timeout = generate;
        self.health_timeout = health;
        self
    }

    /// Names of every model the backend reports.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Llm(format!("Model list request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Llm(format!("Model list error ({})", status)));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Llm(format!("Failed to parse model list: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ModelGateway for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: &SamplingOptions,
    ) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
            },
        };

        debug!(
            "Calling {} (prompt {} chars, temperature {})",
            self.model,
            prompt.len(),
            options.temperature
        );

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.generate_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        Ok(parsed.response.trim().to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        let models = self.list_models().await?;
        let found = models.iter().any(|name| name == &self.model);
        if !found {
            warn!("Model {} not in backend list {:?}", self.model, models);
        }
        Ok(found)
    }
}
