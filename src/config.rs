//! Pipeline configuration.
//!
//! Values come from defaults, then the environment (a `.env` file is honoured),
//! then whatever the CLI overrides on top.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "codellama:13b";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MAX_REFINEMENTS: u32 = 3;
pub const DEFAULT_ROW_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// SQLite database the questions are asked against
    pub database_path: PathBuf,

    /// Model identifier as reported by the inference backend
    pub model: String,

    pub base_url: String,

    /// Upper bound on Refiner invocations per request
    pub max_refinement_attempts: u32,

    /// Row cap injected into uncapped read queries
    pub row_limit: usize,

    pub selector_temperature: f32,
    pub decomposer_temperature: f32,
    pub refiner_temperature: f32,

    pub generate_timeout: Duration,
    pub health_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_refinement_attempts: DEFAULT_MAX_REFINEMENTS,
            row_limit: DEFAULT_ROW_LIMIT,
            selector_temperature: 0.0,
            decomposer_temperature: 0.0,
            // repair benefits from a little diversity
            refiner_temperature: 0.3,
            generate_timeout: Duration::from_secs(300),
            health_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(2),
        }
    }
}

impl PipelineConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Build a configuration from `NL2SQL_*` / `OLLAMA_BASE_URL` variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(path) = std::env::var("NL2SQL_DATABASE") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(model) = std::env::var("NL2SQL_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.base_url = url;
        }
        if let Some(n) = env_number::<u32>("NL2SQL_MAX_REFINEMENTS")? {
            config.max_refinement_attempts = n;
        }
        if let Some(n) = env_number::<usize>("NL2SQL_ROW_LIMIT")? {
            config.row_limit = n;
        }
        if let Some(secs) = env_number::<u64>("NL2SQL_GENERATE_TIMEOUT_SECS")? {
            config.generate_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Construction-time checks. Anything failing here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(PipelineError::Config("database path is required".to_string()));
        }
        if !self.database_path.exists() {
            return Err(PipelineError::Config(format!(
                "database not found: {}",
                self.database_path.display()
            )));
        }
        if self.row_limit == 0 {
            return Err(PipelineError::Config("row limit must be at least 1".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::Config("model base URL is empty".to_string()));
        }
        Ok(())
    }
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| PipelineError::Config(format!("{} is not a valid number: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.model, "codellama:13b");
        assert_eq!(config.max_refinement_attempts, 3);
        assert_eq!(config.row_limit, 100);
        assert_eq!(config.selector_temperature, 0.0);
        assert!(config.refiner_temperature > config.decomposer_temperature);
    }

    #[test]
    fn test_missing_database_is_config_error() {
        let err = PipelineConfig::default().validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = PipelineConfig::new("/definitely/not/here.db").validate().unwrap_err();
        assert!(err.to_string().contains("database not found"));
    }

    #[test]
    fn test_zero_row_limit_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = PipelineConfig::new(file.path());
        assert!(config.validate().is_ok());

        config.row_limit = 0;
        assert!(config.validate().is_err());
    }
}
