//! Pipeline Orchestrator
//!
//! Selector -> Decomposer -> bounded validate/refine loop -> capped execution.
//! Every request gets a [`PipelineResult`]; only construction can fail.

use crate::agents::{
    DecomposerAgent, DecomposerOutput, RefinerAgent, RefinerOutput, SelectedSchema,
    SelectorAgent, SqlCandidate,
};
use crate::catalog::{CatalogSnapshot, SchemaCatalog};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::execution::engine::StorageEngine;
use crate::execution::result::ExecutionResult;
use crate::execution::sqlite_engine::SqliteEngine;
use crate::execution_loop::refinement_loop::{Refine, RefinementLoop, RefinementRound};
use crate::llm::{ModelGateway, OllamaClient};
use crate::validator::{QueryValidator, ValidationOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Validated and executed
    Answered,
    /// Validated, but the engine failed at run time
    ExecutionFailed,
    /// Refinement exhausted on a rejected candidate; nothing executed
    NoValidSql,
    /// Validation disabled; nothing executed
    NotValidated,
    /// Model or storage unreachable
    BackendError,
}

/// Full trace of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub request_id: String,
    pub question: String,
    pub final_sql: Option<String>,
    pub selector_output: Option<SelectedSchema>,
    pub decomposer_output: Option<DecomposerOutput>,
    /// Refinement rounds run
    pub refinements: u32,
    pub refinement_trace: Vec<RefinementRound>,
    /// Last validation, describing `final_sql`
    pub validation: Option<ValidationOutcome>,
    pub execution_result: Option<ExecutionResult>,
    pub status: PipelineStatus,
    pub success: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl PipelineResult {
    fn start(question: &str) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            question: question.to_string(),
            final_sql: None,
            selector_output: None,
            decomposer_output: None,
            refinements: 0,
            refinement_trace: Vec::new(),
            validation: None,
            execution_result: None,
            status: PipelineStatus::BackendError,
            success: false,
            error: None,
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn rows(&self) -> &[crate::execution::result::Row] {
        self.execution_result
            .as_ref()
            .map(|r| r.rows.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    Connected,
    ModelNotFound,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageStatus {
    Connected,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub model: ModelStatus,
    pub storage: StorageStatus,
}

impl ConnectivityReport {
    /// Both the model and the database answer.
    pub fn is_ready(&self) -> bool {
        self.model == ModelStatus::Connected && self.storage == StorageStatus::Connected
    }

    /// `Err` naming the first backend that is not ready.
    pub fn ensure_ready(&self, model: &str) -> Result<()> {
        match &self.model {
            ModelStatus::Connected => {}
            ModelStatus::ModelNotFound => {
                return Err(PipelineError::Llm(format!("model {} not found", model)))
            }
            ModelStatus::Error(msg) => return Err(PipelineError::Llm(msg.clone())),
        }
        match &self.storage {
            StorageStatus::Connected => Ok(()),
            StorageStatus::Error(msg) => Err(PipelineError::Storage(msg.clone())),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    llm: Arc<dyn ModelGateway>,
    catalog: SchemaCatalog,
    engine: Arc<dyn StorageEngine>,
    validator: QueryValidator,
    selector: SelectorAgent,
    decomposer: DecomposerAgent,
    refiner: RefinerAgent,
    refinement_loop: RefinementLoop,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl Pipeline {
    /// Build a pipeline over `config.database_path` talking to `llm`.
    ///
    /// Fails on misconfiguration or an unreadable catalog.
    pub fn new(config: PipelineConfig, llm: Arc<dyn ModelGateway>) -> Result<Self> {
        config.validate()?;

        let catalog = SchemaCatalog::with_engine(SqliteEngine::from_config(&config));
        let snapshot = catalog.snapshot()?;
        let engine: Arc<dyn StorageEngine> = Arc::new(SqliteEngine::from_config(&config));

        let pipeline = Self {
            validator: QueryValidator::new(Arc::clone(&engine), config.row_limit),
            selector: SelectorAgent::new(Arc::clone(&llm))
                .with_temperature(config.selector_temperature),
            decomposer: DecomposerAgent::new(Arc::clone(&llm))
                .with_temperature(config.decomposer_temperature),
            refiner: RefinerAgent::new(Arc::clone(&llm))
                .with_temperature(config.refiner_temperature),
            refinement_loop: RefinementLoop::new(config.max_refinement_attempts),
            snapshot: RwLock::new(Arc::new(snapshot)),
            catalog,
            engine,
            llm,
            config,
        };

        info!(
            "Pipeline initialized with model: {} ({} tables)",
            pipeline.llm.model(),
            pipeline.snapshot().tables.len()
        );
        Ok(pipeline)
    }

    /// Pipeline backed by the Ollama client described in `config`.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let llm: Arc<dyn ModelGateway> = Arc::new(OllamaClient::from_config(&config));
        Self::new(config, llm)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// Catalog snapshot currently published to requests.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Re-read the catalog. In-flight requests keep the snapshot they started with.
    pub fn refresh_catalog(&self) -> Result<Arc<CatalogSnapshot>> {
        let fresh = Arc::new(self.catalog.snapshot()?);
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&fresh);
        info!("Catalog refreshed");
        Ok(fresh)
    }

    /// Answer `question`. Never fails; problems are reported in the result.
    pub async fn query(&self, question: &str) -> PipelineResult {
        let timer = Instant::now();
        let mut result = PipelineResult::start(question);
        info!(request_id = %result.request_id, "Processing question: {}", question);

        if let Err(e) = self.run_stages(question, &mut result).await {
            error!(request_id = %result.request_id, "Pipeline failed: {}", e);
            result.status = PipelineStatus::BackendError;
            result.error = Some(e.to_string());
        }

        result.success = result.status == PipelineStatus::Answered;
        result.elapsed_ms = timer.elapsed().as_millis() as u64;
        info!(
            request_id = %result.request_id,
            "Finished with {:?} after {} refinements in {} ms",
            result.status,
            result.refinements,
            result.elapsed_ms
        );
        result
    }

    async fn run_stages(&self, question: &str, result: &mut PipelineResult) -> Result<()> {
        let snapshot = self.snapshot();

        info!("Running Selector...");
        let selected = self.selector.select(question, &snapshot.columns).await?;
        result.selector_output = Some(selected.clone());

        info!("Running Decomposer...");
        let decomposed = self.decomposer.decompose(question, &selected).await?;
        result.final_sql = Some(decomposed.sql.text.clone());
        let initial = decomposed.sql.clone();
        result.decomposer_output = Some(decomposed);

        let column_inventory = snapshot.column_list_text();
        let refine = RefineRequest {
            agent: &self.refiner,
            question,
            schema: &column_inventory,
        };
        let outcome = self
            .refinement_loop
            .run(initial, &self.validator, &refine)
            .await?;

        result.final_sql = Some(outcome.candidate.text.clone());
        result.refinements = outcome.refinements;
        result.refinement_trace = outcome.trace;
        result.validation = outcome.validation.clone();

        match outcome.validation {
            None => {
                warn!("Candidate was never validated, not executing");
                result.status = PipelineStatus::NotValidated;
                result.error = Some("SQL was not validated (refinement disabled)".to_string());
            }
            Some(validation) if !validation.valid => {
                warn!("No valid SQL after {} refinements", outcome.refinements);
                result.status = PipelineStatus::NoValidSql;
                result.error = validation.error;
            }
            Some(_) => {
                let execution = self.validator.execute(&outcome.candidate.text, None);
                result.status = if execution.success {
                    PipelineStatus::Answered
                } else {
                    PipelineStatus::ExecutionFailed
                };
                result.error = execution.error.clone();
                result.execution_result = Some(execution);
            }
        }

        Ok(())
    }

    /// Probe the model backend and the database.
    pub async fn test_connectivity(&self) -> ConnectivityReport {
        let model = match self.llm.health_check().await {
            Ok(true) => {
                info!("LLM model {} is available", self.llm.model());
                ModelStatus::Connected
            }
            Ok(false) => {
                warn!("Model {} not found", self.llm.model());
                ModelStatus::ModelNotFound
            }
            Err(e) => ModelStatus::Error(e.to_string()),
        };

        let storage = match self.engine.ping() {
            Ok(()) => {
                info!("Database {} is accessible", self.config.database_path.display());
                StorageStatus::Connected
            }
            Err(e) => StorageStatus::Error(e.to_string()),
        };

        ConnectivityReport { model, storage }
    }
}

/// Binds the per-request context the refiner needs to the loop's seam.
struct RefineRequest<'a> {
    agent: &'a RefinerAgent,
    question: &'a str,
    schema: &'a str,
}

#[async_trait]
impl<'a> Refine for RefineRequest<'a> {
    async fn refine(&self, candidate: &SqlCandidate, error: &str) -> Result<RefinerOutput> {
        self.agent
            .refine(self.question, self.schema, candidate, error)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::llm::ScriptedGateway;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_pipeline_is_shareable() {
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn test_missing_database_fails_construction() {
        let llm: Arc<dyn ModelGateway> = Arc::new(ScriptedGateway::new("m"));
        let err = Pipeline::new(PipelineConfig::default(), llm).err().unwrap();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_connectivity_readiness() {
        let report = ConnectivityReport {
            model: ModelStatus::ModelNotFound,
            storage: StorageStatus::Connected,
        };
        assert!(!report.is_ready());

        let report = ConnectivityReport {
            model: ModelStatus::Connected,
            storage: StorageStatus::Connected,
        };
        assert!(report.is_ready());
        assert!(report.ensure_ready("m").is_ok());
    }

    #[test]
    fn test_ensure_ready_names_failing_backend() {
        let report = ConnectivityReport {
            model: ModelStatus::ModelNotFound,
            storage: StorageStatus::Connected,
        };
        let err = report.ensure_ready("codellama:13b").unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
        assert!(err.to_string().contains("codellama:13b"));

        let report = ConnectivityReport {
            model: ModelStatus::Connected,
            storage: StorageStatus::Error("unable to open database file".to_string()),
        };
        assert!(matches!(
            report.ensure_ready("m"),
            Err(PipelineError::Storage(_))
        ));
    }
}
