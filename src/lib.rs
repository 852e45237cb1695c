pub mod agent_prompts;
pub mod agents;
pub mod catalog;
pub mod config;
pub mod error;
pub mod execution;
pub mod execution_loop;
pub mod extraction;
pub mod llm;
pub mod pipeline;
pub mod validator;

pub use error::{PipelineError, Result};
pub use pipeline::{ConnectivityReport, Pipeline, PipelineResult, PipelineStatus};
