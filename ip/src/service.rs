//! PipelineService - the caller-facing surface
//!
//! The abstract API of the pipeline: start / status / answer, plus the ops
//! views (session listing, metrics). A transport (CLI here, HTTP in an
//! embedding application) calls into this facade; response shape per status
//! follows the error-handling design: `failed` exposes only a cause string,
//! `complete` is the only state exposing a report.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::info;

use crate::collab::{DraftCritic, DraftGenerator, LlmDraftCritic, LlmDraftGenerator};
use crate::config::Config;
use crate::domain::{CapacityBand, DiagnosticInput, InterpretationSession, PlanningInputs};
use crate::llm;
use crate::pipeline::{AnswerSubmission, PipelineError, PipelineOrchestrator, PipelineOutcome};
use crate::state::{PipelineMetrics, StateManager};

/// Everything a caller provides to start a pipeline
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub run_id: String,

    /// Diagnostic snapshot from the scoring collaborator
    pub diagnostic: DiagnosticInput,

    /// Stated capacity band; inferred from config when absent
    pub stated_band: Option<CapacityBand>,

    /// Objective IDs to prioritize in the action plan
    pub priority_focus: Vec<String>,

    /// Reset a complete session and run again from scratch
    pub restart: bool,
}

/// The pipeline behind a caller-facing facade
pub struct PipelineService {
    orchestrator: PipelineOrchestrator,
    state: StateManager,
}

impl PipelineService {
    /// Wire the full service from configuration: store, LLM client, and the
    /// two LLM-backed collaborators
    pub fn from_config(config: &Config) -> Result<Self> {
        let store_path = PathBuf::from(&config.storage.store_dir);
        if !store_path.exists() {
            fs::create_dir_all(&store_path).context("Failed to create store directory")?;
        }
        let state = StateManager::spawn(&store_path).context("Failed to spawn StateManager")?;

        let client = llm::create_client(&config.llm).context("Failed to create LLM client")?;
        let generator: Arc<dyn DraftGenerator> = Arc::new(LlmDraftGenerator::new(client.clone()));
        let critic: Arc<dyn DraftCritic> =
            Arc::new(LlmDraftCritic::new(client, config.pipeline.forbidden_phrases.clone()));

        info!(model = %config.llm.model, store = %store_path.display(), "Pipeline service initialized");
        Ok(Self::with_collaborators(config, state, generator, critic))
    }

    /// Wire the service with explicit collaborators (used by tests and by
    /// embedders that bring their own)
    pub fn with_collaborators(
        config: &Config,
        state: StateManager,
        generator: Arc<dyn DraftGenerator>,
        critic: Arc<dyn DraftCritic>,
    ) -> Self {
        let orchestrator = PipelineOrchestrator::new(
            config.pipeline.clone(),
            config.capacity.clone(),
            state.clone(),
            generator,
            critic,
        );
        Self { orchestrator, state }
    }

    /// POST start
    pub async fn start(&self, request: StartRequest) -> Result<PipelineOutcome, PipelineError> {
        let planning = PlanningInputs {
            stated_band: request.stated_band,
            priority_focus: request.priority_focus,
        };
        self.orchestrator
            .start(&request.run_id, request.diagnostic, planning, request.restart)
            .await
    }

    /// GET status
    pub async fn status(&self, run_id: &str) -> Result<PipelineOutcome, PipelineError> {
        self.orchestrator.poll(run_id).await
    }

    /// POST answer
    pub async fn answer(&self, run_id: &str, submissions: Vec<AnswerSubmission>) -> Result<PipelineOutcome, PipelineError> {
        self.orchestrator.answer(run_id, submissions).await
    }

    /// All sessions, optionally filtered by status name
    pub async fn sessions(&self, status: Option<String>) -> Result<Vec<InterpretationSession>, PipelineError> {
        Ok(self.state.list_sessions(status).await?)
    }

    /// Aggregate metrics across sessions
    pub async fn metrics(&self) -> Result<PipelineMetrics> {
        self.state.get_metrics().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::mock::{MockCritic, MockGenerator};
    use crate::domain::{Draft, SessionStatus};
    use tempfile::tempdir;

    fn service(temp: &tempfile::TempDir) -> PipelineService {
        let config = Config::default();
        let state = StateManager::spawn(temp.path()).unwrap();
        PipelineService::with_collaborators(
            &config,
            state,
            Arc::new(MockGenerator::fixed(Draft::empty())),
            Arc::new(MockCritic::satisfied()),
        )
    }

    fn request(run_id: &str) -> StartRequest {
        StartRequest {
            run_id: run_id.to_string(),
            diagnostic: DiagnosticInput::default(),
            stated_band: Some(CapacityBand::Low),
            priority_focus: vec![],
            restart: false,
        }
    }

    #[tokio::test]
    async fn test_start_then_status() {
        let temp = tempdir().unwrap();
        let svc = service(&temp);

        let outcome = svc.start(request("run-9")).await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Complete);
        let report = outcome.report.unwrap();
        assert_eq!(report.action_plan.band, CapacityBand::Low);
        assert!(!report.action_plan.assumed);

        let status = svc.status("run-9").await.unwrap();
        assert_eq!(status.status, SessionStatus::Complete);
        assert!(status.report.is_some());
    }

    #[tokio::test]
    async fn test_sessions_and_metrics() {
        let temp = tempdir().unwrap();
        let svc = service(&temp);

        svc.start(request("run-1")).await.unwrap();
        svc.start(request("run-2")).await.unwrap();

        let sessions = svc.sessions(None).await.unwrap();
        assert_eq!(sessions.len(), 2);

        let complete = svc.sessions(Some("complete".to_string())).await.unwrap();
        assert_eq!(complete.len(), 2);

        let metrics = svc.metrics().await.unwrap();
        assert_eq!(metrics.total_sessions, 2);
        assert_eq!(metrics.complete, 2);
    }

    #[tokio::test]
    async fn test_assumed_band_when_unstated() {
        let temp = tempdir().unwrap();
        let svc = service(&temp);

        let mut req = request("run-1");
        req.stated_band = None;
        let outcome = svc.start(req).await.unwrap();

        let plan = outcome.report.unwrap().action_plan;
        assert!(plan.assumed);
        assert_eq!(plan.band, CapacityBand::Medium);
    }
}
