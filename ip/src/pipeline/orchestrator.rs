//! PipelineOrchestrator - the interpretation state machine
//!
//! Drives one session through pending -> generating -> assessed ->
//! (awaiting_user | finalizing) -> complete, suspending only at
//! awaiting_user. Every entry point re-reads the persisted session, decides,
//! and writes the new state back before returning; no in-memory state
//! survives a user round-trip.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collab::{DraftCritic, DraftGenerator};
use crate::config::{CapacityConfig, PipelineConfig};
use crate::domain::{
    Answer, AnswerConfidence, AnswerValue, CapacityResult, DiagnosticInput, Draft, InterpretationSession,
    PlanningInputs, Question, Report, SessionStatus,
};
use crate::planner::{ActionCapacityPlanner, derive_candidates};
use crate::prompts::AnswerLine;
use crate::state::{StateError, StateManager};

use super::budget::QuestionBudgetAllocator;
use super::evidence;
use super::prioritizer::GapPrioritizer;

/// Errors surfaced to the caller
///
/// A failed session is not an error here: `failed` is a state the outcome
/// reports. These errors are request-level rejections.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No session found for run {0}")]
    NotFound(String),

    #[error("Session for run {run_id} is {status}; it is not awaiting answers")]
    NotAwaitingAnswers { run_id: String, status: SessionStatus },

    #[error("Answer submission does not match the outstanding round: {0}")]
    AnswerMismatch(String),

    #[error("Illegal transition {from} -> {to}")]
    IllegalTransition { from: SessionStatus, to: SessionStatus },

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// One answer submitted by the intake caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub answer: AnswerValue,
    #[serde(default)]
    pub confidence: AnswerConfidence,
}

/// Canonical view of a session returned by every entry point
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub session_id: String,
    pub run_id: String,
    pub status: SessionStatus,
    pub current_round: u32,
    pub total_questions_asked: u32,

    /// Outstanding questions; non-empty only in awaiting_user
    pub questions: Vec<Question>,

    /// The report; present only in complete
    pub report: Option<Report>,

    /// Opaque failure cause; present only in failed
    pub error: Option<String>,

    /// Set when a start call found a live session instead of creating one
    pub already_in_progress: bool,
}

impl PipelineOutcome {
    fn new(session: InterpretationSession, questions: Vec<Question>, already_in_progress: bool) -> Self {
        let report = match session.status {
            SessionStatus::Complete => session.report,
            _ => None,
        };
        let error = match session.status {
            SessionStatus::Failed => session.error,
            _ => None,
        };
        Self {
            session_id: session.id,
            run_id: session.run_id,
            status: session.status,
            current_round: session.current_round,
            total_questions_asked: session.total_questions_asked,
            questions,
            report,
            error,
            already_in_progress,
        }
    }
}

/// The pipeline state machine
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    capacity: CapacityConfig,
    state: StateManager,
    generator: Arc<dyn DraftGenerator>,
    critic: Arc<dyn DraftCritic>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        capacity: CapacityConfig,
        state: StateManager,
        generator: Arc<dyn DraftGenerator>,
        critic: Arc<dyn DraftCritic>,
    ) -> Self {
        Self {
            config,
            capacity,
            state,
            generator,
            critic,
        }
    }

    /// Start (or join) the pipeline for a run
    ///
    /// Idempotent: an existing session is returned as-is instead of racing a
    /// duplicate into existence. `restart` is honored only on a `complete`
    /// session and deletes the prior session, questions, and report first.
    pub async fn start(
        &self,
        run_id: &str,
        diagnostic: DiagnosticInput,
        planning: PlanningInputs,
        restart: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        if let Some(existing) = self.state.get_session_by_run(run_id).await? {
            if restart && existing.status == SessionStatus::Complete {
                info!(run_id, session_id = %existing.id, "Restarting complete session from scratch");
                self.state.delete_session_cascade(&existing.id).await?;
            } else {
                debug!(run_id, status = %existing.status, "Start is idempotent; returning existing session");
                let in_progress = !existing.is_terminal();
                return self.outcome_of(existing, in_progress).await;
            }
        }

        let session = InterpretationSession::new(run_id, diagnostic, planning);
        match self.state.create_session(session.clone()).await {
            Ok(_) => {}
            Err(StateError::Conflict(cause)) => {
                // Lost the creation race; the winner's session is canonical
                debug!(run_id, %cause, "Concurrent start detected");
                let existing = self
                    .state
                    .get_session_by_run(run_id)
                    .await?
                    .ok_or_else(|| PipelineError::NotFound(run_id.to_string()))?;
                return self.outcome_of(existing, true).await;
            }
            Err(e) => return Err(e.into()),
        }

        info!(run_id, session_id = %session.id, "Pipeline started");
        self.advance(session).await
    }

    /// Poll endpoint: the current persisted state, read-only
    pub async fn poll(&self, run_id: &str) -> Result<PipelineOutcome, PipelineError> {
        let session = self
            .state
            .get_session_by_run(run_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(run_id.to_string()))?;
        self.outcome_of(session, false).await
    }

    /// Submit answers for the outstanding round and resume the pipeline
    ///
    /// The submission must cover the round exactly: every outstanding
    /// question answered once, nothing else.
    pub async fn answer(&self, run_id: &str, submissions: Vec<AnswerSubmission>) -> Result<PipelineOutcome, PipelineError> {
        let mut session = self
            .state
            .get_session_by_run(run_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(run_id.to_string()))?;

        if !session.status.is_awaiting_user() {
            return Err(PipelineError::NotAwaitingAnswers {
                run_id: run_id.to_string(),
                status: session.status,
            });
        }

        let outstanding = self.unanswered_questions(&session).await?;
        let outstanding_ids: HashSet<&str> = outstanding.iter().map(|q| q.id.as_str()).collect();

        if submissions.len() != outstanding.len() {
            return Err(PipelineError::AnswerMismatch(format!(
                "expected {} answers for round {}, got {}",
                outstanding.len(),
                session.current_round,
                submissions.len()
            )));
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for submission in &submissions {
            if !outstanding_ids.contains(submission.question_id.as_str()) {
                return Err(PipelineError::AnswerMismatch(format!(
                    "question {} is not outstanding",
                    submission.question_id
                )));
            }
            if !seen.insert(submission.question_id.as_str()) {
                return Err(PipelineError::AnswerMismatch(format!(
                    "question {} answered twice",
                    submission.question_id
                )));
            }
        }

        let answers: Vec<Answer> = submissions
            .into_iter()
            .map(|s| Answer::new(&s.question_id, &session.id, s.answer, s.confidence))
            .collect();
        match self.state.create_answers(answers).await {
            Ok(()) => {}
            // A concurrent submission got there first; answers never mutate
            Err(StateError::Conflict(cause)) => return Err(PipelineError::AnswerMismatch(cause)),
            Err(e) => return Err(e.into()),
        }

        info!(run_id, round = session.current_round, "Round answered; resuming pipeline");
        self.step(&mut session, SessionStatus::Generating)?;
        self.state.update_session(session.clone()).await?;
        self.advance(session).await
    }

    /// Drive the state machine to the next suspension point or terminal state
    async fn advance(&self, mut session: InterpretationSession) -> Result<PipelineOutcome, PipelineError> {
        loop {
            debug!(session_id = %session.id, status = %session.status, "Advancing pipeline");
            match session.status {
                SessionStatus::Pending => {
                    self.step(&mut session, SessionStatus::Generating)?;
                    self.state.update_session(session.clone()).await?;
                }

                SessionStatus::Generating => {
                    let answers = self.collect_answer_lines(&session).await?;
                    let instructions = session.rewrite_instructions.clone();
                    let diagnostic = session.diagnostic.clone();

                    let result = self
                        .call_with_retry("draft generation", || {
                            self.generator.generate(&diagnostic, &answers, &instructions)
                        })
                        .await;

                    match result {
                        Ok(draft) => {
                            session.set_draft(draft);
                            self.step(&mut session, SessionStatus::Assessed)?;
                            self.state.update_session(session.clone()).await?;
                        }
                        Err(cause) => return self.fail_session(session, cause).await,
                    }
                }

                SessionStatus::Assessed => {
                    let draft = session.draft.clone().unwrap_or_else(Draft::empty);
                    let diagnostic = session.diagnostic.clone();

                    let assessment = match self
                        .call_with_retry("draft critique", || self.critic.assess(&draft, &diagnostic))
                        .await
                    {
                        Ok(assessment) => assessment,
                        Err(cause) => return self.fail_session(session, cause).await,
                    };

                    let ranked_gaps = GapPrioritizer.rank(&assessment.gaps, &draft);
                    let ordered = GapPrioritizer.select_questions(assessment.generated_questions, &ranked_gaps);
                    let allocator = QuestionBudgetAllocator::from_config(&self.config);
                    let kept =
                        allocator.allocate(ordered.clone(), session.total_questions_asked, session.current_round);

                    // Rewrite instructions carry into the next generation;
                    // gaps whose questions were dropped resurface here
                    let mut instructions = assessment.rewrite_instructions.clone();
                    let kept_gaps: HashSet<&str> = kept.iter().map(|q| q.gap_id.as_str()).collect();
                    for dropped in ordered.iter().filter(|q| !kept_gaps.contains(q.gap_id.as_str())) {
                        if let Some(gap) = ranked_gaps.iter().find(|g| g.gap_id == dropped.gap_id) {
                            instructions.push(format!("Address without asking the user: {}", gap.description));
                        }
                    }
                    session.set_rewrite_instructions(instructions);

                    if kept.is_empty() {
                        info!(
                            session_id = %session.id,
                            quality = %assessment.overall_quality,
                            round = session.current_round,
                            "No questions to deliver; finalizing"
                        );
                        self.step(&mut session, SessionStatus::Finalizing)?;
                        self.state.update_session(session.clone()).await?;
                    } else {
                        let round = session.current_round + 1;
                        let questions: Vec<Question> = kept
                            .into_iter()
                            .map(|candidate| Question::from_candidate(candidate, &session.id, round))
                            .collect();
                        self.state.create_questions(questions.clone()).await?;
                        session.record_round(questions.len() as u32);
                        self.step(&mut session, SessionStatus::AwaitingUser)?;
                        self.state.update_session(session.clone()).await?;

                        info!(
                            session_id = %session.id,
                            round,
                            delivered = questions.len(),
                            total = session.total_questions_asked,
                            "Questions delivered; awaiting user"
                        );
                        return Ok(PipelineOutcome::new(session, questions, false));
                    }
                }

                SessionStatus::Finalizing => {
                    return self.finalize(session).await;
                }

                SessionStatus::AwaitingUser => {
                    let questions = self.unanswered_questions(&session).await?;
                    return Ok(PipelineOutcome::new(session, questions, false));
                }

                SessionStatus::Complete | SessionStatus::Failed => {
                    return Ok(PipelineOutcome::new(session, Vec::new(), false));
                }
            }
        }
    }

    /// The finalizing gate: polish verdict, hard-violation check, at most
    /// one regeneration, then the report ships
    async fn finalize(&self, mut session: InterpretationSession) -> Result<PipelineOutcome, PipelineError> {
        let allowed = session.diagnostic.evidence_set();
        let mut draft = session.draft.clone().unwrap_or_else(Draft::empty);
        let mut forced = false;

        let review = match self.call_with_retry("final review", || self.critic.finalize(&draft)).await {
            Ok(review) => review,
            Err(cause) => return self.fail_session(session, cause).await,
        };

        let unknown = evidence::unknown_citations(&draft, &allowed);
        let local_forbidden = evidence::scan_forbidden(&draft, &self.config.forbidden_phrases);
        let hard_violation =
            !review.forbidden_matches.is_empty() || !local_forbidden.is_empty() || !unknown.is_empty();

        if !review.ready && hard_violation {
            warn!(
                session_id = %session.id,
                unknown_citations = unknown.len(),
                forbidden = review.forbidden_matches.len() + local_forbidden.len(),
                "Final gate found hard violations; regenerating once"
            );

            self.step(&mut session, SessionStatus::Generating)?;
            self.state.update_session(session.clone()).await?;

            let mut instructions = session.rewrite_instructions.clone();
            instructions.extend(review.edits.clone());
            for id in &unknown {
                instructions.push(format!("Remove or replace the unsupported citation '{}'", id));
            }
            for phrase in local_forbidden.iter().chain(review.forbidden_matches.iter()) {
                instructions.push(format!("Remove the phrase '{}'", phrase));
            }

            let answers = self.collect_answer_lines(&session).await?;
            let diagnostic = session.diagnostic.clone();
            match self
                .call_with_retry("draft regeneration", || {
                    self.generator.generate(&diagnostic, &answers, &instructions)
                })
                .await
            {
                Ok(new_draft) => {
                    draft = new_draft;
                    session.set_draft(draft.clone());
                }
                Err(cause) => return self.fail_session(session, cause).await,
            }

            self.step(&mut session, SessionStatus::Assessed)?;
            self.state.update_session(session.clone()).await?;
            self.step(&mut session, SessionStatus::Finalizing)?;
            self.state.update_session(session.clone()).await?;

            // The second verdict cannot send us around again: force-accept
            if let Err(cause) = self.call_with_retry("final review", || self.critic.finalize(&draft)).await {
                return self.fail_session(session, cause).await;
            }
            forced = true;
        }

        let evidence_manifest = evidence::build_manifest(&draft, &session.diagnostic);
        let candidates = derive_candidates(&session.diagnostic);
        let capacity = CapacityResult::resolve(session.planning.stated_band, &self.capacity);
        let action_plan = ActionCapacityPlanner.plan(candidates, capacity, &session.planning.priority_focus);
        if let Err(defect) = action_plan.validate() {
            return self.fail_session(session, format!("Action plan defect: {}", defect)).await;
        }

        session.set_report(Report {
            draft,
            evidence_manifest,
            action_plan,
            forced,
        });
        self.step(&mut session, SessionStatus::Complete)?;
        self.state.update_session(session.clone()).await?;

        info!(session_id = %session.id, forced, "Report persisted; session complete");
        Ok(PipelineOutcome::new(session, Vec::new(), false))
    }

    /// One collaborator call: bounded by the configured timeout, retried
    /// once on a recoverable failure, fatal on the second
    async fn call_with_retry<T, Fut>(&self, op: &str, make_call: impl Fn() -> Fut) -> Result<T, String>
    where
        Fut: Future<Output = Result<T, crate::collab::CollabError>>,
    {
        let timeout = Duration::from_millis(self.config.collaborator_timeout_ms);
        let mut retried = false;

        loop {
            match tokio::time::timeout(timeout, make_call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_retryable() && !retried => {
                    warn!(op, error = %e, "Collaborator call failed; retrying once");
                    retried = true;
                }
                Ok(Err(e)) => return Err(format!("{} failed: {}", op, e)),
                Err(_) if !retried => {
                    warn!(op, timeout_ms = timeout.as_millis() as u64, "Collaborator call timed out; retrying once");
                    retried = true;
                }
                Err(_) => {
                    return Err(format!("{} timed out after {}ms (retry exhausted)", op, timeout.as_millis()));
                }
            }
        }
    }

    /// Terminal failure: store the cause, expose status + cause only
    async fn fail_session(&self, mut session: InterpretationSession, cause: String) -> Result<PipelineOutcome, PipelineError> {
        warn!(session_id = %session.id, %cause, "Session failed");
        session.fail(cause);
        self.state.update_session(session.clone()).await?;
        Ok(PipelineOutcome::new(session, Vec::new(), false))
    }

    fn step(&self, session: &mut InterpretationSession, next: SessionStatus) -> Result<(), PipelineError> {
        let from = session.status;
        if !session.transition_to(next) {
            return Err(PipelineError::IllegalTransition { from, to: next });
        }
        Ok(())
    }

    async fn outcome_of(
        &self,
        session: InterpretationSession,
        already_in_progress: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        let questions = if session.status.is_awaiting_user() {
            self.unanswered_questions(&session).await?
        } else {
            Vec::new()
        };
        Ok(PipelineOutcome::new(session, questions, already_in_progress))
    }

    /// Questions of the current round that have no answer yet
    async fn unanswered_questions(&self, session: &InterpretationSession) -> Result<Vec<Question>, PipelineError> {
        let questions = self.state.list_questions(&session.id, Some(session.current_round)).await?;
        let answers = self.state.list_answers(&session.id).await?;
        let answered: HashSet<&str> = answers.iter().map(|a| a.question_id.as_str()).collect();
        Ok(questions
            .into_iter()
            .filter(|q| !answered.contains(q.id.as_str()))
            .collect())
    }

    /// All answered questions across rounds, paired for prompt context
    async fn collect_answer_lines(&self, session: &InterpretationSession) -> Result<Vec<AnswerLine>, PipelineError> {
        let questions = self.state.list_questions(&session.id, None).await?;
        let answers = self.state.list_answers(&session.id).await?;
        Ok(AnswerLine::collect(&questions, &answers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::mock::{MockCritic, MockGenerator};
    use crate::collab::{Assessment, CollabError, FinalReview};
    use crate::domain::{CandidateQuestion, Gap, Objective, QuestionType, SectionKind};
    use crate::llm::LlmError;
    use tempfile::tempdir;

    fn diagnostic() -> DiagnosticInput {
        DiagnosticInput {
            objectives: vec![Objective {
                id: "gov.roles".to_string(),
                name: "Governance roles".to_string(),
                score: 35,
                importance: 1,
                has_critical_failure: false,
                question_id: Some("q-gov".to_string()),
                expert_action: None,
            }],
            critical_failures: vec![],
            failed_gates: vec![],
        }
    }

    fn grounded_draft() -> Draft {
        let mut draft = Draft::empty();
        draft.sections[0].body = "The organization is mid-journey.".to_string();
        draft.evidence_ids_used = vec!["obj-gov.roles".to_string()];
        draft
    }

    fn question_assessment(n: usize) -> Assessment {
        Assessment {
            gaps: (0..n)
                .map(|i| Gap {
                    gap_id: format!("gap-{}", i),
                    section: SectionKind::Risks,
                    description: format!("gap {}", i),
                    severity: 3,
                    related_evidence_ids: Default::default(),
                })
                .collect(),
            overall_quality: crate::domain::QualityRating::Yellow,
            rewrite_instructions: vec![],
            generated_questions: (0..n)
                .map(|i| CandidateQuestion {
                    gap_id: format!("gap-{}", i),
                    kind: QuestionType::FreeText,
                    text: format!("Question {}?", i),
                    options: vec![],
                    rationale: String::new(),
                })
                .collect(),
        }
    }

    struct Harness {
        orchestrator: PipelineOrchestrator,
        _temp: tempfile::TempDir,
    }

    fn harness(generator: MockGenerator, critic: MockCritic) -> Harness {
        let temp = tempdir().unwrap();
        let state = StateManager::spawn(temp.path()).unwrap();
        let orchestrator = PipelineOrchestrator::new(
            PipelineConfig::default(),
            CapacityConfig::default(),
            state,
            Arc::new(generator),
            Arc::new(critic),
        );
        Harness {
            orchestrator,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn test_no_gaps_runs_to_complete() {
        let h = harness(MockGenerator::fixed(grounded_draft()), MockCritic::satisfied());

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::Complete);
        let report = outcome.report.unwrap();
        assert!(!report.forced);
        assert_eq!(report.evidence_manifest.len(), 1);
        assert_eq!(report.evidence_manifest[0].id, "obj-gov.roles");
        // The weak objective made it into the plan
        assert_eq!(report.action_plan.actions.len(), 1);
        assert_eq!(outcome.current_round, 0);
        assert_eq!(outcome.total_questions_asked, 0);
    }

    #[tokio::test]
    async fn test_question_round_trip() {
        let critic = MockCritic::new(
            vec![Ok(question_assessment(2)), Ok(Assessment::default())],
            vec![],
        );
        let h = harness(MockGenerator::fixed(grounded_draft()), critic);

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::AwaitingUser);
        assert_eq!(outcome.questions.len(), 2);
        assert_eq!(outcome.current_round, 1);
        assert_eq!(outcome.total_questions_asked, 2);

        // Poll sees the same outstanding questions
        let polled = h.orchestrator.poll("run-1").await.unwrap();
        assert_eq!(polled.status, SessionStatus::AwaitingUser);
        assert_eq!(polled.questions.len(), 2);

        // Answer the full round; next critique has nothing left to ask
        let submissions: Vec<AnswerSubmission> = outcome
            .questions
            .iter()
            .map(|q| AnswerSubmission {
                question_id: q.id.clone(),
                answer: AnswerValue::Text("quarterly".to_string()),
                confidence: AnswerConfidence::Normal,
            })
            .collect();
        let resumed = h.orchestrator.answer("run-1", submissions).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Complete);
        assert!(resumed.report.is_some());
    }

    #[tokio::test]
    async fn test_per_round_cap_and_budget() {
        // Critic proposes 4 questions each round; caps are 5 total / 3 per round
        let critic = MockCritic::new(
            vec![
                Ok(question_assessment(4)),
                Ok(question_assessment(4)),
                Ok(question_assessment(4)),
            ],
            vec![],
        );
        let h = harness(MockGenerator::fixed(grounded_draft()), critic);

        let round1 = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(round1.questions.len(), 3);
        assert_eq!(round1.total_questions_asked, 3);

        let answers = |qs: &[Question]| {
            qs.iter()
                .map(|q| AnswerSubmission {
                    question_id: q.id.clone(),
                    answer: AnswerValue::Flag(true),
                    confidence: AnswerConfidence::Normal,
                })
                .collect::<Vec<_>>()
        };

        let round2 = h.orchestrator.answer("run-1", answers(&round1.questions)).await.unwrap();
        assert_eq!(round2.status, SessionStatus::AwaitingUser);
        // Only 2 of 4 kept: remaining budget
        assert_eq!(round2.questions.len(), 2);
        assert_eq!(round2.total_questions_asked, 5);

        let done = h.orchestrator.answer("run-1", answers(&round2.questions)).await.unwrap();
        // Budget exhausted: third proposal yields zero questions, finalizes
        assert_eq!(done.status, SessionStatus::Complete);
        assert_eq!(done.total_questions_asked, 5);
    }

    #[tokio::test]
    async fn test_idempotent_start_returns_existing() {
        let critic = MockCritic::new(vec![Ok(question_assessment(1))], vec![]);
        let h = harness(MockGenerator::fixed(grounded_draft()), critic);

        let first = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(first.status, SessionStatus::AwaitingUser);
        assert!(!first.already_in_progress);

        // Second start does not create a second session or re-run generation
        let second = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert!(second.already_in_progress);
        assert_eq!(second.status, SessionStatus::AwaitingUser);
        assert_eq!(second.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_restart_only_on_complete() {
        let critic = MockCritic::new(vec![Ok(question_assessment(1))], vec![]);
        let h = harness(MockGenerator::fixed(grounded_draft()), critic);

        let first = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(first.status, SessionStatus::AwaitingUser);

        // Restart on a live session is ignored; the session survives
        let attempted = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), true)
            .await
            .unwrap();
        assert_eq!(attempted.session_id, first.session_id);
        assert!(attempted.already_in_progress);
    }

    #[tokio::test]
    async fn test_restart_complete_creates_fresh_session() {
        let h = harness(MockGenerator::fixed(grounded_draft()), MockCritic::satisfied());

        let first = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(first.status, SessionStatus::Complete);

        let restarted = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), true)
            .await
            .unwrap();
        assert_ne!(restarted.session_id, first.session_id);
        assert_eq!(restarted.status, SessionStatus::Complete);
        assert_eq!(restarted.total_questions_asked, 0);
    }

    #[tokio::test]
    async fn test_collaborator_retries_once_then_succeeds() {
        let generator = MockGenerator::new(vec![
            Err(CollabError::Llm(LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            })),
            Ok(grounded_draft()),
        ]);
        let h = harness(generator, MockCritic::satisfied());

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::Complete);
    }

    #[tokio::test]
    async fn test_collaborator_fails_after_retry() {
        let err = || {
            Err(CollabError::Llm(LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            }))
        };
        let generator = MockGenerator::new(vec![err(), err()]);
        let h = harness(generator, MockCritic::satisfied());

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::Failed);
        assert!(outcome.error.unwrap().contains("draft generation"));
        // No partial output is exposed
        assert!(outcome.report.is_none());
        assert!(outcome.questions.is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let generator = MockGenerator::new(vec![
            Err(CollabError::Prompt("template broken".to_string())),
            Ok(grounded_draft()),
        ]);
        let h = harness(generator, MockCritic::satisfied());

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_hard_violation_regenerates_once_then_force_accepts() {
        // Draft cites an invented evidence ID; the final gate flags it
        let mut bad_draft = grounded_draft();
        bad_draft.evidence_ids_used.push("obj-invented".to_string());

        let generator = MockGenerator::new(vec![Ok(bad_draft.clone()), Ok(bad_draft)]);
        let critic = MockCritic::new(
            vec![Ok(Assessment::default())],
            vec![
                Ok(FinalReview {
                    ready: false,
                    edits: vec!["drop the invented citation".to_string()],
                    forbidden_matches: vec![],
                }),
                Ok(FinalReview {
                    ready: false,
                    edits: vec![],
                    forbidden_matches: vec![],
                }),
            ],
        );
        let h = harness(generator, critic);

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();

        // Force-accepted after the single loop-back; flagged, not failed
        assert_eq!(outcome.status, SessionStatus::Complete);
        let report = outcome.report.unwrap();
        assert!(report.forced);
        // The unknown citation is not silently stripped from the draft
        assert!(report.draft.evidence_ids_used.contains(&"obj-invented".to_string()));
        // But the manifest only vouches for known evidence
        assert!(report.evidence_manifest.iter().all(|e| e.id != "obj-invented"));
    }

    #[tokio::test]
    async fn test_soft_not_ready_accepts_without_loop() {
        let critic = MockCritic::new(
            vec![Ok(Assessment::default())],
            vec![Ok(FinalReview {
                ready: false,
                edits: vec!["could be tighter".to_string()],
                forbidden_matches: vec![],
            })],
        );
        let h = harness(MockGenerator::fixed(grounded_draft()), critic);

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::Complete);
        assert!(!outcome.report.unwrap().forced);
    }

    #[tokio::test]
    async fn test_answer_mismatch_rejected() {
        let critic = MockCritic::new(vec![Ok(question_assessment(2))], vec![]);
        let h = harness(MockGenerator::fixed(grounded_draft()), critic);

        let outcome = h
            .orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();
        assert_eq!(outcome.questions.len(), 2);

        // Partial submission: rejected, session still awaiting
        let partial = vec![AnswerSubmission {
            question_id: outcome.questions[0].id.clone(),
            answer: AnswerValue::Flag(true),
            confidence: AnswerConfidence::Normal,
        }];
        let result = h.orchestrator.answer("run-1", partial).await;
        assert!(matches!(result, Err(PipelineError::AnswerMismatch(_))));

        // Unknown question id: rejected
        let unknown = vec![
            AnswerSubmission {
                question_id: outcome.questions[0].id.clone(),
                answer: AnswerValue::Flag(true),
                confidence: AnswerConfidence::Normal,
            },
            AnswerSubmission {
                question_id: "question-made-up".to_string(),
                answer: AnswerValue::Flag(false),
                confidence: AnswerConfidence::Normal,
            },
        ];
        let result = h.orchestrator.answer("run-1", unknown).await;
        assert!(matches!(result, Err(PipelineError::AnswerMismatch(_))));

        let polled = h.orchestrator.poll("run-1").await.unwrap();
        assert_eq!(polled.status, SessionStatus::AwaitingUser);
        assert_eq!(polled.questions.len(), 2);
    }

    #[tokio::test]
    async fn test_answer_wrong_state_rejected() {
        let h = harness(MockGenerator::fixed(grounded_draft()), MockCritic::satisfied());

        h.orchestrator
            .start("run-1", diagnostic(), PlanningInputs::default(), false)
            .await
            .unwrap();

        let result = h.orchestrator.answer("run-1", vec![]).await;
        assert!(matches!(result, Err(PipelineError::NotAwaitingAnswers { .. })));
    }

    #[tokio::test]
    async fn test_poll_unknown_run() {
        let h = harness(MockGenerator::fixed(grounded_draft()), MockCritic::satisfied());
        let result = h.orchestrator.poll("run-missing").await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
