//! StateManager - actor that owns the session store
//!
//! All persistence flows through one actor task; commands arrive on a
//! channel and mutations are applied strictly in order. Together with the
//! store's unique `run_id` index this serializes session creation: two
//! concurrent starts for one run cannot both succeed.

use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::{Answer, Filter, IndexValue, InterpretationSession, Question, SessionStatus, Store};

use super::messages::{StateCommand, StateError, StateResponse};

/// Aggregated metrics across all sessions
#[derive(Debug, Default, serde::Serialize)]
pub struct PipelineMetrics {
    /// Total sessions in the store
    pub total_sessions: u64,
    /// Sessions awaiting first generation
    pub pending: u64,
    /// Sessions mid-generation or mid-critique
    pub in_flight: u64,
    /// Sessions suspended on user questions
    pub awaiting_user: u64,
    /// Completed sessions
    pub complete: u64,
    /// Failed sessions
    pub failed: u64,
    /// Questions asked across all sessions
    pub total_questions_asked: u64,
    /// Rounds run across all sessions
    pub total_rounds: u64,
}

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over a store directory
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        let mut store = Store::open(store_path.as_ref())?;

        let session_count = store.rebuild_indexes::<InterpretationSession>()?;
        let question_count = store.rebuild_indexes::<Question>()?;
        let answer_count = store.rebuild_indexes::<Answer>()?;
        info!(
            session_count,
            question_count, answer_count, "Rebuilt indexes for session, question, and answer records"
        );

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));

        debug!(store_path = %store_path.as_ref().display(), "StateManager spawned");
        Ok(Self { tx })
    }

    /// Create a new session record
    ///
    /// Fails with [`StateError::Conflict`] if the run already has one.
    pub async fn create_session(&self, session: InterpretationSession) -> StateResponse<String> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::CreateSession {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Get the session for a run, if any
    pub async fn get_session_by_run(&self, run_id: &str) -> StateResponse<Option<InterpretationSession>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::GetSessionByRun {
                run_id: run_id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Write back a mutated session
    pub async fn update_session(&self, session: InterpretationSession) -> StateResponse<()> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::UpdateSession {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Delete a session with its questions and answers
    pub async fn delete_session_cascade(&self, session_id: &str) -> StateResponse<()> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::DeleteSessionCascade {
                session_id: session_id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// List sessions, optionally by status
    pub async fn list_sessions(&self, status_filter: Option<String>) -> StateResponse<Vec<InterpretationSession>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ListSessions {
                status_filter,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Persist one round of questions
    pub async fn create_questions(&self, questions: Vec<Question>) -> StateResponse<()> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::CreateQuestions {
                questions,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Questions for a session, optionally one round, in asked order
    pub async fn list_questions(&self, session_id: &str, round: Option<u32>) -> StateResponse<Vec<Question>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ListQuestions {
                session_id: session_id.to_string(),
                round,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Append answers; an already-answered question is a conflict
    pub async fn create_answers(&self, answers: Vec<Answer>) -> StateResponse<()> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::CreateAnswers {
                answers,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// All answers for a session
    pub async fn list_answers(&self, session_id: &str) -> StateResponse<Vec<Answer>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ListAnswers {
                session_id: session_id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }

    /// Aggregate metrics from all sessions
    pub async fn get_metrics(&self) -> eyre::Result<PipelineMetrics> {
        let sessions = self.list_sessions(None).await?;

        let mut metrics = PipelineMetrics::default();
        for session in sessions {
            metrics.total_sessions += 1;
            match session.status {
                SessionStatus::Pending => metrics.pending += 1,
                SessionStatus::Generating | SessionStatus::Assessed | SessionStatus::Finalizing => {
                    metrics.in_flight += 1
                }
                SessionStatus::AwaitingUser => metrics.awaiting_user += 1,
                SessionStatus::Complete => metrics.complete += 1,
                SessionStatus::Failed => metrics.failed += 1,
            }
            metrics.total_questions_asked += session.total_questions_asked as u64;
            metrics.total_rounds += session.current_round as u64;
        }

        Ok(metrics)
    }
}

/// The actor loop that owns the Store and processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::CreateSession { session, reply } => {
                debug!(session_id = %session.id, run_id = %session.run_id, "CreateSession");
                let result = store.create(session).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::GetSessionByRun { run_id, reply } => {
                let filters = [Filter::eq("run_id", IndexValue::String(run_id))];
                let result = store
                    .list::<InterpretationSession>(&filters)
                    .map(|mut sessions| sessions.pop())
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::UpdateSession { session, reply } => {
                debug!(session_id = %session.id, status = %session.status, "UpdateSession");
                let result = store.update(session).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::DeleteSessionCascade { session_id, reply } => {
                debug!(%session_id, "DeleteSessionCascade");
                let result = delete_cascade(&mut store, &session_id);
                let _ = reply.send(result);
            }

            StateCommand::ListSessions { status_filter, reply } => {
                let mut filters = Vec::new();
                if let Some(status) = status_filter {
                    filters.push(Filter::eq("status", IndexValue::String(status)));
                }
                let result = store.list::<InterpretationSession>(&filters).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::CreateQuestions { questions, reply } => {
                debug!(count = questions.len(), "CreateQuestions");
                let mut result = Ok(());
                for question in questions {
                    if let Err(e) = store.create(question) {
                        result = Err(StateError::from(e));
                        break;
                    }
                }
                let _ = reply.send(result);
            }

            StateCommand::ListQuestions { session_id, round, reply } => {
                let mut filters = vec![Filter::eq("session_id", IndexValue::String(session_id))];
                if let Some(round) = round {
                    filters.push(Filter::eq("round", IndexValue::Int(round as i64)));
                }
                let result = store
                    .list::<Question>(&filters)
                    .map(|mut questions| {
                        questions.sort_by(|a, b| {
                            a.round
                                .cmp(&b.round)
                                .then_with(|| a.created_at.cmp(&b.created_at))
                                .then_with(|| a.id.cmp(&b.id))
                        });
                        questions
                    })
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::CreateAnswers { answers, reply } => {
                debug!(count = answers.len(), "CreateAnswers");
                let mut result = Ok(());
                for answer in answers {
                    if let Err(e) = store.create(answer) {
                        result = Err(StateError::from(e));
                        break;
                    }
                }
                let _ = reply.send(result);
            }

            StateCommand::ListAnswers { session_id, reply } => {
                let filters = [Filter::eq("session_id", IndexValue::String(session_id))];
                let result = store.list::<Answer>(&filters).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

/// Delete a session plus everything keyed to it
fn delete_cascade(store: &mut Store, session_id: &str) -> StateResponse<()> {
    let filters = [Filter::eq("session_id", IndexValue::String(session_id.to_string()))];

    let questions = store.list::<Question>(&filters)?;
    for question in &questions {
        store.delete::<Question>(&question.id)?;
    }

    let answers = store.list::<Answer>(&filters)?;
    for answer in &answers {
        store.delete::<Answer>(&answer.question_id)?;
    }

    store.delete::<InterpretationSession>(session_id)?;
    debug!(
        %session_id,
        questions = questions.len(),
        answers = answers.len(),
        "Session cascade-deleted"
    );
    Ok(())
}
