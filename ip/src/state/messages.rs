//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Answer, InterpretationSession, Question};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write; for sessions this is the
    /// single-flight guarantee on `run_id`
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<sessionstore::StoreError> for StateError {
    fn from(e: sessionstore::StoreError) -> Self {
        use sessionstore::StoreError;
        match e {
            StoreError::Conflict { .. } | StoreError::DuplicateId(_) => StateError::Conflict(e.to_string()),
            StoreError::NotFound(id) => StateError::NotFound(id),
            other => StateError::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Session operations
    CreateSession {
        session: InterpretationSession,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetSessionByRun {
        run_id: String,
        reply: oneshot::Sender<StateResponse<Option<InterpretationSession>>>,
    },
    UpdateSession {
        session: InterpretationSession,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    /// Delete a session and its questions and answers
    DeleteSessionCascade {
        session_id: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListSessions {
        status_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<InterpretationSession>>>,
    },

    // Question operations
    CreateQuestions {
        questions: Vec<Question>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListQuestions {
        session_id: String,
        round: Option<u32>,
        reply: oneshot::Sender<StateResponse<Vec<Question>>>,
    },

    // Answer operations
    CreateAnswers {
        answers: Vec<Answer>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListAnswers {
        session_id: String,
        reply: oneshot::Sender<StateResponse<Vec<Answer>>>,
    },

    // Shutdown
    Shutdown,
}
