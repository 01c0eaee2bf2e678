//! Error types.

use thiserror::Error;

use crate::cp::SolverStatus;
use crate::validation::ValidationError;

/// Errors returned by a timetabling run.
#[derive(Error, Debug)]
pub enum TimetableError {
    /// Malformed input, detected before any model is built.
    #[error("invalid instance: {}", summarize(.0))]
    Validation(Vec<ValidationError>),

    /// The solver proved there is no solution, or rejected the model.
    #[error("no timetable exists (solver status: {status:?})")]
    Infeasible { status: SolverStatus },

    /// The time limit ran out, or the run was aborted, before any solution
    /// was found. Retry with a larger budget.
    #[error("solver budget exhausted without a solution: elapsed_ms={elapsed_ms}")]
    BudgetExhausted { elapsed_ms: i64 },

    /// Another run holds the engine.
    #[error("a scheduling run is already in progress")]
    EngineBusy,

    #[error("model snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// Instance source or schedule store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl TimetableError {
    /// Whether repeating the run with a larger budget may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TimetableError::BudgetExhausted { .. } | TimetableError::EngineBusy)
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Result alias for timetabling operations.
pub type Result<T> = std::result::Result<T, TimetableError>;
