use thiserror::Error;

use crate::core_types::TradingDay;
use crate::lock::LockError;
use crate::sources::SourceError;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid history row: {0}")]
    InvalidRow(String),
}

/// Batch-level failures. Item-level failures never surface here.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{0} calculation process is already in progress")]
    AlreadyInProgress(String),

    #[error(
        "Calculation started for {requested}, but there already was calculation for a newer date {latest}"
    )]
    OrderingViolation {
        requested: TradingDay,
        latest: TradingDay,
    },

    #[error("Calculation history error: {0}")]
    History(#[from] HistoryError),

    #[error("Market data error: {0}")]
    Source(#[from] SourceError),

    #[error("Lock backend error: {0}")]
    Lock(String),
}

impl BatchError {
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::AlreadyInProgress(_) => "BATCH_ALREADY_RUNNING",
            BatchError::OrderingViolation { .. } => "ORDERING_VIOLATION",
            BatchError::History(_) => "HISTORY_STORE_ERROR",
            BatchError::Source(_) => "SOURCE_ERROR",
            BatchError::Lock(_) => "LOCK_BACKEND_ERROR",
        }
    }
}

impl From<LockError> for BatchError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::AlreadyHeld(key) => BatchError::AlreadyInProgress(key),
            LockError::Backend(e) => BatchError::Lock(e.to_string()),
        }
    }
}
