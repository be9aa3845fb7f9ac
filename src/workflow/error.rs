use thiserror::Error;

use crate::batch::HistoryError;
use crate::events::EventError;
use crate::ledger::LedgerError;

/// Failures of the command and acknowledgement paths.
///
/// Batch-level failures are not here: they end as
/// [`super::CommandOutcome::StartFailed`].
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Event publish failed: {0}")]
    Publish(#[from] EventError),

    #[error("Calculation history error: {0}")]
    History(#[from] HistoryError),
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Ledger(_) => "LEDGER_ERROR",
            WorkflowError::Publish(_) => "PUBLISH_FAILED",
            WorkflowError::History(_) => "HISTORY_STORE_ERROR",
        }
    }
}
