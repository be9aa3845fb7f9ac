use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state ID in ledger row: {0}")]
    InvalidState(i16),

    #[error("Operation not found: {0}")]
    NotFound(String),
}
