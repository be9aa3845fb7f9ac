use thiserror::Error;

use crate::rates::RateSettingsError;
use crate::sources::SourceError;

/// Item-level failure. Recorded on the item's result, never aborts a batch.
#[derive(Error, Debug)]
pub enum CalculationError {
    #[error("No fx rate to convert {from} into {to}")]
    FxRateNotFound { from: String, to: String },

    #[error("Asset pair {0} not found")]
    AssetPairNotFound(String),

    #[error("Invalid calculation parameters: {0}")]
    InvalidParameters(String),

    #[error("Rate settings unavailable: {0}")]
    Rates(#[from] RateSettingsError),

    #[error("Market data unavailable: {0}")]
    Source(#[from] SourceError),
}
