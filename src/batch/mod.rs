//! Batch Calculation Engine
//!
//! One control flow, two flavors (overnight swap, daily PnL). A run holds the
//! flavor's cluster-wide lock, refuses trading days older than one already
//! calculated, prices each eligible position independently and persists every
//! result, failed ones included, in one write.

pub mod daily_pnl;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod swap;
pub mod types;

pub use daily_pnl::{DailyPnlFlavor, DailyPnlParameters};
pub use db::PgCalculationHistory;
pub use engine::{BatchEngine, BatchFlavor, EngineConfig, Selection, select_positions};
pub use error::{BatchError, HistoryError};
pub use history::{CalculationHistory, InMemoryCalculationHistory};
pub use swap::{OvernightSwapFlavor, SwapContext, SwapParameters};
pub use types::{
    BatchKind, BatchOutcome, CalculationResult, ItemCalculation, OperationCounts,
};
