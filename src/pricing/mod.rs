//! Pricing functions with a fixed input/output contract

pub mod calculator;
pub mod error;
pub mod formulas;

pub use calculator::CommissionCalculator;
pub use error::CalculationError;
pub use formulas::{
    DEFAULT_FINANCING_DAYS_PER_YEAR, SwapDetails, daily_pnl, on_behalf_commission,
    order_execution_commission, overnight_swap,
};
