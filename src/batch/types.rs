use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{OperationId, PositionId, TradingDay, compose_id};
use crate::events::ChargeRequest;
use crate::sources::{OpenPosition, PositionDirection};

/// The two batch flavors sharing one control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchKind {
    OvernightSwap,
    DailyPnl,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::OvernightSwap => "OvernightSwap",
            BatchKind::DailyPnl => "DailyPnl",
        }
    }

    /// Ledger operation name of the batch and of its per-item sub-operations
    pub fn operation_name(&self) -> &'static str {
        match self {
            BatchKind::OvernightSwap => "OvernightSwapCommission",
            BatchKind::DailyPnl => "DailyPnlCommission",
        }
    }

    /// Cluster-wide lock guarding a run of this flavor
    pub fn lock_key(&self) -> &'static str {
        match self {
            BatchKind::OvernightSwap => "CommissionService:OvernightSwapProcess",
            BatchKind::DailyPnl => "CommissionService:DailyPnlProcess",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flavor output for one successfully priced position
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCalculation {
    pub amount: Decimal,
    pub fx_rate: Decimal,
    pub details: Option<String>,
}

/// One row per item per batch run, identity `operation_id + "_" + position_id`.
///
/// Immutable after insert except for `was_charged`, set by the charging step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub operation_id: OperationId,
    pub position_id: PositionId,
    pub account_id: String,
    pub instrument: String,
    pub direction: PositionDirection,
    pub volume: Decimal,
    pub amount: Decimal,
    pub fx_rate: Decimal,
    pub details: Option<String>,
    pub trading_day: TradingDay,
    pub time: DateTime<Utc>,
    pub is_success: bool,
    pub error: Option<String>,
    pub was_charged: Option<bool>,
}

impl CalculationResult {
    pub fn id(&self) -> String {
        compose_id(&self.operation_id, &self.position_id)
    }

    pub fn success(
        operation_id: &str,
        trading_day: TradingDay,
        position: &OpenPosition,
        calculation: ItemCalculation,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            position_id: position.id.clone(),
            account_id: position.account_id.clone(),
            instrument: position.asset_pair_id.clone(),
            direction: position.direction,
            volume: position.current_volume,
            amount: calculation.amount,
            fx_rate: calculation.fx_rate,
            details: calculation.details,
            trading_day,
            time: Utc::now(),
            is_success: true,
            error: None,
            was_charged: None,
        }
    }

    pub fn failed(
        operation_id: &str,
        trading_day: TradingDay,
        position: &OpenPosition,
        error: String,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            position_id: position.id.clone(),
            account_id: position.account_id.clone(),
            instrument: position.asset_pair_id.clone(),
            direction: position.direction,
            volume: position.current_volume,
            amount: Decimal::ZERO,
            fx_rate: Decimal::ZERO,
            details: None,
            trading_day,
            time: Utc::now(),
            is_success: false,
            error: Some(error),
            was_charged: None,
        }
    }

    pub fn to_charge_request(&self) -> ChargeRequest {
        ChargeRequest {
            item_operation_id: self.id(),
            account_id: self.account_id.clone(),
            position_id: self.position_id.clone(),
            instrument: self.instrument.clone(),
            amount: self.amount,
            trading_day: self.trading_day,
            volume: self.volume,
            fx_rate: self.fx_rate,
            details: self.details.clone(),
        }
    }
}

/// Aggregate over one operation's persisted results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounts {
    pub total: u64,
    pub failed: u64,
    /// Successful results the charging step has not acknowledged yet
    pub not_processed: u64,
}

/// What a batch run produced
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<CalculationResult>,
    /// Positions whose earlier calculation failed and which closed before a
    /// recalculation. Reported only.
    pub unrecoverable_positions: Vec<PositionId>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success).count()
    }

    pub fn successful(&self) -> impl Iterator<Item = &CalculationResult> {
        self.results.iter().filter(|r| r.is_success)
    }
}
