//! Commission Service - overnight swap and daily PnL batch calculation
//!
//! # Modules
//!
//! - [`core_types`] - Ids, trading day, composite id helpers
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL schema and Redis connection
//! - [`ledger`] - Idempotency ledger (operation execution state)
//! - [`lock`] - Distributed lock with guaranteed release
//! - [`events`] - Outbound notifications
//! - [`rates`] - Rate settings with fast cache, durable store and defaults
//! - [`sources`] - Positions, asset pairs, interest rates and quotes
//! - [`pricing`] - Swap, order execution, on-behalf and daily PnL formulas
//! - [`batch`] - Fault-isolated batch calculation engine
//! - [`workflow`] - Command handlers, completion tracking, acknowledgements

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod logging;

pub mod events;
pub mod ledger;
pub mod lock;

pub mod batch;
pub mod pricing;
pub mod rates;
pub mod sources;

pub mod workflow;

// Convenient re-exports at crate root
pub use batch::{BatchKind, CalculationResult, OperationCounts};
pub use config::AppConfig;
pub use core_types::{OperationId, PositionId, TradingDay};
pub use events::{ChargeRequest, ServiceEvent};
pub use ledger::{ExecutionLedger, OperationState};
pub use workflow::{
    Backends, CommandOutcome, CommissionService, StartDailyPnlCommand, StartOvernightSwapCommand,
};
