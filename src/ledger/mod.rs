//! Idempotency Ledger
//!
//! Keyed store of operation execution state. A duplicate trigger (command
//! redelivery, operator retry) finds the existing record and fails the guarded
//! `Initiated → Started` transition, which callers treat as a no-op success.
//!
//! # Guarantees
//!
//! 1. **Single record**: `get_or_create` never overwrites; concurrent callers
//!    with the same `(operation_name, operation_id)` observe one stored record
//! 2. **Guarded transitions**: a transition from an unexpected state returns
//!    false and leaves the record untouched
//! 3. **Audit trail**: records are never deleted. Sub-operations are keyed
//!    `parent_id + "_" + child_id`

pub mod db;
pub mod error;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

pub use db::PgLedgerStore;
pub use error::LedgerError;
pub use service::ExecutionLedger;
pub use state::OperationState;
pub use store::{InMemoryLedgerStore, LedgerStore};
pub use types::{BatchOperationData, LedgerRow, OperationData, OperationExecutionInfo};
