//! Ledger record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::error::LedgerError;
use super::state::OperationState;
use crate::core_types::TradingDay;

/// Operation-specific payload stored in the ledger.
///
/// The payload owns the state so it round-trips with the rest of the data.
pub trait OperationData: Serialize + DeserializeOwned + Send + Sync {
    fn state(&self) -> OperationState;
    fn set_state(&mut self, state: OperationState);
}

/// Typed ledger record, identity = (operation_name, id)
#[derive(Debug, Clone, PartialEq)]
pub struct OperationExecutionInfo<T> {
    pub operation_name: String,
    pub id: String,
    pub last_modified: DateTime<Utc>,
    pub data: T,
}

impl<T: OperationData> OperationExecutionInfo<T> {
    pub fn new(operation_name: &str, id: &str, data: T) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            id: id.to_string(),
            last_modified: Utc::now(),
            data,
        }
    }

    pub fn state(&self) -> OperationState {
        self.data.state()
    }

    /// Guarded in-place transition.
    ///
    /// Mutates only when the current state equals `from` and `from → to` moves
    /// forward. Returns false otherwise, leaving the record untouched.
    pub fn switch_state(&mut self, from: OperationState, to: OperationState) -> bool {
        if self.data.state() != from || !from.can_transition_to(to) {
            return false;
        }
        self.data.set_state(to);
        self.last_modified = Utc::now();
        true
    }

    pub(crate) fn to_row(&self) -> Result<LedgerRow, LedgerError> {
        Ok(LedgerRow {
            operation_name: self.operation_name.clone(),
            operation_id: self.id.clone(),
            state: self.data.state(),
            data: serde_json::to_string(&self.data)?,
            last_modified: self.last_modified,
        })
    }

    pub(crate) fn from_row(row: LedgerRow) -> Result<Self, LedgerError> {
        let mut data: T = serde_json::from_str(&row.data)?;
        // The column is authoritative: guarded updates may touch it alone
        data.set_state(row.state);
        Ok(Self {
            operation_name: row.operation_name,
            id: row.operation_id,
            last_modified: row.last_modified,
            data,
        })
    }
}

/// Untyped row as persisted by a [`super::store::LedgerStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub operation_name: String,
    pub operation_id: String,
    pub state: OperationState,
    /// JSON-encoded payload
    pub data: String,
    pub last_modified: DateTime<Utc>,
}

/// Payload of a batch operation and of its per-item sub-operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperationData<P> {
    pub trading_day: TradingDay,
    /// `None` for sub-operations
    pub parameters: Option<P>,
    pub state: OperationState,
}

impl<P> BatchOperationData<P> {
    pub fn initiated(trading_day: TradingDay, parameters: P) -> Self {
        Self {
            trading_day,
            parameters: Some(parameters),
            state: OperationState::Initiated,
        }
    }

    pub fn sub_operation(trading_day: TradingDay) -> Self {
        Self {
            trading_day,
            parameters: None,
            state: OperationState::Started,
        }
    }
}

impl<P> OperationData for BatchOperationData<P>
where
    P: Serialize + DeserializeOwned + Send + Sync,
{
    fn state(&self) -> OperationState {
        self.state
    }

    fn set_state(&mut self, state: OperationState) {
        self.state = state;
    }
}
