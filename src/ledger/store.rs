//! Ledger storage seam

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::LedgerError;
use super::state::OperationState;
use super::types::LedgerRow;

/// Durable record of operation execution.
///
/// Implementations must make `insert_if_absent` and `update_state_if` atomic
/// with respect to concurrent callers on the same identity.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert `row` unless a row with the same identity exists.
    /// Returns the stored row and whether it was newly inserted.
    async fn insert_if_absent(&self, row: LedgerRow) -> Result<(LedgerRow, bool), LedgerError>;

    async fn get(
        &self,
        operation_name: &str,
        operation_id: &str,
    ) -> Result<Option<LedgerRow>, LedgerError>;

    /// CAS: persist `row` only while the stored state equals `expected`
    async fn update_state_if(
        &self,
        row: &LedgerRow,
        expected: OperationState,
    ) -> Result<bool, LedgerError>;

    /// Unconditional overwrite
    async fn save(&self, row: &LedgerRow) -> Result<(), LedgerError>;
}

/// In-process ledger store
#[derive(Default)]
pub struct InMemoryLedgerStore {
    rows: DashMap<(String, String), LedgerRow>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(operation_name: &str, operation_id: &str) -> (String, String) {
        (operation_name.to_string(), operation_id.to_string())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_if_absent(&self, row: LedgerRow) -> Result<(LedgerRow, bool), LedgerError> {
        match self
            .rows
            .entry(Self::key(&row.operation_name, &row.operation_id))
        {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                Ok((row, true))
            }
        }
    }

    async fn get(
        &self,
        operation_name: &str,
        operation_id: &str,
    ) -> Result<Option<LedgerRow>, LedgerError> {
        Ok(self
            .rows
            .get(&Self::key(operation_name, operation_id))
            .map(|r| r.clone()))
    }

    async fn update_state_if(
        &self,
        row: &LedgerRow,
        expected: OperationState,
    ) -> Result<bool, LedgerError> {
        match self
            .rows
            .get_mut(&Self::key(&row.operation_name, &row.operation_id))
        {
            Some(mut stored) if stored.state == expected => {
                *stored = LedgerRow {
                    last_modified: Utc::now(),
                    ..row.clone()
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save(&self, row: &LedgerRow) -> Result<(), LedgerError> {
        self.rows.insert(
            Self::key(&row.operation_name, &row.operation_id),
            row.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, state: OperationState) -> LedgerRow {
        LedgerRow {
            operation_name: "Op".to_string(),
            operation_id: id.to_string(),
            state,
            data: "{}".to_string(),
            last_modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_row() {
        let store = InMemoryLedgerStore::new();

        let (_, inserted) = store
            .insert_if_absent(row("a", OperationState::Initiated))
            .await
            .unwrap();
        assert!(inserted);

        let (stored, inserted) = store
            .insert_if_absent(row("a", OperationState::Started))
            .await
            .unwrap();
        assert!(!inserted);
        assert_eq!(stored.state, OperationState::Initiated);
    }

    #[tokio::test]
    async fn test_update_state_if_cas() {
        let store = InMemoryLedgerStore::new();
        store
            .insert_if_absent(row("a", OperationState::Initiated))
            .await
            .unwrap();

        let next = row("a", OperationState::Started);
        assert!(
            store
                .update_state_if(&next, OperationState::Initiated)
                .await
                .unwrap()
        );
        // Second CAS from the same expected state loses
        assert!(
            !store
                .update_state_if(&next, OperationState::Initiated)
                .await
                .unwrap()
        );

        let stored = store.get("Op", "a").await.unwrap().unwrap();
        assert_eq!(stored.state, OperationState::Started);
    }

    #[tokio::test]
    async fn test_update_missing_row_fails() {
        let store = InMemoryLedgerStore::new();
        let updated = store
            .update_state_if(&row("x", OperationState::Started), OperationState::Initiated)
            .await
            .unwrap();
        assert!(!updated);
        assert!(store.get("Op", "x").await.unwrap().is_none());
    }
}
