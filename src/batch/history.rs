//! Calculation history seam

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::HistoryError;
use super::types::{CalculationResult, OperationCounts};
use crate::core_types::TradingDay;

/// Persisted results of one batch flavor
#[async_trait]
pub trait CalculationHistory: Send + Sync {
    /// Every result whose trading day is `trading_day` or later
    async fn get_since(
        &self,
        trading_day: TradingDay,
    ) -> Result<Vec<CalculationResult>, HistoryError>;

    /// Insert all results in one write. Existing identities are kept.
    async fn bulk_insert(&self, results: &[CalculationResult]) -> Result<(), HistoryError>;

    /// The result row with identity `id`
    async fn get_result(&self, id: &str) -> Result<Option<CalculationResult>, HistoryError>;

    /// Returns the number of affected rows
    async fn set_was_charged(&self, id: &str, was_charged: bool) -> Result<u64, HistoryError>;

    async fn get_operation_state(&self, operation_id: &str)
    -> Result<OperationCounts, HistoryError>;
}

#[derive(Default)]
pub struct InMemoryCalculationHistory {
    rows: DashMap<String, CalculationResult>,
}

impl InMemoryCalculationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<CalculationResult> {
        self.rows.get(id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl CalculationHistory for InMemoryCalculationHistory {
    async fn get_since(
        &self,
        trading_day: TradingDay,
    ) -> Result<Vec<CalculationResult>, HistoryError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.trading_day >= trading_day)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn bulk_insert(&self, results: &[CalculationResult]) -> Result<(), HistoryError> {
        for result in results {
            self.rows.entry(result.id()).or_insert_with(|| result.clone());
        }
        Ok(())
    }

    async fn get_result(&self, id: &str) -> Result<Option<CalculationResult>, HistoryError> {
        Ok(self.get(id))
    }

    async fn set_was_charged(&self, id: &str, was_charged: bool) -> Result<u64, HistoryError> {
        match self.rows.get_mut(id) {
            Some(mut row) => {
                row.was_charged = Some(was_charged);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn get_operation_state(
        &self,
        operation_id: &str,
    ) -> Result<OperationCounts, HistoryError> {
        let mut counts = OperationCounts::default();
        for row in self.rows.iter().filter(|r| r.operation_id == operation_id) {
            counts.total += 1;
            if !row.is_success {
                counts.failed += 1;
            } else if row.was_charged.is_none() {
                counts.not_processed += 1;
            }
        }
        Ok(counts)
    }
}
