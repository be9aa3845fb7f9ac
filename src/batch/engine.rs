//! Fault-isolated batch calculation
//!
//! ```text
//! lock ─▶ active positions ─▶ prior results (≥ day) ─▶ ordering check
//!      ─▶ eligible set ─▶ per item: Ok(result) | Err → failed result
//!      ─▶ bulk insert ─▶ unlock
//! ```

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt, stream};
use serde::{Serialize, de::DeserializeOwned};

use super::error::BatchError;
use super::history::CalculationHistory;
use super::types::{BatchKind, BatchOutcome, CalculationResult, ItemCalculation};
use crate::core_types::{PositionId, TradingDay};
use crate::lock::{DistributedLock, run_exclusive};
use crate::pricing::CalculationError;
use crate::sources::{OpenPosition, PositionSource};

/// What varies between batch flavors: parameters, per-run context, and the
/// pricing of one position.
#[async_trait]
pub trait BatchFlavor: Send + Sync {
    type Parameters: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    type Context: Send + Sync;

    fn kind(&self) -> BatchKind;

    /// Load everything shared by all items of one run
    async fn prepare(&self, parameters: &Self::Parameters) -> Result<Self::Context, BatchError>;

    async fn calculate(
        &self,
        context: &Self::Context,
        position: &OpenPosition,
        parameters: &Self::Parameters,
    ) -> Result<ItemCalculation, CalculationError>;
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub holder_id: String,
    pub lock_ttl: Duration,
    /// Items priced concurrently, 1 = sequential
    pub max_concurrency: usize,
}

/// Positions selected for one run
#[derive(Debug, Default)]
pub struct Selection {
    pub eligible: Vec<OpenPosition>,
    pub unrecoverable: Vec<PositionId>,
}

/// Eligible = active, not successfully calculated since `trading_day`, and
/// opened on or before it. Prior failures whose position is gone can never be
/// recalculated and are reported separately.
pub fn select_positions(
    active: Vec<OpenPosition>,
    prior: &[CalculationResult],
    trading_day: TradingDay,
) -> Selection {
    let calculated: HashSet<&str> = prior
        .iter()
        .filter(|r| r.is_success)
        .map(|r| r.position_id.as_str())
        .collect();
    let active_ids: HashSet<&str> = active.iter().map(|p| p.id.as_str()).collect();

    let mut unrecoverable: Vec<PositionId> = prior
        .iter()
        .filter(|r| !r.is_success && !active_ids.contains(r.position_id.as_str()))
        .map(|r| r.position_id.clone())
        .collect();
    unrecoverable.sort();
    unrecoverable.dedup();

    let eligible = active
        .iter()
        .filter(|p| {
            !calculated.contains(p.id.as_str()) && p.open_timestamp.date_naive() <= trading_day
        })
        .cloned()
        .collect();

    Selection {
        eligible,
        unrecoverable,
    }
}

pub struct BatchEngine<F: BatchFlavor> {
    flavor: F,
    positions: Arc<dyn PositionSource>,
    history: Arc<dyn CalculationHistory>,
    lock: Arc<dyn DistributedLock>,
    config: EngineConfig,
}

impl<F: BatchFlavor> BatchEngine<F> {
    pub fn new(
        flavor: F,
        positions: Arc<dyn PositionSource>,
        history: Arc<dyn CalculationHistory>,
        lock: Arc<dyn DistributedLock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            flavor,
            positions,
            history,
            lock,
            config,
        }
    }

    pub fn kind(&self) -> BatchKind {
        self.flavor.kind()
    }

    pub fn history(&self) -> &Arc<dyn CalculationHistory> {
        &self.history
    }

    /// Run one batch under the flavor's cluster-wide lock.
    ///
    /// Fails with [`BatchError::AlreadyInProgress`] when another run holds the
    /// lock. Item failures are recorded in the returned results.
    pub async fn run_batch(
        &self,
        operation_id: &str,
        trading_day: TradingDay,
        parameters: &F::Parameters,
    ) -> Result<BatchOutcome, BatchError> {
        let kind = self.flavor.kind();
        let outcome = run_exclusive(
            self.lock.as_ref(),
            kind.lock_key(),
            &self.config.holder_id,
            self.config.lock_ttl,
            self.run_locked(operation_id, trading_day, parameters),
        )
        .await??;

        Ok(outcome)
    }

    async fn run_locked(
        &self,
        operation_id: &str,
        trading_day: TradingDay,
        parameters: &F::Parameters,
    ) -> Result<BatchOutcome, BatchError> {
        let kind = self.flavor.kind();
        let active = self.positions.get_active().await?;
        let prior = self.history.get_since(trading_day).await?;

        if let Some(latest) = prior.iter().map(|r| r.trading_day).max()
            && latest > trading_day
        {
            return Err(BatchError::OrderingViolation {
                requested: trading_day,
                latest,
            });
        }

        let selection = select_positions(active, &prior, trading_day);
        if !selection.unrecoverable.is_empty() {
            tracing::error!(
                kind = %kind,
                operation_id,
                positions = ?selection.unrecoverable,
                "Calculation failed for some positions and they were closed before recalculation"
            );
        }

        tracing::info!(
            kind = %kind,
            operation_id,
            %trading_day,
            positions = selection.eligible.len(),
            "Batch calculation started"
        );

        let context = self.flavor.prepare(parameters).await?;

        let results: Vec<CalculationResult> = stream::iter(selection.eligible.iter())
            .map(|position| {
                self.calculate_item(&context, position, operation_id, trading_day, parameters)
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        if !results.is_empty() {
            self.history.bulk_insert(&results).await?;
        }

        let outcome = BatchOutcome {
            results,
            unrecoverable_positions: selection.unrecoverable,
        };
        tracing::info!(
            kind = %kind,
            operation_id,
            successful = outcome.total() - outcome.failed(),
            failed = outcome.failed(),
            "Batch calculation finished"
        );
        Ok(outcome)
    }

    /// Never fails: errors and panics become a failed result
    async fn calculate_item(
        &self,
        context: &F::Context,
        position: &OpenPosition,
        operation_id: &str,
        trading_day: TradingDay,
        parameters: &F::Parameters,
    ) -> CalculationResult {
        let attempt = AssertUnwindSafe(self.flavor.calculate(context, position, parameters))
            .catch_unwind()
            .await;

        let error = match attempt {
            Ok(Ok(calculation)) => {
                return CalculationResult::success(operation_id, trading_day, position, calculation);
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        tracing::error!(
            kind = %self.flavor.kind(),
            operation_id,
            position_id = %position.id,
            account_id = %position.account_id,
            instrument = %position.asset_pair_id,
            error = %error,
            "Error calculating position"
        );
        CalculationResult::failed(operation_id, trading_day, position, error)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
