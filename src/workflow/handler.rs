//! Batch Command Handler
//!
//! ```text
//! ledger get-or-create (Initiated)
//!   └─ CAS Initiated → Started ── lost ──▶ Duplicate
//!        └─ run batch ── error ──▶ "start failed", Started → Failed
//!             └─ "calculated" ─▶ save ─▶ track items ─▶ sub-operations ─▶ "ready for charging" × N
//! ```

use std::sync::Arc;

use chrono::Utc;

use super::commands::{CommandOutcome, StartBatchCommand};
use super::error::WorkflowError;
use super::tracker::CompletionTracker;
use crate::batch::{BatchEngine, BatchFlavor, BatchKind, OperationCounts};
use crate::events::{EventPublisher, ServiceEvent};
use crate::ledger::{BatchOperationData, ExecutionLedger, OperationState};

pub struct BatchCommandHandler<F: BatchFlavor> {
    engine: BatchEngine<F>,
    ledger: ExecutionLedger,
    publisher: Arc<dyn EventPublisher>,
    tracker: CompletionTracker,
}

impl<F: BatchFlavor> BatchCommandHandler<F> {
    pub fn new(
        engine: BatchEngine<F>,
        ledger: ExecutionLedger,
        publisher: Arc<dyn EventPublisher>,
        tracker: CompletionTracker,
    ) -> Self {
        Self {
            engine,
            ledger,
            publisher,
            tracker,
        }
    }

    pub fn kind(&self) -> BatchKind {
        self.engine.kind()
    }

    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    /// Handle a start command exactly once per operation id
    pub async fn handle<C>(&self, command: &C) -> Result<CommandOutcome, WorkflowError>
    where
        C: StartBatchCommand<Parameters = F::Parameters>,
    {
        let kind = self.kind();
        let name = kind.operation_name();
        let operation_id = command.operation_id();
        let trading_day = command.trading_day();

        let mut info = self
            .ledger
            .get_or_create(name, operation_id, || {
                BatchOperationData::initiated(trading_day, command.parameters())
            })
            .await?;

        if !self
            .ledger
            .try_transition(&mut info, OperationState::Initiated, OperationState::Started)
            .await?
        {
            return Ok(CommandOutcome::Duplicate);
        }

        // Parameters from the ledger win over a redelivered command's
        let parameters = match info.data.parameters.clone() {
            Some(parameters) => parameters,
            None => command.parameters(),
        };

        let outcome = match self
            .engine
            .run_batch(operation_id, info.data.trading_day, &parameters)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(
                    kind = %kind,
                    operation_id,
                    code = e.code(),
                    error = %reason,
                    "Batch failed to start"
                );
                if let Err(publish_error) = self
                    .publisher
                    .publish(ServiceEvent::BatchStartFailed {
                        kind,
                        operation_id: operation_id.to_string(),
                        timestamp: Utc::now(),
                        reason: reason.clone(),
                    })
                    .await
                {
                    tracing::error!(operation_id, error = %publish_error, "Failed to publish start failure");
                }
                self.ledger
                    .try_transition(&mut info, OperationState::Started, OperationState::Failed)
                    .await?;
                return Ok(CommandOutcome::StartFailed { reason });
            }
        };

        let total = outcome.total();
        let failed = outcome.failed();
        self.publisher
            .publish(ServiceEvent::BatchCalculated {
                kind,
                operation_id: operation_id.to_string(),
                timestamp: Utc::now(),
                total,
                failed,
            })
            .await?;

        // Saved before tracking starts: completion moves the stored state on
        self.ledger.save(&info).await?;

        let successful: Vec<_> = outcome.successful().collect();
        self.tracker.track(
            operation_id,
            successful.iter().map(|r| r.id()).collect(),
            command.tracking_timeout(),
        );

        for result in &successful {
            self.ledger
                .get_or_create(name, &result.id(), || {
                    BatchOperationData::<F::Parameters>::sub_operation(result.trading_day)
                })
                .await?;
        }

        for result in successful {
            self.publisher
                .publish(ServiceEvent::ItemReadyForCharging {
                    kind,
                    request: result.to_charge_request(),
                })
                .await?;
        }

        tracing::info!(
            kind = %kind,
            operation_id,
            total,
            failed,
            "Batch operation executed"
        );
        Ok(CommandOutcome::Executed { total, failed })
    }

    /// Counts for a parent operation id or any of its item ids.
    ///
    /// An id with no rows of its own is looked up as an item, and the
    /// counts are taken for the operation stored on that row. Ids are never
    /// split, since both halves may contain the separator.
    pub async fn get_operation_state(&self, id: &str) -> Result<OperationCounts, WorkflowError> {
        let history = self.engine.history();
        let counts = history.get_operation_state(id).await?;
        if counts.total > 0 {
            return Ok(counts);
        }
        match history.get_result(id).await? {
            Some(item) => Ok(history.get_operation_state(&item.operation_id).await?),
            None => Ok(counts),
        }
    }

    /// Number of result rows updated
    pub async fn set_was_charged(&self, item_id: &str, was_charged: bool) -> Result<u64, WorkflowError> {
        Ok(self
            .engine
            .history()
            .set_was_charged(item_id, was_charged)
            .await?)
    }
}
