//! Completion Tracker
//!
//! Waits for one charge acknowledgement per successful item of a batch run.
//!
//! ```text
//! track(parent, items) ──▶ latch(items) ──┬── all acknowledged ──▶ parent Started → Finished
//!                                         └── timeout          ──▶ warn, parent stays Started
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Notify, watch};

use super::error::WorkflowError;
use super::listeners::ChargeListener;
use crate::batch::BatchKind;
use crate::ledger::{BatchOperationData, ExecutionLedger, OperationState};

/// Ledger payload as seen by the tracker, whatever the flavor's parameters
type AnyBatchData = BatchOperationData<serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingOutcome {
    Completed,
    TimedOut { abandoned: Vec<String> },
}

/// Count-down latch over item ids
struct Latch {
    pending: Mutex<HashSet<String>>,
    notify: Notify,
}

impl Latch {
    fn new(items: impl IntoIterator<Item = String>) -> Self {
        Self {
            pending: Mutex::new(items.into_iter().collect()),
            notify: Notify::new(),
        }
    }

    /// Returns true when this call removed the last pending item
    fn count_down(&self, item_id: &str) -> bool {
        let done = match self.pending.lock() {
            Ok(mut pending) => pending.remove(item_id) && pending.is_empty(),
            Err(_) => false,
        };
        if done {
            // Stores a permit when the waiter is not parked yet
            self.notify.notify_one();
        }
        done
    }

    fn remaining(&self) -> Vec<String> {
        let mut items: Vec<String> = match self.pending.lock() {
            Ok(pending) => pending.iter().cloned().collect(),
            Err(_) => Vec::new(),
        };
        items.sort();
        items
    }

    async fn wait(&self) {
        if self.remaining().is_empty() {
            return;
        }
        self.notify.notified().await;
    }
}

/// One in-flight operation
struct Tracking {
    latch: Latch,
    outcome: watch::Sender<Option<TrackingOutcome>>,
}

/// Tracks acknowledgements for every in-flight operation of one batch kind.
///
/// Item ids are mapped to their parent when tracking starts, so neither id
/// is ever parsed back out of a composite id.
#[derive(Clone)]
pub struct CompletionTracker {
    kind: BatchKind,
    ledger: ExecutionLedger,
    timeout: Duration,
    active: Arc<DashMap<String, Arc<Tracking>>>,
    parents: Arc<DashMap<String, String>>,
}

impl CompletionTracker {
    pub fn new(kind: BatchKind, ledger: ExecutionLedger, timeout: Duration) -> Self {
        Self {
            kind,
            ledger,
            timeout,
            active: Arc::new(DashMap::new()),
            parents: Arc::new(DashMap::new()),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Start waiting for `item_ids`, for `timeout` or the tracker default.
    ///
    /// Everything is registered before this returns, so acknowledgements
    /// that arrive right after are counted. All state of the operation is
    /// dropped once its tracking ends.
    pub fn track(&self, operation_id: &str, item_ids: Vec<String>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(self.timeout);
        for item in &item_ids {
            self.parents.insert(item.clone(), operation_id.to_string());
        }
        let (outcome_tx, _) = watch::channel(None);
        let tracking = Arc::new(Tracking {
            latch: Latch::new(item_ids.iter().cloned()),
            outcome: outcome_tx,
        });
        self.active
            .insert(operation_id.to_string(), Arc::clone(&tracking));

        let tracker = self.clone();
        let parent = operation_id.to_string();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = tracking.latch.wait() => TrackingOutcome::Completed,
                _ = tokio::time::sleep(timeout) => TrackingOutcome::TimedOut {
                    abandoned: tracking.latch.remaining(),
                },
            };
            for item in &item_ids {
                tracker.parents.remove(item);
            }
            tracker.finish(&parent, timeout, &outcome).await;
            tracker.active.remove(&parent);
            tracking.outcome.send_replace(Some(outcome));
        });
    }

    /// Wait for the tracking of `operation_id` to end.
    ///
    /// `None` when the operation is not being tracked, including when its
    /// tracking has already ended.
    pub async fn wait(&self, operation_id: &str) -> Option<TrackingOutcome> {
        let mut outcome = self
            .active
            .get(operation_id)
            .map(|t| t.outcome.subscribe())?;
        match outcome.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(e) => {
                tracing::error!(operation_id, error = %e, "Completion tracking task failed");
                None
            }
        }
    }

    pub fn is_tracking(&self, operation_id: &str) -> bool {
        self.active.contains_key(operation_id)
    }

    /// Operations still being tracked
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    async fn finish(&self, operation_id: &str, timeout: Duration, outcome: &TrackingOutcome) {
        match outcome {
            TrackingOutcome::Completed => {
                if let Err(e) = self.complete_parent(operation_id).await {
                    tracing::error!(
                        kind = %self.kind,
                        operation_id,
                        error = %e,
                        "Failed to finish operation"
                    );
                }
            }
            TrackingOutcome::TimedOut { abandoned } => {
                tracing::warn!(
                    kind = %self.kind,
                    operation_id,
                    timeout_secs = timeout.as_secs(),
                    abandoned = ?abandoned,
                    "Charge acknowledgements timed out, items abandoned"
                );
            }
        }
    }

    async fn complete_parent(&self, operation_id: &str) -> Result<(), WorkflowError> {
        let name = self.kind.operation_name();
        let Some(mut info) = self.ledger.get::<AnyBatchData>(name, operation_id).await? else {
            tracing::warn!(operation_id, "Completed operation has no ledger record");
            return Ok(());
        };
        if self
            .ledger
            .try_transition(&mut info, OperationState::Started, OperationState::Finished)
            .await?
        {
            tracing::info!(kind = %self.kind, operation_id, "All items charged, operation finished");
        }
        Ok(())
    }
}

#[async_trait]
impl ChargeListener for CompletionTracker {
    fn rank(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "completion-tracker"
    }

    async fn on_charged(&self, item_id: &str) -> Result<(), WorkflowError> {
        let name = self.kind.operation_name();
        if let Some(mut item) = self.ledger.get::<AnyBatchData>(name, item_id).await? {
            self.ledger
                .try_transition(&mut item, OperationState::Started, OperationState::Finished)
                .await?;
        } else {
            tracing::warn!(item_id, "Acknowledged item has no ledger record");
        }

        let Some(parent) = self.parents.get(item_id).map(|p| p.value().clone()) else {
            tracing::debug!(item_id, "No active tracking for acknowledged item");
            return Ok(());
        };
        if let Some(tracking) = self.active.get(&parent).map(|t| Arc::clone(t.value())) {
            tracking.latch.count_down(item_id);
        }
        Ok(())
    }
}
