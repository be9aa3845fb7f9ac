//! Charge acknowledgement listeners

use std::sync::Arc;

use async_trait::async_trait;

use super::error::WorkflowError;
use crate::batch::{BatchKind, CalculationHistory};

/// Reacts to "item was charged downstream". Listeners must tolerate
/// redelivery of the same item id.
#[async_trait]
pub trait ChargeListener: Send + Sync {
    /// Lower rank runs first
    fn rank(&self) -> u8;

    fn name(&self) -> &'static str;

    async fn on_charged(&self, item_id: &str) -> Result<(), WorkflowError>;
}

/// Marks the calculation result as charged
pub struct WasChargedRecorder {
    history: Arc<dyn CalculationHistory>,
}

impl WasChargedRecorder {
    pub fn new(history: Arc<dyn CalculationHistory>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl ChargeListener for WasChargedRecorder {
    fn rank(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "was-charged-recorder"
    }

    async fn on_charged(&self, item_id: &str) -> Result<(), WorkflowError> {
        let affected = self.history.set_was_charged(item_id, true).await?;
        if affected == 0 {
            tracing::warn!(item_id, "Charged item has no calculation result");
        }
        Ok(())
    }
}

/// Dispatches acknowledgements of one batch kind to its listeners by rank
pub struct ChargeRouter {
    kind: BatchKind,
    listeners: Vec<Arc<dyn ChargeListener>>,
}

impl ChargeRouter {
    pub fn new(kind: BatchKind, mut listeners: Vec<Arc<dyn ChargeListener>>) -> Self {
        listeners.sort_by_key(|l| l.rank());
        Self { kind, listeners }
    }

    /// Stops at the first failing listener; the acknowledgement is expected
    /// to be redelivered.
    pub async fn dispatch(&self, item_id: &str) -> Result<(), WorkflowError> {
        for listener in &self.listeners {
            if let Err(e) = listener.on_charged(item_id).await {
                tracing::error!(
                    kind = %self.kind,
                    item_id,
                    listener = listener.name(),
                    error = %e,
                    "Charge listener failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{CalculationResult, InMemoryCalculationHistory, ItemCalculation};
    use crate::sources::{OpenPosition, PositionDirection};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct Probe {
        rank: u8,
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ChargeListener for Probe {
        fn rank(&self) -> u8 {
            self.rank
        }

        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_charged(&self, _item_id: &str) -> Result<(), WorkflowError> {
            self.calls.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_router_calls_listeners_by_rank() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = |rank, name| -> Arc<dyn ChargeListener> {
            Arc::new(Probe {
                rank,
                name,
                calls: calls.clone(),
            })
        };
        let router = ChargeRouter::new(
            BatchKind::OvernightSwap,
            vec![probe(2, "third"), probe(0, "first"), probe(1, "second")],
        );

        router.dispatch("op_p1").await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_recorder_sets_was_charged() {
        let history = Arc::new(InMemoryCalculationHistory::new());
        let position = OpenPosition {
            id: "p1".to_string(),
            account_id: "acc".to_string(),
            asset_pair_id: "EURUSD".to_string(),
            direction: PositionDirection::Long,
            current_volume: dec!(1),
            open_timestamp: Utc::now(),
            pnl: dec!(0),
            charged_pnl: dec!(0),
            fx_rate: dec!(1),
        };
        let result = CalculationResult::success(
            "op",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            &position,
            ItemCalculation {
                amount: dec!(1),
                fx_rate: dec!(1),
                details: None,
            },
        );
        history.bulk_insert(&[result]).await.unwrap();

        let recorder = WasChargedRecorder::new(history.clone());
        recorder.on_charged("op_p1").await.unwrap();
        // Unknown item is logged, not an error
        recorder.on_charged("op_missing").await.unwrap();

        assert_eq!(history.get("op_p1").unwrap().was_charged, Some(true));
    }
}
