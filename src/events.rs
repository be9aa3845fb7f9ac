//! Outbound notifications
//!
//! Transport is out of scope: publishers hand events to whatever carries them
//! (an in-process channel here). Delivery is at-least-once, consumers dedup by
//! operation id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::batch::BatchKind;
use crate::core_types::TradingDay;
use crate::rates::RateKind;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Per item "ready for downstream charging" payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// `operation_id + "_" + position_id`
    pub item_operation_id: String,
    pub account_id: String,
    pub position_id: String,
    pub instrument: String,
    pub amount: Decimal,
    pub trading_day: TradingDay,
    pub volume: Decimal,
    pub fx_rate: Decimal,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServiceEvent {
    BatchCalculated {
        kind: BatchKind,
        operation_id: String,
        timestamp: DateTime<Utc>,
        total: usize,
        failed: usize,
    },
    BatchStartFailed {
        kind: BatchKind,
        operation_id: String,
        timestamp: DateTime<Utc>,
        reason: String,
    },
    ItemReadyForCharging {
        kind: BatchKind,
        request: ChargeRequest,
    },
    RateSettingsChanged {
        kind: RateKind,
        timestamp: DateTime<Utc>,
    },
}

impl ServiceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceEvent::BatchCalculated { .. } => "BatchCalculated",
            ServiceEvent::BatchStartFailed { .. } => "BatchStartFailed",
            ServiceEvent::ItemReadyForCharging { .. } => "ItemReadyForCharging",
            ServiceEvent::RateSettingsChanged { .. } => "RateSettingsChanged",
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ServiceEvent) -> Result<(), EventError>;
}

/// Publishes into an unbounded tokio channel drained by the caller
#[derive(Clone)]
pub struct ChannelEventPublisher {
    tx: mpsc::UnboundedSender<ServiceEvent>,
}

impl ChannelEventPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServiceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: ServiceEvent) -> Result<(), EventError> {
        tracing::debug!(event = event.name(), "Publishing event");
        self.tx.send(event).map_err(|_| EventError::ChannelClosed)
    }
}

/// Recording publisher for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<ServiceEvent>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ServiceEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn count(&self, name: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.name() == name)
                .count()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: ServiceEvent) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }
}
