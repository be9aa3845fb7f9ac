//! Service wiring
//!
//! [`Backends`] names every storage and transport dependency;
//! [`CommissionService`] builds the handlers, routers and rate settings
//! around them. Backends are chosen by the caller (PostgreSQL/Redis/HTTP in
//! the binary, in-memory in tests and single-instance runs).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::commands::{CommandOutcome, StartDailyPnlCommand, StartOvernightSwapCommand};
use super::error::WorkflowError;
use super::handler::BatchCommandHandler;
use super::listeners::{ChargeListener, ChargeRouter, WasChargedRecorder};
use super::tracker::{CompletionTracker, TrackingOutcome};
use crate::batch::{
    BatchEngine, BatchKind, CalculationHistory, DailyPnlFlavor, EngineConfig,
    InMemoryCalculationHistory, OperationCounts, OvernightSwapFlavor,
};
use crate::config::AppConfig;
use crate::events::EventPublisher;
use crate::ledger::{ExecutionLedger, InMemoryLedgerStore, LedgerStore};
use crate::lock::{DistributedLock, InMemoryLock};
use crate::pricing::CommissionCalculator;
use crate::rates::{
    FastCache, InMemoryFastCache, InMemorySettingsStore, RateSettingsService, SettingsStore,
};
use crate::sources::{
    AssetPairSource, InMemoryMarketData, InterestRateSource, PositionSource, QuoteSource,
};

pub struct Backends {
    pub ledger: Arc<dyn LedgerStore>,
    pub swap_history: Arc<dyn CalculationHistory>,
    pub daily_pnl_history: Arc<dyn CalculationHistory>,
    pub lock: Arc<dyn DistributedLock>,
    pub cache: Arc<dyn FastCache>,
    pub settings: Arc<dyn SettingsStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub positions: Arc<dyn PositionSource>,
    pub asset_pairs: Arc<dyn AssetPairSource>,
    pub interest_rates: Arc<dyn InterestRateSource>,
    pub quotes: Arc<dyn QuoteSource>,
}

impl Backends {
    /// Everything in process, market data served by `market`
    pub fn in_memory(market: Arc<InMemoryMarketData>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            ledger: Arc::new(InMemoryLedgerStore::new()),
            swap_history: Arc::new(InMemoryCalculationHistory::new()),
            daily_pnl_history: Arc::new(InMemoryCalculationHistory::new()),
            lock: Arc::new(InMemoryLock::new()),
            cache: Arc::new(InMemoryFastCache::new()),
            settings: Arc::new(InMemorySettingsStore::new()),
            publisher,
            positions: market.clone(),
            asset_pairs: market.clone(),
            interest_rates: market.clone(),
            quotes: market,
        }
    }
}

pub struct CommissionService {
    swaps: BatchCommandHandler<OvernightSwapFlavor>,
    daily_pnl: BatchCommandHandler<DailyPnlFlavor>,
    swap_acks: ChargeRouter,
    daily_pnl_acks: ChargeRouter,
    rates: Arc<RateSettingsService>,
    calculator: CommissionCalculator,
}

impl CommissionService {
    pub fn new(config: &AppConfig, backends: Backends) -> Self {
        let rates = Arc::new(RateSettingsService::new(
            backends.cache,
            backends.settings,
            backends.publisher.clone(),
            config.default_rate_settings.clone(),
        ));
        let ledger = ExecutionLedger::new(backends.ledger);
        let engine_config = EngineConfig {
            holder_id: config.holder_id(),
            lock_ttl: config.batch.lock_ttl(),
            max_concurrency: config.batch.max_concurrency,
        };

        let swap_tracker = CompletionTracker::new(
            BatchKind::OvernightSwap,
            ledger.clone(),
            Duration::from_secs(config.tracking.overnight_swap_timeout_secs),
        );
        let daily_pnl_tracker = CompletionTracker::new(
            BatchKind::DailyPnl,
            ledger.clone(),
            Duration::from_secs(config.tracking.daily_pnl_timeout_secs),
        );

        let swap_acks = Self::router(
            BatchKind::OvernightSwap,
            backends.swap_history.clone(),
            &swap_tracker,
        );
        let daily_pnl_acks = Self::router(
            BatchKind::DailyPnl,
            backends.daily_pnl_history.clone(),
            &daily_pnl_tracker,
        );

        let swaps = BatchCommandHandler::new(
            BatchEngine::new(
                OvernightSwapFlavor::new(
                    rates.clone(),
                    backends.asset_pairs,
                    backends.interest_rates,
                    backends.quotes.clone(),
                ),
                backends.positions.clone(),
                backends.swap_history,
                backends.lock.clone(),
                engine_config.clone(),
            ),
            ledger.clone(),
            backends.publisher.clone(),
            swap_tracker,
        );
        let daily_pnl = BatchCommandHandler::new(
            BatchEngine::new(
                DailyPnlFlavor,
                backends.positions,
                backends.daily_pnl_history,
                backends.lock,
                engine_config,
            ),
            ledger,
            backends.publisher,
            daily_pnl_tracker,
        );

        Self {
            swaps,
            daily_pnl,
            swap_acks,
            daily_pnl_acks,
            calculator: CommissionCalculator::new(rates.clone(), backends.quotes),
            rates,
        }
    }

    fn router(
        kind: BatchKind,
        history: Arc<dyn CalculationHistory>,
        tracker: &CompletionTracker,
    ) -> ChargeRouter {
        let listeners: Vec<Arc<dyn ChargeListener>> = vec![
            Arc::new(WasChargedRecorder::new(history)),
            Arc::new(tracker.clone()),
        ];
        ChargeRouter::new(kind, listeners)
    }

    pub async fn start_overnight_swaps(
        &self,
        command: &StartOvernightSwapCommand,
    ) -> Result<CommandOutcome, WorkflowError> {
        self.swaps.handle(command).await
    }

    pub async fn start_daily_pnl(
        &self,
        command: &StartDailyPnlCommand,
    ) -> Result<CommandOutcome, WorkflowError> {
        self.daily_pnl.handle(command).await
    }

    /// Downstream acknowledged the charge of `item_id`
    pub async fn on_item_charged(&self, kind: BatchKind, item_id: &str) -> Result<(), WorkflowError> {
        match kind {
            BatchKind::OvernightSwap => self.swap_acks.dispatch(item_id).await,
            BatchKind::DailyPnl => self.daily_pnl_acks.dispatch(item_id).await,
        }
    }

    pub async fn get_operation_state(
        &self,
        kind: BatchKind,
        id: &str,
    ) -> Result<OperationCounts, WorkflowError> {
        match kind {
            BatchKind::OvernightSwap => self.swaps.get_operation_state(id).await,
            BatchKind::DailyPnl => self.daily_pnl.get_operation_state(id).await,
        }
    }

    pub async fn set_was_charged(
        &self,
        kind: BatchKind,
        item_id: &str,
        was_charged: bool,
    ) -> Result<u64, WorkflowError> {
        match kind {
            BatchKind::OvernightSwap => self.swaps.set_was_charged(item_id, was_charged).await,
            BatchKind::DailyPnl => self.daily_pnl.set_was_charged(item_id, was_charged).await,
        }
    }

    /// Apply acknowledgements read from `input`, one item id per line, until
    /// the tracking of `operation_id` ends. Once the input is exhausted the
    /// tracker is still awaited, so the run ends on its timeout.
    pub async fn acknowledge_until_done<R>(
        &self,
        kind: BatchKind,
        operation_id: &str,
        input: R,
    ) -> std::io::Result<Option<TrackingOutcome>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        let tracking = self.tracker(kind).wait(operation_id);
        tokio::pin!(tracking);

        loop {
            tokio::select! {
                biased;
                ended = &mut tracking => return Ok(ended),
                line = lines.next_line(), if input_open => match line? {
                    Some(line) => {
                        let item_id = line.trim();
                        if item_id.is_empty() {
                            continue;
                        }
                        if let Err(e) = self.on_item_charged(kind, item_id).await {
                            tracing::error!(%kind, item_id, code = e.code(), error = %e, "Failed to apply acknowledgement");
                        }
                    }
                    None => {
                        tracing::info!(%kind, operation_id, "Acknowledgement input closed, waiting for timeout");
                        input_open = false;
                    }
                },
            }
        }
    }

    pub fn tracker(&self, kind: BatchKind) -> &CompletionTracker {
        match kind {
            BatchKind::OvernightSwap => self.swaps.tracker(),
            BatchKind::DailyPnl => self.daily_pnl.tracker(),
        }
    }

    pub fn rates(&self) -> &Arc<RateSettingsService> {
        &self.rates
    }

    pub fn calculator(&self) -> &CommissionCalculator {
        &self.calculator
    }
}
