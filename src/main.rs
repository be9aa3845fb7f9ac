//! Commission Service CLI
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌─────────────┐    ┌──────────────┐
//! │  Config  │───▶│   Backends   │───▶│  Handlers   │───▶│ Event drain  │
//! │  (YAML)  │    │ PG/Redis/HTTP│    │ (swap, pnl) │    │  (JSON log)  │
//! └──────────┘    └──────────────┘    └─────────────┘    └──────────────┘
//! ```
//!
//! Without `redis_url` the lock and the fast cache are in-process, which is
//! only safe with a single instance.
//!
//! After a batch runs, charge acknowledgements are read from stdin, one item
//! id per line, until every item is acknowledged or tracking times out.
//! `--detach` returns right away and leaves the operation `Started`.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::BufReader;

use commission_service::batch::PgCalculationHistory;
use commission_service::db::{
    DAILY_PNL_HISTORY_TABLE, Database, OVERNIGHT_SWAP_HISTORY_TABLE, RedisConnection,
};
use commission_service::events::{ChannelEventPublisher, EventPublisher};
use commission_service::ledger::PgLedgerStore;
use commission_service::lock::{DistributedLock, InMemoryLock, RedisLock};
use commission_service::rates::{FastCache, InMemoryFastCache, PgSettingsStore, RedisFastCache};
use commission_service::sources::BackendClient;
use commission_service::{
    AppConfig, Backends, BatchKind, CommandOutcome, CommissionService, StartDailyPnlCommand,
    StartOvernightSwapCommand,
};

const BUILD_VERSION: &str = env!("BUILD_VERSION");

#[derive(Parser, Debug)]
#[command(
    name = "commission_service",
    version = BUILD_VERSION,
    about = "Overnight swap and daily PnL batches"
)]
struct Cli {
    /// Config file under config/<env>.yaml
    #[arg(short, long, default_value = "dev")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate overnight swaps for every open position
    StartSwaps {
        #[arg(long)]
        operation_id: String,
        #[arg(long)]
        trading_day: NaiveDate,
        #[arg(long, default_value_t = 1)]
        financing_days: u32,
        #[arg(long, default_value_t = 365)]
        days_per_year: u32,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Calculate daily PnL for every open position
    StartDailyPnl {
        #[arg(long)]
        operation_id: String,
        #[arg(long)]
        trading_day: NaiveDate,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Result counts of an operation (parent or item id)
    OperationState {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug)]
struct TrackingArgs {
    /// Acknowledgement timeout for this run, overriding the configured one
    #[arg(long)]
    tracking_timeout_secs: Option<u64>,
    /// Do not wait for charge acknowledgements
    #[arg(long)]
    detach: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Swap,
    DailyPnl,
}

impl From<KindArg> for BatchKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Swap => BatchKind::OvernightSwap,
            KindArg::DailyPnl => BatchKind::DailyPnl,
        }
    }
}

async fn build_backends(
    config: &AppConfig,
    publisher: Arc<dyn EventPublisher>,
) -> Result<Backends> {
    let db = Database::connect(&config.postgres_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.init_schema()
        .await
        .context("Failed to initialize schema")?;
    let pool = db.pool().clone();

    let (lock, cache) = match &config.redis_url {
        Some(url) => {
            let redis = RedisConnection::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            let lock: Arc<dyn DistributedLock> = Arc::new(RedisLock::new(redis.clone()));
            let cache: Arc<dyn FastCache> = Arc::new(RedisFastCache::new(redis));
            (lock, cache)
        }
        None => {
            tracing::warn!(
                "No redis_url configured, using in-process lock and cache (single instance only)"
            );
            let lock: Arc<dyn DistributedLock> = Arc::new(InMemoryLock::new());
            let cache: Arc<dyn FastCache> = Arc::new(InMemoryFastCache::new());
            (lock, cache)
        }
    };

    let backend = Arc::new(BackendClient::new(&config.backend_url)?);

    Ok(Backends {
        ledger: Arc::new(PgLedgerStore::new(pool.clone())),
        swap_history: Arc::new(PgCalculationHistory::new(
            pool.clone(),
            OVERNIGHT_SWAP_HISTORY_TABLE,
        )),
        daily_pnl_history: Arc::new(PgCalculationHistory::new(
            pool.clone(),
            DAILY_PNL_HISTORY_TABLE,
        )),
        lock,
        cache,
        settings: Arc::new(PgSettingsStore::new(pool)),
        publisher,
        positions: backend.clone(),
        asset_pairs: backend.clone(),
        interest_rates: backend.clone(),
        quotes: backend,
    })
}

/// Feed acknowledgements from stdin to the service until tracking ends
async fn await_completion(
    service: &CommissionService,
    kind: BatchKind,
    operation_id: &str,
    outcome: &CommandOutcome,
    detach: bool,
) -> Result<()> {
    tracing::info!(%kind, operation_id, ?outcome, "Command handled");
    let CommandOutcome::Executed { .. } = outcome else {
        return Ok(());
    };
    if detach {
        tracing::warn!(
            %kind,
            operation_id,
            "Detached, operation stays Started until a consumer acknowledges every item"
        );
        return Ok(());
    }

    tracing::info!(%kind, operation_id, "Reading charge acknowledgements from stdin");
    let stdin = BufReader::new(tokio::io::stdin());
    match service
        .acknowledge_until_done(kind, operation_id, stdin)
        .await
        .context("Failed to read acknowledgements")?
    {
        Some(tracking) => tracing::info!(%kind, operation_id, ?tracking, "Tracking ended"),
        None => tracing::info!(%kind, operation_id, "Tracking already ended"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.env)?;
    let _log_guard = commission_service::logging::init_logging(&config);

    tracing::info!(
        env = %cli.env,
        version = BUILD_VERSION,
        holder = %config.holder_id(),
        "Starting commission service"
    );

    let (publisher, mut events) = ChannelEventPublisher::new();
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(event = event.name(), payload = %json, "Event"),
                Err(e) => tracing::error!(error = %e, "Failed to serialize event"),
            }
        }
    });

    let backends = build_backends(&config, Arc::new(publisher)).await?;
    let service = CommissionService::new(&config, backends);

    match cli.command {
        Command::StartSwaps {
            operation_id,
            trading_day,
            financing_days,
            days_per_year,
            tracking,
        } => {
            let mut command = StartOvernightSwapCommand::new(operation_id, trading_day);
            command.number_of_financing_days = financing_days;
            command.financing_days_per_year = days_per_year;
            command.tracking_timeout_secs = tracking.tracking_timeout_secs;
            let outcome = service.start_overnight_swaps(&command).await?;
            await_completion(
                &service,
                BatchKind::OvernightSwap,
                &command.operation_id,
                &outcome,
                tracking.detach,
            )
            .await?;
        }
        Command::StartDailyPnl {
            operation_id,
            trading_day,
            tracking,
        } => {
            let mut command = StartDailyPnlCommand::new(operation_id, trading_day);
            command.tracking_timeout_secs = tracking.tracking_timeout_secs;
            let outcome = service.start_daily_pnl(&command).await?;
            await_completion(
                &service,
                BatchKind::DailyPnl,
                &command.operation_id,
                &outcome,
                tracking.detach,
            )
            .await?;
        }
        Command::OperationState { kind, id } => {
            let counts = service.get_operation_state(kind.into(), &id).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
    }

    // Closes the event channel so the drain task ends
    drop(service);
    drain.await?;
    Ok(())
}
