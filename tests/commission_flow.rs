//! Public API flows on in-memory backends

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::mpsc::UnboundedReceiver;

use commission_service::events::{ChannelEventPublisher, ServiceEvent};
use commission_service::rates::{InMemorySettingsStore, OrderExecutionRate, RateKind, SettingsStore};
use commission_service::sources::{AssetPair, InMemoryMarketData, OpenPosition, PositionDirection};
use commission_service::workflow::TrackingOutcome;
use commission_service::{
    AppConfig, Backends, BatchKind, CommandOutcome, CommissionService, StartOvernightSwapCommand,
};

const CONFIG: &str = r#"
log_level: info
log_dir: ./logs
log_file: test.log
use_json: false
rotation: never
postgres_url: "postgres://unused"
backend_url: "http://unused"
instance_id: "it-node"
tracking:
  overnight_swap_timeout_secs: 5
  daily_pnl_timeout_secs: 5
default_rate_settings:
  default_legal_entity: "LE"
  default_order_execution_settings:
    commission_cap: 50
    commission_floor: 2
    commission_rate: 0.002
    commission_asset: "USD"
  default_overnight_swap_settings:
    repo_surcharge_percent: 0.01
    fix_rate: 0.0365
    commission_asset: "USD"
  default_on_behalf_settings:
    commission: 3
    commission_asset: "USD"
"#;

struct Setup {
    service: CommissionService,
    market: Arc<InMemoryMarketData>,
    settings: Arc<InMemorySettingsStore>,
    events: UnboundedReceiver<ServiceEvent>,
}

fn setup() -> Setup {
    let config = AppConfig::from_yaml(CONFIG).unwrap();
    let market = Arc::new(InMemoryMarketData::new());
    market.add_asset_pair(AssetPair {
        id: "EURUSD".to_string(),
        base_asset_id: "EUR".to_string(),
        quote_asset_id: "USD".to_string(),
        legal_entity: "LE".to_string(),
    });

    let (publisher, events) = ChannelEventPublisher::new();
    let settings = Arc::new(InMemorySettingsStore::new());
    let mut backends = Backends::in_memory(market.clone(), Arc::new(publisher));
    backends.settings = settings.clone();

    Setup {
        service: CommissionService::new(&config, backends),
        market,
        settings,
        events,
    }
}

fn drain(events: &mut UnboundedReceiver<ServiceEvent>) -> Vec<ServiceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn swap_batch_is_charged_and_finished() {
    let mut s = setup();
    let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    s.market.upsert_position(OpenPosition {
        id: "p1".to_string(),
        account_id: "acc1".to_string(),
        asset_pair_id: "EURUSD".to_string(),
        direction: PositionDirection::Short,
        current_volume: dec!(-1000),
        open_timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        pnl: dec!(0),
        charged_pnl: dec!(0),
        fx_rate: dec!(1),
    });

    let command = StartOvernightSwapCommand::new("swap-20240603", day);
    let outcome = s.service.start_overnight_swaps(&command).await.unwrap();
    assert_eq!(outcome, CommandOutcome::Executed { total: 1, failed: 0 });

    let events = drain(&mut s.events);
    let names: Vec<_> = events.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["BatchCalculated", "ItemReadyForCharging"]);

    // Short: (-0.0365 - 0.01) × 1000 / 365
    let request = match &events[1] {
        ServiceEvent::ItemReadyForCharging { request, .. } => request.clone(),
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(request.item_operation_id, "swap-20240603_p1");
    assert_eq!(
        request.amount.round_dp(12),
        (dec!(-46.5) / dec!(365)).round_dp(12)
    );

    s.service
        .on_item_charged(BatchKind::OvernightSwap, &request.item_operation_id)
        .await
        .unwrap();
    assert_eq!(
        s.service
            .tracker(BatchKind::OvernightSwap)
            .wait("swap-20240603")
            .await,
        Some(TrackingOutcome::Completed)
    );

    let counts = s
        .service
        .get_operation_state(BatchKind::OvernightSwap, "swap-20240603")
        .await
        .unwrap();
    assert_eq!((counts.total, counts.failed, counts.not_processed), (1, 0, 0));

    // Redelivery changes nothing
    let again = s.service.start_overnight_swaps(&command).await.unwrap();
    assert_eq!(again, CommandOutcome::Duplicate);
    assert!(drain(&mut s.events).is_empty());
}

#[tokio::test]
async fn unknown_pair_resolves_to_default_without_durable_write() {
    let s = setup();

    let rate = s
        .service
        .rates()
        .get_order_execution_rate("XYZ")
        .await
        .unwrap();
    assert_eq!(rate.asset_pair_id, "XYZ");
    assert_eq!(rate.commission_rate, dec!(0.002));
    assert_eq!(rate.commission_asset, "USD");

    let stored = s
        .settings
        .read_one(RateKind::OrderExecution, "XYZ")
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn replaced_rate_is_read_back_exactly() {
    let mut s = setup();
    let written = OrderExecutionRate {
        asset_pair_id: "EURUSD".to_string(),
        commission_cap: dec!(10),
        commission_floor: dec!(1),
        commission_rate: dec!(0.01),
        commission_asset: "USD".to_string(),
        legal_entity: Some("LE".to_string()),
    };

    s.service
        .rates()
        .replace_all(vec![written.clone()])
        .await
        .unwrap();
    let read = s
        .service
        .rates()
        .get_order_execution_rate("EURUSD")
        .await
        .unwrap();
    assert_eq!(read, written);

    let events = drain(&mut s.events);
    assert!(matches!(
        events.as_slice(),
        [ServiceEvent::RateSettingsChanged {
            kind: RateKind::OrderExecution,
            ..
        }]
    ));

    // 0.01 × 1 × 500 = 5, inside [1, 10]
    let commission = s
        .service
        .calculator()
        .order_execution_commission("EURUSD", "LE", dec!(500))
        .await
        .unwrap();
    assert_eq!(commission, dec!(5));
}
