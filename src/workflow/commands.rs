//! Inbound commands and their outcomes

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{DailyPnlParameters, SwapParameters};
use crate::core_types::{OperationId, TradingDay};
use crate::pricing::DEFAULT_FINANCING_DAYS_PER_YEAR;

/// A command that starts one batch run
pub trait StartBatchCommand: Send + Sync {
    type Parameters;

    fn operation_id(&self) -> &str;
    fn trading_day(&self) -> TradingDay;
    fn parameters(&self) -> Self::Parameters;

    /// Acknowledgement timeout for this run; `None` uses the configured one
    fn tracking_timeout(&self) -> Option<Duration> {
        None
    }
}

fn default_financing_days() -> u32 {
    1
}

fn default_days_per_year() -> u32 {
    DEFAULT_FINANCING_DAYS_PER_YEAR
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOvernightSwapCommand {
    pub operation_id: OperationId,
    pub creation_timestamp: DateTime<Utc>,
    pub trading_day: TradingDay,
    #[serde(default = "default_financing_days")]
    pub number_of_financing_days: u32,
    #[serde(default = "default_days_per_year")]
    pub financing_days_per_year: u32,
    #[serde(default)]
    pub tracking_timeout_secs: Option<u64>,
}

impl StartOvernightSwapCommand {
    /// Single night, 365-day year
    pub fn new(operation_id: impl Into<String>, trading_day: TradingDay) -> Self {
        Self {
            operation_id: operation_id.into(),
            creation_timestamp: Utc::now(),
            trading_day,
            number_of_financing_days: default_financing_days(),
            financing_days_per_year: default_days_per_year(),
            tracking_timeout_secs: None,
        }
    }
}

impl StartBatchCommand for StartOvernightSwapCommand {
    type Parameters = SwapParameters;

    fn operation_id(&self) -> &str {
        &self.operation_id
    }

    fn trading_day(&self) -> TradingDay {
        self.trading_day
    }

    fn parameters(&self) -> SwapParameters {
        SwapParameters {
            number_of_financing_days: self.number_of_financing_days,
            financing_days_per_year: self.financing_days_per_year,
        }
    }

    fn tracking_timeout(&self) -> Option<Duration> {
        self.tracking_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDailyPnlCommand {
    pub operation_id: OperationId,
    pub creation_timestamp: DateTime<Utc>,
    pub trading_day: TradingDay,
    #[serde(default)]
    pub tracking_timeout_secs: Option<u64>,
}

impl StartDailyPnlCommand {
    pub fn new(operation_id: impl Into<String>, trading_day: TradingDay) -> Self {
        Self {
            operation_id: operation_id.into(),
            creation_timestamp: Utc::now(),
            trading_day,
            tracking_timeout_secs: None,
        }
    }
}

impl StartBatchCommand for StartDailyPnlCommand {
    type Parameters = DailyPnlParameters;

    fn operation_id(&self) -> &str {
        &self.operation_id
    }

    fn trading_day(&self) -> TradingDay {
        self.trading_day
    }

    fn parameters(&self) -> DailyPnlParameters {
        DailyPnlParameters {}
    }

    fn tracking_timeout(&self) -> Option<Duration> {
        self.tracking_timeout_secs.map(Duration::from_secs)
    }
}

/// Result of handling one start command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The batch ran; item failures are counted, not raised
    Executed { total: usize, failed: usize },
    /// Redelivery of an operation that already started
    Duplicate,
    /// The run could not start; a "start failed" event was published
    StartFailed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_swap_command_defaults_when_fields_missing() {
        let json = r#"{
            "operation_id": "swap-2024-03-01",
            "creation_timestamp": "2024-03-01T22:00:00Z",
            "trading_day": "2024-03-01"
        }"#;
        let command: StartOvernightSwapCommand = serde_json::from_str(json).unwrap();

        assert_eq!(command.trading_day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(command.parameters(), SwapParameters::default());
        assert_eq!(command.tracking_timeout(), None);
    }

    #[test]
    fn test_daily_pnl_command_tracking_timeout() {
        let json = r#"{
            "operation_id": "pnl-2024-03-01",
            "creation_timestamp": "2024-03-01T22:00:00Z",
            "trading_day": "2024-03-01",
            "tracking_timeout_secs": 90
        }"#;
        let command: StartDailyPnlCommand = serde_json::from_str(json).unwrap();

        assert_eq!(command.tracking_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_weekend_swap_parameters() {
        let mut command =
            StartOvernightSwapCommand::new("op", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        command.number_of_financing_days = 3;
        command.financing_days_per_year = 360;

        let params = command.parameters();
        assert_eq!(params.number_of_financing_days, 3);
        assert_eq!(params.financing_days_per_year, 360);
        assert_eq!(command.operation_id(), "op");
    }
}
