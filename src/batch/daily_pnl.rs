//! Daily PnL flavor: charges the PnL accrued since the last charge

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::engine::BatchFlavor;
use super::error::BatchError;
use super::types::{BatchKind, ItemCalculation};
use crate::pricing::{self, CalculationError};
use crate::sources::OpenPosition;

/// Daily PnL takes no parameters beyond the trading day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPnlParameters {}

#[derive(Debug, Default)]
pub struct DailyPnlFlavor;

#[async_trait]
impl BatchFlavor for DailyPnlFlavor {
    type Parameters = DailyPnlParameters;
    type Context = ();

    fn kind(&self) -> BatchKind {
        BatchKind::DailyPnl
    }

    async fn prepare(&self, _parameters: &DailyPnlParameters) -> Result<(), BatchError> {
        Ok(())
    }

    async fn calculate(
        &self,
        _context: &(),
        position: &OpenPosition,
        _parameters: &DailyPnlParameters,
    ) -> Result<ItemCalculation, CalculationError> {
        Ok(ItemCalculation {
            amount: pricing::daily_pnl(position.pnl, position.charged_pnl),
            fx_rate: position.fx_rate,
            details: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PositionDirection;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_daily_pnl_is_uncharged_part() {
        let position = OpenPosition {
            id: "p1".to_string(),
            account_id: "acc".to_string(),
            asset_pair_id: "EURUSD".to_string(),
            direction: PositionDirection::Long,
            current_volume: dec!(5),
            open_timestamp: Utc::now(),
            pnl: dec!(-40),
            charged_pnl: dec!(-25),
            fx_rate: dec!(1.08),
        };

        let calc = DailyPnlFlavor
            .calculate(&(), &position, &DailyPnlParameters::default())
            .await
            .unwrap();
        assert_eq!(calc.amount, dec!(-15));
        assert_eq!(calc.fx_rate, dec!(1.08));
    }
}
