//! Pure pricing functions
//!
//! All amounts are `Decimal`; nothing here rounds.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::error::CalculationError;
use crate::rates::{OrderExecutionRate, OvernightSwapRate};
use crate::sources::PositionDirection;

pub const DEFAULT_FINANCING_DAYS_PER_YEAR: u32 = 365;

/// Inputs and intermediate values, stored next to each swap result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapDetails {
    pub volume_in_asset: Decimal,
    pub basis_of_calc: Decimal,
    pub fix_rate: Decimal,
    pub repo_surcharge_percent: Decimal,
    pub variable_rate_base: Decimal,
    pub variable_rate_quote: Decimal,
    pub number_of_financing_days: u32,
    pub financing_days_per_year: u32,
}

/// Swap for one position:
///
/// ```text
/// volume_in_asset = quote_rate × |volume|
/// basis = −fix − (repo if short) + (var_base − var_quote) × (+1 long | −1 short)
/// swap  = volume_in_asset × basis × financing_days / days_per_year
/// ```
///
/// Interest-rate ids missing from `interest_rates` count as zero. The result
/// is charged as is, without negation.
pub fn overnight_swap(
    quote_rate: Decimal,
    volume: Decimal,
    direction: PositionDirection,
    rate: &OvernightSwapRate,
    interest_rates: &HashMap<String, Decimal>,
    number_of_financing_days: u32,
    financing_days_per_year: u32,
) -> Result<(Decimal, SwapDetails), CalculationError> {
    if financing_days_per_year == 0 {
        return Err(CalculationError::InvalidParameters(
            "financing_days_per_year must be positive".to_string(),
        ));
    }

    let lookup = |id: &Option<String>| {
        id.as_ref()
            .and_then(|id| interest_rates.get(id))
            .copied()
            .unwrap_or(Decimal::ZERO)
    };
    let variable_rate_base = lookup(&rate.variable_rate_base);
    let variable_rate_quote = lookup(&rate.variable_rate_quote);

    let volume_in_asset = quote_rate * volume.abs();
    let repo = match direction {
        PositionDirection::Short => rate.repo_surcharge_percent,
        PositionDirection::Long => Decimal::ZERO,
    };
    let basis_of_calc =
        -rate.fix_rate - repo + (variable_rate_base - variable_rate_quote) * direction.sign();

    let swap = volume_in_asset * basis_of_calc * Decimal::from(number_of_financing_days)
        / Decimal::from(financing_days_per_year);

    Ok((
        swap,
        SwapDetails {
            volume_in_asset,
            basis_of_calc,
            fix_rate: rate.fix_rate,
            repo_surcharge_percent: rate.repo_surcharge_percent,
            variable_rate_base,
            variable_rate_quote,
            number_of_financing_days,
            financing_days_per_year,
        },
    ))
}

/// `min(cap, max(floor, rate × quote_rate × |volume|))`
pub fn order_execution_commission(
    quote_rate: Decimal,
    volume: Decimal,
    rate: &OrderExecutionRate,
) -> Decimal {
    let volume_in_asset = quote_rate * volume.abs();
    rate.commission_cap
        .min(rate.commission_floor.max(rate.commission_rate * volume_in_asset))
}

/// `actions × commission × quote`
pub fn on_behalf_commission(actions: u32, commission: Decimal, quote: Decimal) -> Decimal {
    Decimal::from(actions) * commission * quote
}

/// Daily PnL still to be charged
pub fn daily_pnl(pnl: Decimal, charged_pnl: Decimal) -> Decimal {
    pnl - charged_pnl
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn swap_rate() -> OvernightSwapRate {
        OvernightSwapRate {
            asset_pair_id: "EURUSD".to_string(),
            repo_surcharge_percent: dec!(0.01),
            fix_rate: dec!(0.02),
            variable_rate_base: Some("EUR_RATE".to_string()),
            variable_rate_quote: Some("USD_RATE".to_string()),
            commission_asset: "EUR".to_string(),
            legal_entity: None,
        }
    }

    fn interest_rates() -> HashMap<String, Decimal> {
        HashMap::from([
            ("EUR_RATE".to_string(), dec!(0.05)),
            ("USD_RATE".to_string(), dec!(0.03)),
        ])
    }

    #[test]
    fn test_swap_long() {
        // basis = -0.02 + (0.05 - 0.03) = 0
        let (swap, details) = overnight_swap(
            dec!(1),
            dec!(1000),
            PositionDirection::Long,
            &swap_rate(),
            &interest_rates(),
            1,
            365,
        )
        .unwrap();
        assert_eq!(details.basis_of_calc, dec!(0));
        assert_eq!(swap, dec!(0));
    }

    #[test]
    fn test_swap_short_includes_repo_and_flips_variable_part() {
        // basis = -0.02 - 0.01 - 0.02 = -0.05; 2 × 730 × -0.05 / 365 = -0.2
        let (swap, details) = overnight_swap(
            dec!(2),
            dec!(-730),
            PositionDirection::Short,
            &swap_rate(),
            &interest_rates(),
            1,
            365,
        )
        .unwrap();
        assert_eq!(details.volume_in_asset, dec!(1460));
        assert_eq!(details.basis_of_calc, dec!(-0.05));
        assert_eq!(swap, dec!(-0.2));
    }

    #[test]
    fn test_swap_scales_with_financing_days() {
        let args = |days| {
            overnight_swap(
                dec!(1),
                dec!(3650),
                PositionDirection::Long,
                &swap_rate(),
                &HashMap::new(),
                days,
                365,
            )
            .unwrap()
            .0
        };
        // Missing interest rates count as zero: basis = -0.02
        assert_eq!(args(1), dec!(-0.2));
        assert_eq!(args(3), dec!(-0.6));
    }

    #[test]
    fn test_swap_rejects_zero_days_per_year() {
        let result = overnight_swap(
            dec!(1),
            dec!(1),
            PositionDirection::Long,
            &swap_rate(),
            &HashMap::new(),
            1,
            0,
        );
        assert!(matches!(result, Err(CalculationError::InvalidParameters(_))));
    }

    #[test]
    fn test_order_execution_commission_clamped() {
        let rate = OrderExecutionRate {
            asset_pair_id: "EURUSD".to_string(),
            commission_cap: dec!(10),
            commission_floor: dec!(1),
            commission_rate: dec!(0.001),
            commission_asset: "EUR".to_string(),
            legal_entity: None,
        };

        assert_eq!(order_execution_commission(dec!(1), dec!(100), &rate), dec!(1));
        assert_eq!(order_execution_commission(dec!(1), dec!(-5000), &rate), dec!(5));
        assert_eq!(order_execution_commission(dec!(2), dec!(1000000), &rate), dec!(10));
    }

    #[test]
    fn test_on_behalf_and_daily_pnl() {
        assert_eq!(on_behalf_commission(3, dec!(5), dec!(1.1)), dec!(16.5));
        assert_eq!(on_behalf_commission(0, dec!(5), dec!(1.1)), dec!(0));
        assert_eq!(daily_pnl(dec!(120.5), dec!(100)), dec!(20.5));
    }
}
