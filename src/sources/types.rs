use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{AssetPairId, PositionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum PositionDirection {
    Long = 0,
    Short = 1,
}

impl PositionDirection {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PositionDirection::Long),
            1 => Some(PositionDirection::Short),
            _ => None,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            PositionDirection::Long => Decimal::ONE,
            PositionDirection::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionDirection::Long => write!(f, "Long"),
            PositionDirection::Short => write!(f, "Short"),
        }
    }
}

/// Active position as reported by the trading backend. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: PositionId,
    pub account_id: String,
    pub asset_pair_id: AssetPairId,
    pub direction: PositionDirection,
    pub current_volume: Decimal,
    pub open_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub pnl: Decimal,
    #[serde(default)]
    pub charged_pnl: Decimal,
    #[serde(default = "default_fx_rate")]
    pub fx_rate: Decimal,
}

fn default_fx_rate() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPair {
    pub id: AssetPairId,
    pub base_asset_id: String,
    pub quote_asset_id: String,
    pub legal_entity: String,
}

/// Latest interest rate, keyed by its id (referenced from swap rates)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRate {
    pub id: String,
    pub rate: Decimal,
}
