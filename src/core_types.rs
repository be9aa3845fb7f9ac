//! Core types used throughout the system
//!
//! Identifier aliases and the composite-id helpers shared by the ledger
//! (sub-operations) and the calculation history (result rows).

use chrono::NaiveDate;

/// Operation ID - supplied by the caller, globally unique per logical run.
///
/// Re-issuing the same id is the idempotent-retry path.
pub type OperationId = String;

/// Position ID - owned by the trading backend.
///
/// May itself contain [`ID_SEPARATOR`].
pub type PositionId = String;

/// Asset pair (instrument) ID, e.g. `EURUSD`
pub type AssetPairId = String;

/// Business date a calculation applies to
pub type TradingDay = NaiveDate;

/// Separator between a parent operation id and a child id
pub const ID_SEPARATOR: char = '_';

/// Compose a child id: `operation_id + "_" + child_id`
pub fn compose_id(operation_id: &str, child_id: &str) -> String {
    format!("{operation_id}{ID_SEPARATOR}{child_id}")
}

/// Split a composite id on the *last* separator.
///
/// Returns `None` when the id has no separator at all.
pub fn extract_keys_from_id(id: &str) -> Option<(&str, &str)> {
    id.rfind(ID_SEPARATOR)
        .map(|idx| (&id[..idx], &id[idx + ID_SEPARATOR.len_utf8()..]))
}

/// Extract the parent operation id.
///
/// Accepts either a parent id (returned as-is) or a composite child id.
pub fn extract_operation_id(id: &str) -> &str {
    match id.rfind(ID_SEPARATOR) {
        Some(idx) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_extract() {
        let id = compose_id("op1", "pos1");
        assert_eq!(id, "op1_pos1");
        assert_eq!(extract_keys_from_id(&id), Some(("op1", "pos1")));
    }

    #[test]
    fn test_extract_splits_on_last_separator() {
        // Operation ids may contain the separator, so the split must be on the last one
        let id = compose_id("daily_run_2024", "pos42");
        assert_eq!(extract_keys_from_id(&id), Some(("daily_run_2024", "pos42")));
        assert_eq!(extract_operation_id(&id), "daily_run_2024");
    }

    #[test]
    fn test_extract_without_separator() {
        assert_eq!(extract_keys_from_id("op1"), None);
        assert_eq!(extract_operation_id("op1"), "op1");
    }
}
