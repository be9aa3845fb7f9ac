//! Commission Operation State Definitions
//!
//! State IDs are stored as SMALLINT next to the JSON payload so guarded
//! transitions can be expressed as a conditional UPDATE.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commission operation states
///
/// ```text
/// INITIATED → STARTED → FINISHED
///                 ↓
///              FAILED
/// ```
///
/// Terminal: FINISHED (40), FAILED (-10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum OperationState {
    /// Command received and recorded
    Initiated = 0,

    /// Batch claimed by exactly one handler
    Started = 10,

    /// Terminal: every child acknowledged
    Finished = 40,

    /// Terminal: batch failed to start or complete
    Failed = -10,
}

impl OperationState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Finished | OperationState::Failed)
    }

    /// Position in the lifecycle. Transitions only ever move forward.
    #[inline]
    fn stage(&self) -> u8 {
        match self {
            OperationState::Initiated => 0,
            OperationState::Started => 1,
            OperationState::Finished | OperationState::Failed => 2,
        }
    }

    /// Whether `self → next` moves forward through the lifecycle
    #[inline]
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        self.stage() < next.stage()
    }

    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(OperationState::Initiated),
            10 => Some(OperationState::Started),
            40 => Some(OperationState::Finished),
            -10 => Some(OperationState::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Initiated => "INITIATED",
            OperationState::Started => "STARTED",
            OperationState::Finished => "FINISHED",
            OperationState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for OperationState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        OperationState::from_id(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OperationState::Finished.is_terminal());
        assert!(OperationState::Failed.is_terminal());
        assert!(!OperationState::Initiated.is_terminal());
        assert!(!OperationState::Started.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(OperationState::Initiated.can_transition_to(OperationState::Started));
        assert!(OperationState::Started.can_transition_to(OperationState::Finished));
        assert!(OperationState::Started.can_transition_to(OperationState::Failed));
        assert!(OperationState::Initiated.can_transition_to(OperationState::Failed));

        assert!(!OperationState::Started.can_transition_to(OperationState::Initiated));
        assert!(!OperationState::Started.can_transition_to(OperationState::Started));
        assert!(!OperationState::Finished.can_transition_to(OperationState::Failed));
    }

    #[test]
    fn test_invalid_state_id() {
        assert!(OperationState::from_id(999).is_none());
        assert_eq!(OperationState::from_id(10), Some(OperationState::Started));
        assert_eq!(OperationState::try_from(-10), Ok(OperationState::Failed));
    }

    #[test]
    fn test_display() {
        assert_eq!(OperationState::Initiated.to_string(), "INITIATED");
        assert_eq!(OperationState::Finished.to_string(), "FINISHED");
    }
}
