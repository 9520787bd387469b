//! Point-in-time views of a machine.

use crate::core::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of the most recent committed transition.
///
/// # Example
///
/// ```rust
/// use phaseline::engine::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: "A",
///     symbol: "go",
///     to: "B",
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, "B");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord<S, T> {
    /// The state that was exited
    pub from: S,
    /// The symbol that fired the transition
    pub symbol: T,
    /// The state that was entered
    pub to: S,
    /// When the target state was entered
    pub timestamp: DateTime<Utc>,
}

/// Read-only view of a machine, safe to take from inside callbacks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MachineSnapshot<S, T> {
    pub id: Uuid,
    pub phase: Phase,
    pub current_state: Option<S>,
    pub previous_state: Option<S>,
    pub next_state: Option<S>,
    /// Number of parameters in the current slot, if set
    pub current_arity: Option<usize>,
    pub activated_at: Option<DateTime<Utc>>,
    /// Committed transitions since construction
    pub transition_count: u64,
    pub last_transition: Option<TransitionRecord<S, T>>,
    /// Whether a detached action is retained for the current state
    pub action_running: bool,
}

impl<S, T> MachineSnapshot<S, T> {
    pub fn is_active(&self) -> bool {
        self.phase != Phase::Inactive
    }

    pub fn in_recovery(&self) -> bool {
        self.phase == Phase::Recovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase: Phase) -> MachineSnapshot<String, String> {
        MachineSnapshot {
            id: Uuid::new_v4(),
            phase,
            current_state: Some("B".to_string()),
            previous_state: None,
            next_state: None,
            current_arity: Some(1),
            activated_at: Some(Utc::now()),
            transition_count: 1,
            last_transition: Some(TransitionRecord {
                from: "A".to_string(),
                symbol: "go".to_string(),
                to: "B".to_string(),
                timestamp: Utc::now(),
            }),
            action_running: false,
        }
    }

    #[test]
    fn phase_predicates() {
        assert!(snapshot(Phase::Active).is_active());
        assert!(!snapshot(Phase::Inactive).is_active());
        assert!(snapshot(Phase::Recovery).in_recovery());
    }

    #[test]
    fn snapshot_serializes_correctly() {
        let snapshot = snapshot(Phase::Active);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: MachineSnapshot<String, String> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, snapshot.id);
        assert_eq!(back.phase, Phase::Active);
        assert_eq!(back.current_state.as_deref(), Some("B"));
        assert_eq!(back.last_transition, snapshot.last_transition);
    }
}
