//! The engine's internal lifecycle phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a machine's lifecycle.
///
/// A machine starts `Inactive`. Activation passes through `Active` and
/// `Idle` (active, no state yet), then enters the initial state:
///
/// ```text
/// Inactive -> Active -> Idle -> Entering -> Entered -> Active
/// Active -> Exiting -> Exited -> Transitioning -> Transitioned -> Entering -> Entered -> Active
/// Active -> Exiting -> Exited -> Idle -> Inactive
/// ```
///
/// `Recovery` is entered when a transition or deactivation fails before a
/// new current state is established. It is left by a later transition or
/// deactivation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Inactive,
    Active,
    Idle,
    Exiting,
    Exited,
    Transitioning,
    Transitioned,
    Entering,
    Entered,
    Recovery,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::Active => "Active",
            Self::Idle => "Idle",
            Self::Exiting => "Exiting",
            Self::Exited => "Exited",
            Self::Transitioning => "Transitioning",
            Self::Transitioned => "Transitioned",
            Self::Entering => "Entering",
            Self::Entered => "Entered",
            Self::Recovery => "Recovery",
        }
    }

    /// Phases from which transition operations are accepted.
    pub fn accepts_transition(&self) -> bool {
        matches!(self, Self::Active | Self::Recovery)
    }

    /// Phases from which deactivation is accepted.
    pub fn accepts_deactivation(&self) -> bool {
        matches!(self, Self::Active | Self::Recovery)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
