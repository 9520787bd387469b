//! Errors returned by machine operations.

use crate::core::{ParamError, Phase};
use thiserror::Error;

/// Errors that can occur while driving a machine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The operation is not allowed in the machine's current phase.
    #[error("cannot {operation} while the machine is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// `transition` found no transition whose conditions pass.
    #[error("no transition '{symbol}' from state '{state}'")]
    NoTransition { state: String, symbol: String },

    #[error("state '{state}' is not configured")]
    UnknownState { state: String },

    #[error("invalid parameters: {0}")]
    Parameters(#[from] ParamError),

    /// The caller's cancellation token fired.
    #[error("operation was cancelled")]
    Cancelled,

    /// A lifecycle callback failed; carries the original error or the
    /// replacement chosen by an error handler.
    #[error(transparent)]
    Failed(anyhow::Error),

    #[error("machine has been disposed")]
    Disposed,
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The lifecycle error carried by `Failed`, if any.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}
