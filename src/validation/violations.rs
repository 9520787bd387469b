//! Definition violations.

use thiserror::Error;

/// Problems found in a machine definition before it is run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionViolation {
    #[error("State '{state}' is configured more than once")]
    DuplicateState { state: String },

    #[error("Transition '{symbol}' from '{from}' targets unknown state '{to}'")]
    UnknownTarget {
        from: String,
        symbol: String,
        to: String,
    },

    #[error("Mapping on '{symbol}' from '{from}' produces {produced} but '{to}' expects {expected}")]
    MappingMismatch {
        from: String,
        symbol: String,
        to: String,
        produced: String,
        expected: String,
    },

    #[error("Initial state '{state}' is not configured")]
    UnknownInitialState { state: String },

    #[error("Initial parameters do not fit state '{state}': {reason}")]
    InitialParameters { state: String, reason: String },
}
