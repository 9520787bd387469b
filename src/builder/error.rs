//! Build errors for machine definitions.

use crate::validation::DefinitionViolation;
use thiserror::Error;

/// Errors that can occur when building a machine definition.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state, params) or .initial_with(provider) before .build()")]
    MissingInitialState,

    #[error("Machine definition has {} violation(s): {}", .0.len(), summarize(.0))]
    Invalid(Vec<DefinitionViolation>),
}

fn summarize(violations: &[DefinitionViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
