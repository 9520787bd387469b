//! Validation of machine definitions.
//!
//! Definitions are checked with Stillwater's `Validation` type so that every
//! problem is reported in one pass instead of stopping at the first:
//!
//! - Each state is configured once
//! - Every transition targets a configured state
//! - A mapping produces exactly the target's declared parameters
//! - A fixed initial state exists and its parameters fit
//!
//! [`MachineBuilder::build`](crate::builder::MachineBuilder::build) runs
//! these checks; they are exposed for definitions assembled elsewhere.
//!
//! # Example
//!
//! ```rust
//! use phaseline::builder::{BuildError, MachineBuilder, StateBuilder, TransitionBuilder};
//!
//! let result = MachineBuilder::<&str, &str>::new()
//!     .initial("Idle", ())
//!     .state(StateBuilder::new("Idle").transition(TransitionBuilder::new("start", "Running")))
//!     .build();
//!
//! assert!(matches!(result, Err(BuildError::Invalid(violations)) if violations.len() == 1));
//! ```

pub mod rules;
pub mod violations;

pub use rules::validate;
pub use violations::DefinitionViolation;
