//! Builder API for machine definitions.
//!
//! This module provides fluent builders for states, transitions and the
//! machine itself. Callbacks are written against typed parameter tuples and
//! erased into the definition's callback types here.
//!
//! # Example
//!
//! ```rust
//! use phaseline::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//!
//! let definition = MachineBuilder::<&str, &str>::new()
//!     .initial("Counting", (0_u32,))
//!     .state(
//!         StateBuilder::new("Counting")
//!             .params::<(u32,)>()
//!             .transition(
//!                 TransitionBuilder::new("finish", "Done")
//!                     .when::<(u32,), _>(|(count,)| count >= 3)
//!                     .map(|(count,): (u32,)| (format!("counted {count}"),)),
//!             ),
//!     )
//!     .state(StateBuilder::new("Done").params::<(String,)>())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(definition.states().len(), 2);
//! ```

pub mod error;
pub mod machine;
pub mod state;
pub mod transition;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use state::StateBuilder;
pub use transition::TransitionBuilder;
