//! Phaseline: an embeddable async finite state machine runtime
//!
//! A machine is configured once through the [`builder`] and then driven by
//! the [`engine`]. Every state declares a typed parameter list; transitions
//! stage the target's parameters, run guard conditions on both sides of the
//! move, and only commit them once the target's entry hooks succeed.
//!
//! # Core Concepts
//!
//! - **Phases**: Every step of the lifecycle is observable as a [`Phase`]
//! - **Parameters**: Typed tuples checked against each state's signature
//! - **Error handling**: An ordered handler chain decides what callback failures raise
//! - **Recovery**: A failure after leaving a state parks the machine instead of corrupting it
//!
//! # Example
//!
//! ```rust
//! use phaseline::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use phaseline::{Phase, StateMachine};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let definition = MachineBuilder::new()
//!     .initial("Waiting", (42_i32,))
//!     .state(
//!         StateBuilder::new("Waiting")
//!             .params::<(i32,)>()
//!             .transition(
//!                 TransitionBuilder::new("render", "Shown")
//!                     .map(|(value,): (i32,)| (value.to_string(),)),
//!             ),
//!     )
//!     .state(StateBuilder::new("Shown").params::<(String,)>())
//!     .build()?;
//!
//! let machine = StateMachine::new(definition);
//! let token = CancellationToken::new();
//!
//! machine.activate(&token).await?;
//! machine.transition("render", (), &token).await?;
//!
//! assert_eq!(machine.current_state(), Some("Shown"));
//! assert_eq!(machine.current::<(String,)>()?, ("42".to_string(),));
//! assert_eq!(machine.phase(), Phase::Active);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod engine;
pub mod error;
pub mod model;
pub mod validation;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, StateBuilder, TransitionBuilder};
pub use core::{Cancelled, ErrorAction, IntoParams, Params, Phase};
pub use engine::{MachineHandle, StateMachine, Trigger};
pub use error::EngineError;
pub use model::ActionMode;
