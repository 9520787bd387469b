//! The execution engine.
//!
//! [`StateMachine`] drives a [`MachineDefinition`](crate::model::MachineDefinition)
//! through activation, transitions and deactivation with strict phase
//! ordering:
//!
//! - Public operations are serialized by one async gate per machine
//! - Callbacks run sequentially, in registration order, under that gate
//! - Entering a state releases the gate before the state's actions start
//! - A failure after the previous state was left parks the machine in
//!   [`Phase::Recovery`](crate::core::Phase::Recovery)

mod action;
mod machine;
mod resolve;
mod snapshot;
mod trigger;

pub use action::ActionContext;
pub use machine::{MachineHandle, StateMachine};
pub use snapshot::{MachineSnapshot, TransitionRecord};
pub use trigger::Trigger;
