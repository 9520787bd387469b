//! The state/transition model a machine is driven from.
//!
//! Definitions are produced once by the [`builder`](crate::builder) and are
//! immutable afterwards. They only store and look up; invoking the hooks is
//! the engine's job.

mod context;
mod definition;

pub use context::{ConditionContext, HookContext, StateChange};
pub use definition::{
    Action, ActionMode, BoxFuture, Condition, Hook, InitialProvider, InitialState,
    MachineDefinition, Mapping, StateChangeHook, StateDefinition, TransitionDefinition,
};
