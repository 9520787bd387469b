//! Core value types shared by the model and the engine.
//!
//! This module contains the leaves of the runtime:
//! - State and symbol value traits
//! - Typed parameter tuples and the previous/current/next slots
//! - The lifecycle phase
//! - The error-handler chain applied to callback failures

mod handling;
mod params;
mod phase;
mod slots;
mod state;

pub use handling::{is_cancellation, Cancelled, ErrorAction, ErrorHandler, ErrorHandling};
pub use params::{
    FromParams, IntoParams, Param, ParamError, ParamTuple, ParamType, Params, Signature, MAX_ARITY,
};
pub use phase::Phase;
pub use slots::ParameterSlots;
pub use state::{StateValue, SymbolValue};

pub(crate) use state::describe;
