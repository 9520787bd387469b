//! Value traits for state identifiers and transition symbols.
//!
//! The engine never inspects state values or symbols beyond equality and
//! debug formatting, so both traits are blanket-implemented for any type
//! that meets the bounds.

use std::fmt::Debug;

/// Trait for values that identify a state.
///
/// # Required Traits
///
/// - `Clone`: values are copied into observers and contexts
/// - `PartialEq`: states and transitions are looked up by equality
/// - `Debug`: values appear in errors and log events
/// - `Send + Sync + 'static`: values cross into background actions
///
/// # Example
///
/// ```rust
/// use phaseline::core::StateValue;
///
/// #[derive(Clone, PartialEq, Debug)]
/// enum Door {
///     Open,
///     Closed,
/// }
///
/// fn accepts<S: StateValue>(_state: S) {}
///
/// accepts(Door::Open);
/// accepts("closed");
/// ```
pub trait StateValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Trait for transition symbols (the event a caller fires).
pub trait SymbolValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> SymbolValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Render a value for error messages and log fields.
pub(crate) fn describe<V: Debug>(value: &V) -> String {
    format!("{value:?}")
}
