//! Arguments handed to lifecycle callbacks.

use crate::core::{FromParams, ParamError, Params};
use tokio_util::sync::CancellationToken;

/// Argument of activate, deactivate, entry and exit hooks.
#[derive(Clone, Debug)]
pub struct HookContext<S> {
    /// The state the hook belongs to.
    pub state: S,
    /// The state's parameters at the time of the call.
    pub params: Params,
    /// The token of the operation that invoked the hook.
    pub token: CancellationToken,
}

impl<S> HookContext<S> {
    pub fn params<P: FromParams>(&self) -> Result<P, ParamError> {
        self.params.get()
    }
}

/// Argument of state-change hooks, invoked between exit and entry.
#[derive(Clone, Debug)]
pub struct StateChange<S, T> {
    pub from: S,
    pub symbol: T,
    pub to: S,
    pub previous: Params,
    pub next: Params,
    pub token: CancellationToken,
}

impl<S, T> StateChange<S, T> {
    pub fn previous<P: FromParams>(&self) -> Result<P, ParamError> {
        self.previous.get()
    }

    pub fn next<P: FromParams>(&self) -> Result<P, ParamError> {
        self.next.get()
    }
}

/// Argument of transition conditions.
///
/// Previous-side conditions see the exiting state's parameters, next-side
/// conditions see the staged (possibly mapped) target parameters.
#[derive(Clone, Debug)]
pub struct ConditionContext {
    pub params: Params,
    pub token: CancellationToken,
}

impl ConditionContext {
    pub fn params<P: FromParams>(&self) -> Result<P, ParamError> {
        self.params.get()
    }
}
