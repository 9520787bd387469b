//! Immutable state and transition tables.

use super::context::{ConditionContext, HookContext, StateChange};
use crate::core::{ErrorHandling, Params, Signature, StateValue, SymbolValue};
use crate::engine::{ActionContext, Trigger};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Activate, deactivate, entry or exit hook.
pub type Hook<S> =
    Arc<dyn Fn(HookContext<S>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Hook run while moving from one state to the next.
pub type StateChangeHook<S, T> =
    Arc<dyn Fn(StateChange<S, T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Guard condition of a transition.
pub type Condition =
    Arc<dyn Fn(ConditionContext) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// Maps the exiting state's parameters to the target state's parameters.
pub type Mapping = Arc<dyn Fn(Params) -> anyhow::Result<Params> + Send + Sync>;

/// Background work started when a state is entered.
pub type Action<S, T> =
    Arc<dyn Fn(ActionContext<S, T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Resolves the initial state and its parameters on activation.
pub type InitialProvider<S> =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, anyhow::Result<(S, Params)>> + Send + Sync>;

/// How state actions run once their state has been entered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionMode {
    /// Spawn actions as a background task, cancelled when the state exits.
    #[default]
    Detached,
    /// Await actions before the entering operation returns.
    Inline,
}

/// Where the initial state comes from.
#[derive(Clone)]
pub enum InitialState<S> {
    Fixed { state: S, params: Params },
    Provider(InitialProvider<S>),
}

/// A configured transition.
pub struct TransitionDefinition<S, T> {
    pub(crate) from: S,
    pub(crate) symbol: T,
    pub(crate) to: S,
    pub(crate) previous_conditions: Vec<Condition>,
    pub(crate) next_conditions: Vec<Condition>,
    pub(crate) mapping: Option<Mapping>,
    pub(crate) mapping_output: Option<Signature>,
}

impl<S: StateValue, T: SymbolValue> TransitionDefinition<S, T> {
    pub fn from(&self) -> &S {
        &self.from
    }

    pub fn symbol(&self) -> &T {
        &self.symbol
    }

    pub fn to(&self) -> &S {
        &self.to
    }

    pub fn has_mapping(&self) -> bool {
        self.mapping.is_some()
    }

    /// Declared output of the mapping, when there is one.
    pub fn mapping_output(&self) -> Option<&Signature> {
        self.mapping_output.as_ref()
    }

    pub fn previous_condition_count(&self) -> usize {
        self.previous_conditions.len()
    }

    pub fn next_condition_count(&self) -> usize {
        self.next_conditions.len()
    }
}

/// A configured state with its hooks and outgoing transitions.
pub struct StateDefinition<S, T> {
    pub(crate) value: S,
    pub(crate) signature: Signature,
    pub(crate) on_activate: Vec<Hook<S>>,
    pub(crate) on_deactivate: Vec<Hook<S>>,
    pub(crate) on_entry: Vec<Hook<S>>,
    pub(crate) on_exit: Vec<Hook<S>>,
    pub(crate) on_state_change: Vec<StateChangeHook<S, T>>,
    pub(crate) actions: Vec<Action<S, T>>,
    pub(crate) transitions: Vec<TransitionDefinition<S, T>>,
}

impl<S: StateValue, T: SymbolValue> StateDefinition<S, T> {
    pub fn value(&self) -> &S {
        &self.value
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn transitions(&self) -> &[TransitionDefinition<S, T>] {
        &self.transitions
    }

    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Outgoing transitions for `symbol`, in configuration order.
    pub fn candidates<'a>(
        &'a self,
        symbol: &'a T,
    ) -> impl Iterator<Item = &'a TransitionDefinition<S, T>> + 'a {
        self.transitions.iter().filter(move |t| t.symbol == *symbol)
    }
}

/// The complete, immutable configuration of a machine.
pub struct MachineDefinition<S, T> {
    pub(crate) states: Vec<StateDefinition<S, T>>,
    pub(crate) initial: InitialState<S>,
    pub(crate) error_handling: ErrorHandling,
    pub(crate) triggers: Vec<Arc<dyn Trigger<S, T>>>,
    pub(crate) action_mode: ActionMode,
}

impl<S: StateValue, T: SymbolValue> MachineDefinition<S, T> {
    pub fn states(&self) -> &[StateDefinition<S, T>] {
        &self.states
    }

    pub fn state(&self, value: &S) -> Option<&StateDefinition<S, T>> {
        self.states.iter().find(|s| s.value == *value)
    }

    pub fn initial(&self) -> &InitialState<S> {
        &self.initial
    }

    pub fn error_handling(&self) -> &ErrorHandling {
        &self.error_handling
    }

    pub fn action_mode(&self) -> ActionMode {
        self.action_mode
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// First transition for `symbol` out of `state`, ignoring conditions.
    pub fn lookup_transition(
        &self,
        state: &S,
        symbol: &T,
    ) -> Option<&TransitionDefinition<S, T>> {
        self.state(state)?
            .transitions
            .iter()
            .find(|t| t.symbol == *symbol)
    }
}
