//! Builder for constructing states.

use crate::builder::transition::TransitionBuilder;
use crate::core::{ParamTuple, Signature, StateValue, SymbolValue};
use crate::engine::ActionContext;
use crate::model::{
    Action, BoxFuture, Hook, HookContext, StateChange, StateChangeHook, StateDefinition,
};
use std::future::Future;
use std::sync::Arc;

/// Builder for one state: its parameter signature, hooks, actions and
/// outgoing transitions.
///
/// Hooks of the same kind run in the order they are added.
pub struct StateBuilder<S, T> {
    value: S,
    signature: Signature,
    on_activate: Vec<Hook<S>>,
    on_deactivate: Vec<Hook<S>>,
    on_entry: Vec<Hook<S>>,
    on_exit: Vec<Hook<S>>,
    on_state_change: Vec<StateChangeHook<S, T>>,
    actions: Vec<Action<S, T>>,
    transitions: Vec<TransitionBuilder<S, T>>,
}

impl<S: StateValue, T: SymbolValue> StateBuilder<S, T> {
    /// Create a state that takes no parameters.
    pub fn new(value: S) -> Self {
        Self {
            value,
            signature: Signature::of::<()>(),
            on_activate: Vec::new(),
            on_deactivate: Vec::new(),
            on_entry: Vec::new(),
            on_exit: Vec::new(),
            on_state_change: Vec::new(),
            actions: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Declare the parameters the state is entered with.
    pub fn params<P: ParamTuple>(mut self) -> Self {
        self.signature = Signature::of::<P>();
        self
    }

    /// Run when the machine activates into this state.
    pub fn on_activate<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_activate.push(erase_hook(hook));
        self
    }

    /// Run when the machine deactivates out of this state.
    pub fn on_deactivate<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_deactivate.push(erase_hook(hook));
        self
    }

    pub fn on_entry<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_entry.push(erase_hook(hook));
        self
    }

    pub fn on_exit<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_exit.push(erase_hook(hook));
        self
    }

    /// Run between leaving this state and entering the next one.
    pub fn on_state_change<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(StateChange<S, T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_state_change.push(Arc::new(
            move |change: StateChange<S, T>| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(hook(change))
            },
        ));
        self
    }

    /// Background work started once the state has been entered.
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(ActionContext<S, T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.actions.push(Arc::new(
            move |context: ActionContext<S, T>| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(action(context))
            },
        ));
        self
    }

    pub fn transition(mut self, transition: TransitionBuilder<S, T>) -> Self {
        self.transitions.push(transition);
        self
    }

    pub(crate) fn build(self) -> StateDefinition<S, T> {
        let value = self.value;
        let transitions = self
            .transitions
            .into_iter()
            .map(|transition| transition.build(value.clone()))
            .collect();

        StateDefinition {
            value,
            signature: self.signature,
            on_activate: self.on_activate,
            on_deactivate: self.on_deactivate,
            on_entry: self.on_entry,
            on_exit: self.on_exit,
            on_state_change: self.on_state_change,
            actions: self.actions,
            transitions,
        }
    }
}

fn erase_hook<S, F, Fut>(hook: F) -> Hook<S>
where
    S: StateValue,
    F: Fn(HookContext<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(
        move |context: HookContext<S>| -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(hook(context))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_defaults_to_empty_signature() {
        let state: StateDefinition<&str, &str> = StateBuilder::new("A").build();

        assert_eq!(state.value(), &"A");
        assert_eq!(state.signature(), &Signature::of::<()>());
        assert!(!state.has_actions());
        assert!(state.transitions().is_empty());
    }

    #[test]
    fn hooks_are_collected_per_kind() {
        let state: StateDefinition<&str, &str> = StateBuilder::new("A")
            .params::<(i32, String)>()
            .on_activate(|_| async { Ok(()) })
            .on_entry(|_| async { Ok(()) })
            .on_entry(|_| async { Ok(()) })
            .on_exit(|_| async { Ok(()) })
            .on_deactivate(|_| async { Ok(()) })
            .on_state_change(|_| async { Ok(()) })
            .action(|_| async { Ok(()) })
            .build();

        assert_eq!(state.signature().arity(), 2);
        assert_eq!(state.on_activate.len(), 1);
        assert_eq!(state.on_entry.len(), 2);
        assert_eq!(state.on_exit.len(), 1);
        assert_eq!(state.on_deactivate.len(), 1);
        assert_eq!(state.on_state_change.len(), 1);
        assert!(state.has_actions());
    }

    #[test]
    fn transitions_take_the_state_as_source() {
        let state: StateDefinition<&str, &str> = StateBuilder::new("A")
            .transition(TransitionBuilder::new("go", "B"))
            .transition(TransitionBuilder::new("back", "A"))
            .build();

        assert_eq!(state.transitions().len(), 2);
        assert!(state.transitions().iter().all(|t| t.from() == &"A"));
    }

    #[tokio::test]
    async fn erased_hook_receives_context() {
        let state: StateDefinition<&str, &str> = StateBuilder::new("A")
            .params::<(i32,)>()
            .on_entry(|context: HookContext<&str>| async move {
                let (x,) = context.params::<(i32,)>()?;
                anyhow::ensure!(x == 7, "unexpected parameter {x}");
                Ok(())
            })
            .build();

        let hook = &state.on_entry[0];
        let context = HookContext {
            state: "A",
            params: crate::core::IntoParams::into_params((7_i32,)),
            token: tokio_util::sync::CancellationToken::new(),
        };
        assert!(hook(context).await.is_ok());
    }
}
