//! Builder for constructing machine definitions.

use crate::builder::error::BuildError;
use crate::builder::state::StateBuilder;
use crate::core::{ErrorAction, ErrorHandling, IntoParams, Params, StateValue, SymbolValue};
use crate::engine::Trigger;
use crate::model::{ActionMode, BoxFuture, InitialState, MachineDefinition};
use crate::validation::validate;
use std::future::Future;
use std::sync::Arc;
use stillwater::validation::Validation;
use tokio_util::sync::CancellationToken;

/// Builder for machine definitions with a fluent API.
pub struct MachineBuilder<S, T> {
    initial: Option<InitialState<S>>,
    states: Vec<StateBuilder<S, T>>,
    error_handling: ErrorHandling,
    triggers: Vec<Arc<dyn Trigger<S, T>>>,
    action_mode: ActionMode,
}

impl<S: StateValue, T: SymbolValue> MachineBuilder<S, T> {
    pub fn new() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            error_handling: ErrorHandling::new(),
            triggers: Vec::new(),
            action_mode: ActionMode::default(),
        }
    }

    /// Set a fixed initial state and its parameters.
    pub fn initial<P: IntoParams>(mut self, state: S, params: P) -> Self {
        self.initial = Some(InitialState::Fixed {
            state,
            params: params.into_params(),
        });
        self
    }

    /// Resolve the initial state on every activation.
    pub fn initial_with<F, Fut, P>(mut self, provider: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<(S, P)>> + Send + 'static,
        P: IntoParams + Send + 'static,
    {
        self.initial = Some(InitialState::Provider(Arc::new(
            move |token: CancellationToken| -> BoxFuture<'static, anyhow::Result<(S, Params)>> {
                let resolved = provider(token);
                Box::pin(async move {
                    let (state, params) = resolved.await?;
                    Ok((state, params.into_params()))
                })
            },
        )));
        self
    }

    pub fn state(mut self, state: StateBuilder<S, T>) -> Self {
        self.states.push(state);
        self
    }

    /// Append a handler to the error chain.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&anyhow::Error) -> anyhow::Result<ErrorAction> + Send + Sync + 'static,
    {
        self.error_handling.push(handler);
        self
    }

    pub fn trigger(mut self, trigger: Arc<dyn Trigger<S, T>>) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn action_mode(mut self, mode: ActionMode) -> Self {
        self.action_mode = mode;
        self
    }

    /// Build and validate the definition.
    ///
    /// All definition problems are reported together.
    pub fn build(self) -> Result<MachineDefinition<S, T>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        let definition = MachineDefinition {
            states: self.states.into_iter().map(StateBuilder::build).collect(),
            initial,
            error_handling: self.error_handling,
            triggers: self.triggers,
            action_mode: self.action_mode,
        };

        match validate(&definition) {
            Validation::Success(_) => Ok(definition),
            Validation::Failure(violations) => {
                Err(BuildError::Invalid(violations.iter().cloned().collect()))
            }
        }
    }
}

impl<S: StateValue, T: SymbolValue> Default for MachineBuilder<S, T> {
    fn default() -> Self {
        Self::new()
    }
}
