//! Background actions started when a state is entered.

use super::machine::{MachineHandle, StateMachine};
use crate::core::{ErrorHandling, FromParams, ParamError, Params, StateValue, SymbolValue};
use crate::error::EngineError;
use crate::model::Action;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Argument of a state action.
pub struct ActionContext<S, T> {
    /// The state whose entry started the action.
    pub state: S,
    /// The state's parameters.
    pub params: Params,
    /// Cancelled when the state is exited (detached mode), or the entering
    /// operation's token (inline mode).
    pub token: CancellationToken,
    pub(crate) handle: MachineHandle<S, T>,
}

impl<S: StateValue, T: SymbolValue> ActionContext<S, T> {
    pub fn params<P: FromParams>(&self) -> Result<P, ParamError> {
        self.params.get()
    }

    /// The owning machine, unless it has been dropped.
    ///
    /// An action may drive its own machine. Pass `self.token` to the call so
    /// that a concurrent exit of this state can cancel the wait for the
    /// machine.
    pub fn machine(&self) -> Option<StateMachine<S, T>> {
        self.handle.upgrade()
    }
}

impl<S: Clone, T> Clone for ActionContext<S, T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            params: self.params.clone(),
            token: self.token.clone(),
            handle: self.handle.clone(),
        }
    }
}

/// A detached action retained until its state exits.
pub(crate) struct RunningAction {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<Result<(), EngineError>>,
}

impl RunningAction {
    pub(crate) fn is_current_task(&self) -> bool {
        tokio::task::try_id() == Some(self.task.id())
    }

    /// Cancel the action and wait for it to finish.
    ///
    /// Errors the action raised (after the handler chain) surface here;
    /// its own cancellation does not.
    pub(crate) async fn stop(self, token: &CancellationToken) -> Result<(), EngineError> {
        self.cancel.cancel();
        let mut task = self.task;
        tokio::select! {
            joined = &mut task => match joined {
                Ok(result) => result,
                Err(join_error) if join_error.is_cancelled() => Ok(()),
                Err(join_error) => Err(EngineError::Failed(anyhow::anyhow!(
                    "state action panicked: {join_error}"
                ))),
            },
            _ = token.cancelled() => Err(EngineError::Cancelled),
        }
    }
}

/// Spawn `actions` in order on a fresh task.
pub(crate) fn spawn<S: StateValue, T: SymbolValue>(
    handling: ErrorHandling,
    actions: Vec<Action<S, T>>,
    context: ActionContext<S, T>,
) -> JoinHandle<Result<(), EngineError>> {
    tokio::spawn(async move {
        for action in actions {
            let token = context.token.clone();
            let outcome = handling
                .run_with_handling(action(context.clone()), &token, true)
                .await?;
            if outcome.is_none() {
                tracing::debug!(state = ?context.state, "state action cancelled");
                break;
            }
        }
        Ok(())
    })
}

/// Run `actions` in order on the caller's task.
pub(crate) async fn run_inline<S: StateValue, T: SymbolValue>(
    handling: &ErrorHandling,
    actions: &[Action<S, T>],
    context: ActionContext<S, T>,
) -> Result<(), EngineError> {
    let token = context.token.clone();
    for action in actions {
        handling.run(action(context.clone()), &token).await?;
    }
    Ok(())
}
