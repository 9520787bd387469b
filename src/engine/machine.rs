//! The execution engine: activation, transitions and deactivation.

use super::action::{self, ActionContext, RunningAction};
use super::resolve::{Resolution, Resolver};
use super::snapshot::{MachineSnapshot, TransitionRecord};
use crate::core::{
    describe, FromParams, IntoParams, ParamError, ParameterSlots, Params, Phase, StateValue,
    SymbolValue,
};
use crate::error::EngineError;
use crate::model::{
    ActionMode, Hook, HookContext, InitialState, MachineDefinition, StateChange, StateDefinition,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// How a transition operation treats the resolution result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lookup {
    /// `transition`: a missing match is an error.
    Required,
    /// `try_transition`: a missing match returns `false`.
    Optional,
    /// `can_transition`: resolve only, never commit.
    Peek,
}

/// Where a transition or deactivation starts from.
#[derive(Clone, Debug)]
struct Anchor<S, T> {
    state: S,
    /// The state's parameters.
    params: Params,
    /// Whether the state's exit hooks completed before a failure.
    exited: bool,
    /// An entry that failed after the state was left.
    pending: Option<PendingEntry<S, T>>,
}

/// Target of a failed entry, completed by the next transition.
#[derive(Clone, Debug)]
struct PendingEntry<S, T> {
    symbol: T,
    state: S,
    params: Params,
}

struct Core<S, T> {
    phase: Phase,
    current: Option<S>,
    previous: Option<S>,
    next: Option<S>,
    slots: ParameterSlots,
    recovery: Option<Anchor<S, T>>,
    action: Option<RunningAction>,
    disposed: bool,
    activated_at: Option<DateTime<Utc>>,
    transition_count: u64,
    last_transition: Option<TransitionRecord<S, T>>,
}

impl<S, T> Default for Core<S, T> {
    fn default() -> Self {
        Self {
            phase: Phase::Inactive,
            current: None,
            previous: None,
            next: None,
            slots: ParameterSlots::new(),
            recovery: None,
            action: None,
            disposed: false,
            activated_at: None,
            transition_count: 0,
            last_transition: None,
        }
    }
}

struct Inner<S, T> {
    id: Uuid,
    definition: MachineDefinition<S, T>,
    /// Serializes public operations. Held across callback awaits.
    gate: tokio::sync::Mutex<()>,
    /// Engine state. Never held across an await.
    core: parking_lot::Mutex<Core<S, T>>,
}

impl<S, T> Drop for Inner<S, T> {
    fn drop(&mut self) {
        if let Some(running) = self.core.get_mut().action.take() {
            running.cancel.cancel();
        }
    }
}

/// A running finite state machine.
///
/// Cloning is cheap and yields another handle to the same machine. All
/// operations take the machine's async gate for their duration, except
/// that entering a state releases the gate before its actions start, so an
/// action may call back into the machine.
///
/// # Example
///
/// ```rust
/// use phaseline::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
/// use phaseline::engine::StateMachine;
/// use phaseline::core::Phase;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let definition = MachineBuilder::new()
///     .initial("A", ())
///     .state(StateBuilder::new("A").transition(TransitionBuilder::new("go", "B")))
///     .state(StateBuilder::new("B"))
///     .build()?;
///
/// let machine = StateMachine::new(definition);
/// let token = CancellationToken::new();
///
/// machine.activate(&token).await?;
/// assert_eq!(machine.current_state(), Some("A"));
///
/// machine.transition("go", (), &token).await?;
/// assert_eq!(machine.current_state(), Some("B"));
///
/// machine.deactivate(&token).await?;
/// assert_eq!(machine.phase(), Phase::Inactive);
/// # Ok(())
/// # }
/// ```
pub struct StateMachine<S, T> {
    inner: Arc<Inner<S, T>>,
}

impl<S, T> Clone for StateMachine<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Weak handle to a machine, given to actions and triggers.
pub struct MachineHandle<S, T> {
    inner: Weak<Inner<S, T>>,
}

impl<S, T> Clone for MachineHandle<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, T> MachineHandle<S, T> {
    pub fn upgrade(&self) -> Option<StateMachine<S, T>> {
        self.inner.upgrade().map(|inner| StateMachine { inner })
    }
}

impl<S: StateValue, T: SymbolValue> StateMachine<S, T> {
    pub fn new(definition: MachineDefinition<S, T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                definition,
                gate: tokio::sync::Mutex::new(()),
                core: parking_lot::Mutex::new(Core::default()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn definition(&self) -> &MachineDefinition<S, T> {
        &self.inner.definition
    }

    pub fn handle(&self) -> MachineHandle<S, T> {
        MachineHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Resolve the initial state and enter it.
    ///
    /// Only allowed while `Inactive`. If anything fails before the initial
    /// state is entered, the machine is reset to `Inactive`.
    pub async fn activate(&self, token: &CancellationToken) -> Result<(), EngineError> {
        let span = tracing::debug_span!("activate", machine.id = %self.inner.id);
        self.activate_inner(token).instrument(span).await
    }

    /// Exit the current state and return to `Inactive`.
    ///
    /// From `Recovery`, an entry left pending by a failed transition is
    /// dropped rather than completed.
    pub async fn deactivate(&self, token: &CancellationToken) -> Result<(), EngineError> {
        let span = tracing::debug_span!("deactivate", machine.id = %self.inner.id);
        self.deactivate_inner(token).instrument(span).await
    }

    /// Fire `symbol`, failing with [`EngineError::NoTransition`] when no
    /// transition's conditions pass.
    ///
    /// In `Recovery` after a failed entry, that entry is retried and
    /// committed first, and `symbol` resolves from the entered state.
    pub async fn transition<P: IntoParams>(
        &self,
        symbol: T,
        params: P,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let params = params.into_params();
        let span =
            tracing::debug_span!("transition", machine.id = %self.inner.id, symbol = ?symbol);
        self.drive("transition", symbol, params, token, Lookup::Required)
            .instrument(span)
            .await
            .map(|_| ())
    }

    /// Fire `symbol` if a transition matches; returns whether one did.
    pub async fn try_transition<P: IntoParams>(
        &self,
        symbol: T,
        params: P,
        token: &CancellationToken,
    ) -> Result<bool, EngineError> {
        let params = params.into_params();
        let span =
            tracing::debug_span!("try_transition", machine.id = %self.inner.id, symbol = ?symbol);
        self.drive("try_transition", symbol, params, token, Lookup::Optional)
            .instrument(span)
            .await
    }

    /// Whether firing `symbol` would resolve. Never changes the machine.
    pub async fn can_transition<P: IntoParams>(
        &self,
        symbol: T,
        params: P,
        token: &CancellationToken,
    ) -> Result<bool, EngineError> {
        let params = params.into_params();
        let span =
            tracing::debug_span!("can_transition", machine.id = %self.inner.id, symbol = ?symbol);
        self.drive("can_transition", symbol, params, token, Lookup::Peek)
            .instrument(span)
            .await
    }

    /// Mark the machine disposed and cancel its background action without
    /// waiting for it. Later operations fail with [`EngineError::Disposed`].
    pub fn dispose(&self) {
        let running = {
            let mut core = self.inner.core.lock();
            core.disposed = true;
            core.action.take()
        };
        if let Some(running) = running {
            running.cancel.cancel();
        }
        tracing::debug!(machine.id = %self.inner.id, "machine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.core.lock().disposed
    }

    pub fn phase(&self) -> Phase {
        self.inner.core.lock().phase
    }

    pub fn current_state(&self) -> Option<S> {
        self.inner.core.lock().current.clone()
    }

    pub fn previous_state(&self) -> Option<S> {
        self.inner.core.lock().previous.clone()
    }

    pub fn next_state(&self) -> Option<S> {
        self.inner.core.lock().next.clone()
    }

    pub fn current_parameters(&self) -> Option<Params> {
        self.inner.core.lock().slots.current().cloned()
    }

    pub fn previous_parameters(&self) -> Option<Params> {
        self.inner.core.lock().slots.previous().cloned()
    }

    pub fn next_parameters(&self) -> Option<Params> {
        self.inner.core.lock().slots.next().cloned()
    }

    pub fn current<P: FromParams>(&self) -> Result<P, ParamError> {
        self.inner.core.lock().slots.get_current()
    }

    pub fn previous<P: FromParams>(&self) -> Result<P, ParamError> {
        self.inner.core.lock().slots.get_previous()
    }

    pub fn next<P: FromParams>(&self) -> Result<P, ParamError> {
        self.inner.core.lock().slots.get_next()
    }

    pub fn snapshot(&self) -> MachineSnapshot<S, T> {
        let core = self.inner.core.lock();
        MachineSnapshot {
            id: self.inner.id,
            phase: core.phase,
            current_state: core.current.clone(),
            previous_state: core.previous.clone(),
            next_state: core.next.clone(),
            current_arity: core.slots.current().map(Params::arity),
            activated_at: core.activated_at,
            transition_count: core.transition_count,
            last_transition: core.last_transition.clone(),
            action_running: core.action.is_some(),
        }
    }

    async fn activate_inner(&self, token: &CancellationToken) -> Result<(), EngineError> {
        let gate = self.acquire(token).await?;
        {
            let core = self.inner.core.lock();
            if core.phase != Phase::Inactive {
                return Err(EngineError::InvalidPhase {
                    operation: "activate",
                    phase: core.phase,
                });
            }
        }

        let definition = &self.inner.definition;
        let (state, params) = match &definition.initial {
            InitialState::Fixed { state, params } => (state.clone(), params.clone()),
            InitialState::Provider(provider) => {
                definition
                    .error_handling
                    .run(provider(token.clone()), token)
                    .await?
            }
        };
        let target = definition
            .state(&state)
            .ok_or_else(|| EngineError::UnknownState {
                state: describe(&state),
            })?;
        target.signature.check(&params)?;

        {
            let mut core = self.inner.core.lock();
            core.slots.clear();
            core.slots.set_next(params.clone());
            core.next = Some(state.clone());
            self.set_phase(&mut core, Phase::Active);
            self.set_phase(&mut core, Phase::Idle);
        }

        let entered = async {
            self.run_hooks(&target.on_activate, &state, &params, token)
                .await?;
            self.enter(target, &params, token).await
        }
        .await;

        if let Err(error) = entered {
            let mut core = self.inner.core.lock();
            core.slots.clear();
            core.current = None;
            core.previous = None;
            core.next = None;
            self.set_phase(&mut core, Phase::Inactive);
            tracing::warn!(error = %error, "activation failed");
            return Err(error);
        }

        self.inner.core.lock().activated_at = Some(Utc::now());
        tracing::debug!(state = ?state, "machine activated");

        for trigger in &definition.triggers {
            definition
                .error_handling
                .run(trigger.activate(self.handle(), token.clone()), token)
                .await?;
        }

        self.start_actions(gate, target, state, params, token).await
    }

    async fn deactivate_inner(&self, token: &CancellationToken) -> Result<(), EngineError> {
        let _gate = self.acquire(token).await?;
        let anchor = self.anchor("deactivate")?;
        let definition = &self.inner.definition;
        let source = self.state_definition(&anchor.state)?;
        let params = anchor.params.clone();

        if let Some(pending) = &anchor.pending {
            tracing::debug!(state = ?pending.state, "pending entry dropped by deactivation");
        }

        {
            let mut core = self.inner.core.lock();
            core.slots = ParameterSlots::transitioning(params.clone(), None);
            core.previous = Some(anchor.state.clone());
            core.current = None;
            core.next = None;
        }

        let mut exited = anchor.exited;
        let outcome = async {
            if !exited {
                self.exit(source, &params, token).await?;
                exited = true;
            }
            {
                let mut core = self.inner.core.lock();
                self.set_phase(&mut core, Phase::Exited);
                self.set_phase(&mut core, Phase::Idle);
            }
            self.run_hooks(&source.on_deactivate, &anchor.state, &params, token)
                .await?;
            for trigger in &definition.triggers {
                definition
                    .error_handling
                    .run(trigger.deactivate(token.clone()), token)
                    .await?;
            }
            Ok::<(), EngineError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                let mut core = self.inner.core.lock();
                core.slots.clear();
                core.previous = None;
                core.recovery = None;
                core.activated_at = None;
                self.set_phase(&mut core, Phase::Inactive);
                tracing::debug!(state = ?anchor.state, "machine deactivated");
                Ok(())
            }
            Err(error) => {
                self.recover(Anchor {
                    state: anchor.state,
                    params,
                    exited,
                    pending: None,
                });
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        operation: &'static str,
        symbol: T,
        params: Params,
        token: &CancellationToken,
        lookup: Lookup,
    ) -> Result<bool, EngineError> {
        let gate = self.acquire(token).await?;
        let mut anchor = self.anchor(operation)?;

        // A failed entry is completed before the machine moves on from it
        let mut settled = false;
        if let Some(pending) = anchor.pending.clone() {
            if lookup == Lookup::Peek {
                anchor = Anchor {
                    state: pending.state,
                    params: pending.params,
                    exited: false,
                    pending: None,
                };
            } else {
                self.complete_entry(&anchor, pending, token).await?;
                anchor = self.anchor(operation)?;
                settled = true;
            }
        }
        let source = self.state_definition(&anchor.state)?;

        let mut staging = ParameterSlots::transitioning(anchor.params.clone(), Some(params));
        let resolver = Resolver::new(&self.inner.definition, token);
        let resolved = resolver.resolve(source, &symbol, &staging).await;

        let resolution = match (resolved, lookup) {
            (Ok(found), Lookup::Peek) => return Ok(found.is_some()),
            (Err(error), Lookup::Peek) => return Err(error),
            (Ok(Some(resolution)), _) => resolution,
            (Ok(None), Lookup::Optional) => {
                if settled {
                    self.start_actions(gate, source, anchor.state, anchor.params, token)
                        .await?;
                }
                return Ok(false);
            }
            (Ok(None), Lookup::Required) => {
                let error = EngineError::NoTransition {
                    state: describe(&anchor.state),
                    symbol: describe(&symbol),
                };
                self.recover(anchor);
                return Err(error);
            }
            (Err(error), _) => {
                self.recover(anchor);
                return Err(error);
            }
        };

        let Resolution {
            transition,
            target,
            next,
        } = resolution;
        let to = transition.to.clone();
        let previous = anchor.params.clone();

        {
            let mut core = self.inner.core.lock();
            staging.set_next(next.clone());
            core.slots = staging;
            core.previous = Some(anchor.state.clone());
            core.current = None;
            core.next = Some(to.clone());
        }

        let mut exited = anchor.exited;
        let mut entering = false;
        let outcome = async {
            if !exited {
                self.exit(source, &previous, token).await?;
                exited = true;
            }
            {
                let mut core = self.inner.core.lock();
                self.set_phase(&mut core, Phase::Exited);
                self.set_phase(&mut core, Phase::Transitioning);
            }
            for hook in &source.on_state_change {
                let change = StateChange {
                    from: anchor.state.clone(),
                    symbol: symbol.clone(),
                    to: to.clone(),
                    previous: previous.clone(),
                    next: next.clone(),
                    token: token.clone(),
                };
                self.inner
                    .definition
                    .error_handling
                    .run(hook(change), token)
                    .await?;
            }
            self.set_phase(&mut self.inner.core.lock(), Phase::Transitioned);
            entering = true;
            self.enter(target, &next, token).await
        }
        .await;

        if let Err(error) = outcome {
            let pending = entering.then(|| PendingEntry {
                symbol: symbol.clone(),
                state: to.clone(),
                params: next.clone(),
            });
            self.recover(Anchor {
                state: anchor.state,
                params: previous,
                exited,
                pending,
            });
            return Err(error);
        }

        self.record_transition(anchor.state, symbol, to.clone());
        self.start_actions(gate, target, to, next, token).await?;
        Ok(true)
    }

    /// Finish an entry that failed earlier, leaving the machine `Active`
    /// in the pending state. Its actions start once the machine settles.
    async fn complete_entry(
        &self,
        anchor: &Anchor<S, T>,
        pending: PendingEntry<S, T>,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let target = self.state_definition(&pending.state)?;
        tracing::debug!(state = ?pending.state, "completing failed entry");

        if let Err(error) = self.enter(target, &pending.params, token).await {
            self.recover(anchor.clone());
            return Err(error);
        }
        self.record_transition(anchor.state.clone(), pending.symbol, pending.state);
        Ok(())
    }

    fn record_transition(&self, from: S, symbol: T, to: S) {
        tracing::debug!(from = ?from, symbol = ?symbol, to = ?to, "transition committed");
        let mut core = self.inner.core.lock();
        core.transition_count += 1;
        core.last_transition = Some(TransitionRecord {
            from,
            symbol,
            to,
            timestamp: Utc::now(),
        });
    }

    /// Take the gate, giving up when `token` fires first.
    async fn acquire(&self, token: &CancellationToken) -> Result<MutexGuard<'_, ()>, EngineError> {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let gate = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(EngineError::Cancelled),
            gate = self.inner.gate.lock() => gate,
        };
        if self.inner.core.lock().disposed {
            return Err(EngineError::Disposed);
        }
        Ok(gate)
    }

    fn anchor(&self, operation: &'static str) -> Result<Anchor<S, T>, EngineError> {
        let core = self.inner.core.lock();
        let anchor = match core.phase {
            Phase::Active => core.current.clone().map(|state| Anchor {
                state,
                params: core.slots.current().cloned().unwrap_or_default(),
                exited: false,
                pending: None,
            }),
            Phase::Recovery => core.recovery.clone(),
            _ => None,
        };
        anchor.ok_or(EngineError::InvalidPhase {
            operation,
            phase: core.phase,
        })
    }

    fn state_definition(&self, state: &S) -> Result<&StateDefinition<S, T>, EngineError> {
        self.inner
            .definition
            .state(state)
            .ok_or_else(|| EngineError::UnknownState {
                state: describe(state),
            })
    }

    fn set_phase(&self, core: &mut Core<S, T>, phase: Phase) {
        tracing::trace!(from = %core.phase, to = %phase, "phase");
        core.phase = phase;
    }

    /// Park the machine in `Recovery`.
    ///
    /// The anchor state and its parameters move to the previous side; a
    /// pending entry, if any, stays staged on the next side.
    fn recover(&self, anchor: Anchor<S, T>) {
        let mut core = self.inner.core.lock();
        core.slots = ParameterSlots::transitioning(
            anchor.params.clone(),
            anchor.pending.as_ref().map(|pending| pending.params.clone()),
        );
        core.current = None;
        core.previous = Some(anchor.state.clone());
        core.next = anchor.pending.as_ref().map(|pending| pending.state.clone());
        tracing::warn!(
            state = ?anchor.state,
            exited = anchor.exited,
            pending = ?core.next,
            "machine entered recovery"
        );
        core.recovery = Some(anchor);
        self.set_phase(&mut core, Phase::Recovery);
    }

    async fn run_hooks(
        &self,
        hooks: &[Hook<S>],
        state: &S,
        params: &Params,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        for hook in hooks {
            let context = HookContext {
                state: state.clone(),
                params: params.clone(),
                token: token.clone(),
            };
            self.inner
                .definition
                .error_handling
                .run(hook(context), token)
                .await?;
        }
        Ok(())
    }

    /// Stop the state's background action, then run its exit hooks.
    async fn exit(
        &self,
        source: &StateDefinition<S, T>,
        params: &Params,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let running = {
            let mut core = self.inner.core.lock();
            self.set_phase(&mut core, Phase::Exiting);
            core.action.take()
        };
        if let Some(running) = running {
            if running.is_current_task() {
                // The action is driving this exit itself; it finishes on its own.
                tracing::trace!("state action exits its own state");
            } else {
                running.stop(token).await?;
            }
        }
        self.run_hooks(&source.on_exit, &source.value, params, token)
            .await
    }

    /// Run entry hooks against the staged parameters, then commit them.
    async fn enter(
        &self,
        target: &StateDefinition<S, T>,
        params: &Params,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.set_phase(&mut self.inner.core.lock(), Phase::Entering);
        self.run_hooks(&target.on_entry, &target.value, params, token)
            .await?;

        let mut core = self.inner.core.lock();
        core.slots.commit_transition();
        core.current = Some(target.value.clone());
        core.previous = None;
        core.next = None;
        core.recovery = None;
        self.set_phase(&mut core, Phase::Entered);
        self.set_phase(&mut core, Phase::Active);
        Ok(())
    }

    /// Release the gate and start (or await) the entered state's actions.
    async fn start_actions(
        &self,
        gate: MutexGuard<'_, ()>,
        target: &StateDefinition<S, T>,
        state: S,
        params: Params,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        if target.actions.is_empty() {
            return Ok(());
        }

        let definition = &self.inner.definition;
        match definition.action_mode {
            ActionMode::Detached => {
                {
                    let mut core = self.inner.core.lock();
                    if core.disposed {
                        tracing::debug!(state = ?state, "machine disposed, action not started");
                    } else {
                        let cancel = CancellationToken::new();
                        let context = ActionContext {
                            state,
                            params,
                            token: cancel.clone(),
                            handle: self.handle(),
                        };
                        let task = action::spawn(
                            definition.error_handling.clone(),
                            target.actions.clone(),
                            context,
                        );
                        core.action = Some(RunningAction { cancel, task });
                    }
                }
                drop(gate);
                Ok(())
            }
            ActionMode::Inline => {
                drop(gate);
                if self.is_disposed() {
                    return Ok(());
                }
                let context = ActionContext {
                    state,
                    params,
                    token: token.clone(),
                    handle: self.handle(),
                };
                action::run_inline(&definition.error_handling, &target.actions, context).await
            }
        }
    }
}
