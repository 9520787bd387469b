//! Trigger collaborators started and stopped with the machine.

use super::machine::MachineHandle;
use crate::core::{StateValue, SymbolValue};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Something that fires transitions on its own schedule.
///
/// The machine activates every registered trigger, in registration order,
/// at the end of [`activate`](super::StateMachine::activate) and
/// deactivates them at the end of
/// [`deactivate`](super::StateMachine::deactivate). A trigger keeps the
/// handle it is given and calls back into the machine when its own wait
/// condition fires. Failures go through the machine's error handlers.
#[async_trait]
pub trait Trigger<S: StateValue, T: SymbolValue>: Send + Sync {
    async fn activate(
        &self,
        machine: MachineHandle<S, T>,
        token: CancellationToken,
    ) -> anyhow::Result<()>;

    async fn deactivate(&self, token: CancellationToken) -> anyhow::Result<()>;
}
