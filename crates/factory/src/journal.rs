use serde::{Deserialize, Serialize};
use worldforge_common::{InstanceHandle, TemplateId};
use worldforge_kernel::{Deployer, WorldDispatch};

/// Notifications the factory publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactoryEvent {
    WorldCreated { handle: InstanceHandle },
}

/// One side effect a spawn applied to the ledger. Each carries enough
/// context to be reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Deployed {
        handle: InstanceHandle,
    },
    ComponentRegistered {
        world: InstanceHandle,
        template: TemplateId,
    },
    SystemRegistered {
        world: InstanceHandle,
        template: TemplateId,
    },
}

/// A compensating action that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not undo {effect:?}: {reason}")]
pub struct RollbackFailure {
    pub effect: Effect,
    pub reason: String,
}

/// Records the effects of an in-flight spawn and stages its notifications.
///
/// On success `commit` releases the staged notifications. On failure
/// `unwind` reverses every recorded effect, newest first, and discards them.
#[derive(Debug, Default)]
pub struct SpawnJournal {
    effects: Vec<Effect>,
    outbox: Vec<FactoryEvent>,
}

impl SpawnJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn stage(&mut self, event: FactoryEvent) {
        self.outbox.push(event);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn staged(&self) -> &[FactoryEvent] {
        &self.outbox
    }

    /// Accept every recorded effect and hand back the staged notifications.
    pub fn commit(self) -> Vec<FactoryEvent> {
        self.outbox
    }

    /// Reverse all recorded effects. Staged notifications are dropped.
    /// Returns the compensations that failed; empty means a clean rollback.
    pub fn unwind<H>(self, host: &mut H) -> Vec<RollbackFailure>
    where
        H: Deployer + WorldDispatch + ?Sized,
    {
        let mut failures = Vec::new();
        for effect in self.effects.into_iter().rev() {
            let result = match effect {
                Effect::Deployed { handle } => host.undeploy(handle).map_err(|e| e.to_string()),
                Effect::ComponentRegistered { world, template } => host
                    .unregister_component(world, template)
                    .map_err(|e| e.to_string()),
                Effect::SystemRegistered { world, template } => host
                    .unregister_system(world, template)
                    .map_err(|e| e.to_string()),
            };
            match result {
                Ok(()) => tracing::debug!(?effect, "reverted"),
                Err(reason) => {
                    tracing::error!(?effect, %reason, "compensation failed");
                    failures.push(RollbackFailure { effect, reason });
                }
            }
        }
        failures
    }
}
