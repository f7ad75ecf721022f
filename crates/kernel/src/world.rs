use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use worldforge_common::{InstanceHandle, TemplateId};

use crate::dispatch::DispatchError;

/// An event record produced by every registry mutation inside a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    ComponentRegistered { name: String, template: TemplateId },
    ComponentUnregistered { name: String, template: TemplateId },
    SystemRegistered { name: String, template: TemplateId },
    SystemUnregistered { name: String, template: TemplateId },
}

/// A deployed world: its construction parameters plus the name-to-template
/// registries for components and systems.
///
/// Registries use BTreeMap so iteration order is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldInstance {
    name: String,
    template: TemplateId,
    executor: InstanceHandle,
    components: BTreeMap<String, TemplateId>,
    systems: BTreeMap<String, TemplateId>,
    /// Append-only log of registry mutations.
    #[serde(skip)]
    event_log: Vec<WorldEvent>,
}

impl WorldInstance {
    pub fn new(name: impl Into<String>, template: TemplateId, executor: InstanceHandle) -> Self {
        Self {
            name: name.into(),
            template,
            executor,
            components: BTreeMap::new(),
            systems: BTreeMap::new(),
            event_log: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The world template this instance was deployed from.
    pub fn template(&self) -> TemplateId {
        self.template
    }

    /// The executor this world delegates system execution to.
    pub fn executor(&self) -> InstanceHandle {
        self.executor
    }

    pub fn components(&self) -> &BTreeMap<String, TemplateId> {
        &self.components
    }

    pub fn systems(&self) -> &BTreeMap<String, TemplateId> {
        &self.systems
    }

    pub fn component(&self, name: &str) -> Option<TemplateId> {
        self.components.get(name).copied()
    }

    pub fn system(&self, name: &str) -> Option<TemplateId> {
        self.systems.get(name).copied()
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Register a component template under `name`. Names are unique per world.
    pub fn register_component(
        &mut self,
        name: &str,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        insert_unique(&mut self.components, name, template)?;
        self.event_log.push(WorldEvent::ComponentRegistered {
            name: name.to_string(),
            template,
        });
        Ok(())
    }

    /// Register a system template under `name`. Names are unique per world.
    pub fn register_system(&mut self, name: &str, template: TemplateId) -> Result<(), DispatchError> {
        insert_unique(&mut self.systems, name, template)?;
        self.event_log.push(WorldEvent::SystemRegistered {
            name: name.to_string(),
            template,
        });
        Ok(())
    }

    /// Remove the component registered under `name`, provided it maps to `template`.
    pub fn unregister_component(
        &mut self,
        name: &str,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        remove_matching(&mut self.components, name, template)?;
        self.event_log.push(WorldEvent::ComponentUnregistered {
            name: name.to_string(),
            template,
        });
        Ok(())
    }

    /// Remove the system registered under `name`, provided it maps to `template`.
    pub fn unregister_system(
        &mut self,
        name: &str,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        remove_matching(&mut self.systems, name, template)?;
        self.event_log.push(WorldEvent::SystemUnregistered {
            name: name.to_string(),
            template,
        });
        Ok(())
    }
}

fn insert_unique(
    registry: &mut BTreeMap<String, TemplateId>,
    name: &str,
    template: TemplateId,
) -> Result<(), DispatchError> {
    if let Some(existing) = registry.get(name) {
        return Err(DispatchError::DuplicateName {
            name: name.to_string(),
            existing: *existing,
        });
    }
    registry.insert(name.to_string(), template);
    Ok(())
}

fn remove_matching(
    registry: &mut BTreeMap<String, TemplateId>,
    name: &str,
    template: TemplateId,
) -> Result<(), DispatchError> {
    match registry.get(name) {
        Some(current) if *current == template => {
            registry.remove(name);
            Ok(())
        }
        _ => Err(DispatchError::NotRegistered(template)),
    }
}
