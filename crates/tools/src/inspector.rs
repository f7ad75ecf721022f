use serde::Serialize;
use std::fmt;
use worldforge_common::{InstanceHandle, TemplateId};
use worldforge_kernel::{Instance, Ledger};

/// Ledger inspector for developer tooling.
///
/// Provides read-only queries against the ledger for debugging and CLI output.
pub struct LedgerInspector;

impl LedgerInspector {
    /// Produce a summary of the ledger.
    pub fn summary(ledger: &Ledger) -> LedgerSummary {
        let executors = ledger
            .instances()
            .values()
            .filter(|i| matches!(i, Instance::Executor { .. }))
            .count();
        LedgerSummary {
            templates: ledger.templates().len(),
            instances: ledger.instances().len(),
            worlds: ledger.world_count(),
            executors,
        }
    }

    /// Describe one world: its construction parameters and registries.
    pub fn inspect_world(ledger: &Ledger, handle: InstanceHandle) -> Option<WorldInfo> {
        ledger.world(handle).map(|world| WorldInfo {
            handle,
            name: world.name().to_string(),
            template: world.template(),
            executor: world.executor(),
            components: world
                .components()
                .iter()
                .map(|(name, id)| (name.clone(), *id))
                .collect(),
            systems: world
                .systems()
                .iter()
                .map(|(name, id)| (name.clone(), *id))
                .collect(),
        })
    }

    /// List all world handles in the ledger.
    pub fn list_worlds(ledger: &Ledger) -> Vec<InstanceHandle> {
        ledger.worlds().map(|(handle, _)| handle).collect()
    }
}

/// Summary of ledger state for the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub templates: usize,
    pub instances: usize,
    pub worlds: usize,
    pub executors: usize,
}

impl fmt::Display for LedgerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ledger: templates={} instances={} worlds={} executors={}",
            self.templates, self.instances, self.worlds, self.executors
        )
    }
}

/// Detailed view of one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldInfo {
    pub handle: InstanceHandle,
    pub name: String,
    pub template: TemplateId,
    pub executor: InstanceHandle,
    pub components: Vec<(String, TemplateId)>,
    pub systems: Vec<(String, TemplateId)>,
}

impl fmt::Display for WorldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "World {:?} at {} (template={} executor={})",
            self.name, self.handle, self.template, self.executor
        )?;
        for (name, id) in &self.components {
            writeln!(f, "  component {name} -> {id}")?;
        }
        for (name, id) in &self.systems {
            writeln!(f, "  system    {name} -> {id}")?;
        }
        Ok(())
    }
}
