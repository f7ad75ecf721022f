//! JSON manifest describing templates to declare, the factory configuration,
//! and the worlds to spawn.
//!
//! ```json
//! {
//!   "templates": [
//!     { "id": "0x420", "kind": "world", "name": "world" },
//!     { "kind": "executor", "name": "executor" },
//!     { "kind": "component", "name": "Position" },
//!     { "kind": "system", "name": "Move" }
//!   ],
//!   "world_template": "0x420",
//!   "executor": { "deploy": "executor" },
//!   "settings": { "metering": { "mode": "metered", "step_limit": 100, "cost_per_registration": 1 } },
//!   "spawns": [
//!     { "name": "Arena", "components": ["Position"], "systems": ["Move"] }
//!   ]
//! }
//! ```
//!
//! Spawn entries refer to modules by declared name or by `0x` id.

use serde::{Deserialize, Serialize};
use std::path::Path;
use worldforge_common::{InstanceHandle, TemplateId};
use worldforge_factory::{FactoryError, FactorySettings, SpawnRequest, WorldFactory};
use worldforge_kernel::{DeclareError, DeployError, Deployer, Ledger, Template, TemplateKind};

/// Errors from loading or applying a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("declare failed: {0}")]
    Declare(#[from] DeclareError),
    #[error("executor deployment failed: {0}")]
    Deploy(#[from] DeployError),
    #[error("factory configuration rejected: {0}")]
    Factory(#[from] FactoryError),
    #[error("no {kind} template named {name:?}")]
    UnknownModule { kind: TemplateKind, name: String },
}

/// A template declaration, optionally pinned to an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntry {
    #[serde(default)]
    pub id: Option<TemplateId>,
    #[serde(flatten)]
    pub template: Template,
}

/// Where the executor handle comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorSource {
    /// An already-known handle.
    Handle(InstanceHandle),
    /// Deploy the executor template with this declared name.
    Deploy(String),
}

/// A world to spawn, with modules given by name or id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub name: String,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub systems: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
    pub world_template: TemplateId,
    pub executor: ExecutorSource,
    #[serde(default)]
    pub settings: FactorySettings,
    #[serde(default)]
    pub spawns: Vec<SpawnEntry>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Declare every template, resolve the executor and build an initialized factory.
    pub fn build(&self, ledger: &mut Ledger) -> Result<WorldFactory, ManifestError> {
        for entry in &self.templates {
            match entry.id {
                Some(id) => ledger.declare_at(id, entry.template.clone())?,
                None => {
                    ledger.declare(entry.template.clone());
                }
            }
        }

        let executor = match &self.executor {
            ExecutorSource::Handle(handle) => *handle,
            ExecutorSource::Deploy(name) => {
                let template = find_template(ledger, TemplateKind::Executor, name)?;
                let handle = ledger.deploy(template, &[])?;
                tracing::info!(%handle, %name, "deployed executor");
                handle
            }
        };

        Ok(WorldFactory::with_config(
            self.world_template,
            executor,
            self.settings,
        )?)
    }

    /// Resolve spawn entries against the declared templates.
    pub fn requests(&self, ledger: &Ledger) -> Result<Vec<SpawnRequest>, ManifestError> {
        self.spawns
            .iter()
            .map(|entry| {
                let components = entry
                    .components
                    .iter()
                    .map(|m| resolve_module(ledger, TemplateKind::Component, m))
                    .collect::<Result<Vec<_>, _>>()?;
                let systems = entry
                    .systems
                    .iter()
                    .map(|m| resolve_module(ledger, TemplateKind::System, m))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SpawnRequest::new(entry.name.clone())
                    .with_components(components)
                    .with_systems(systems))
            })
            .collect()
    }
}

fn find_template(ledger: &Ledger, kind: TemplateKind, name: &str) -> Result<TemplateId, ManifestError> {
    ledger
        .templates()
        .iter()
        .find(|(_, t)| t.kind == kind && t.name == name)
        .map(|(id, _)| *id)
        .ok_or_else(|| ManifestError::UnknownModule {
            kind,
            name: name.to_string(),
        })
}

/// An `0x` id is passed through as-is so the ledger can reject it; anything
/// else is looked up by declared name.
fn resolve_module(ledger: &Ledger, kind: TemplateKind, module: &str) -> Result<TemplateId, ManifestError> {
    if module.starts_with("0x") {
        if let Ok(id) = module.parse::<TemplateId>() {
            return Ok(id);
        }
    }
    find_template(ledger, kind, module)
}
