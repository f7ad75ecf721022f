use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use worldforge_common::{ConstructorArg, InstanceHandle, TemplateId};

use crate::dispatch::{DeployError, DispatchError, Deployer, WorldDispatch};
use crate::template::{Template, TemplateKind};
use crate::world::WorldInstance;

/// Errors from declaring templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeclareError {
    #[error("template id must be non-zero")]
    NullTemplate,
    #[error("template id {0} is already declared with a different template")]
    Conflict(TemplateId),
}

/// A live instance on the ledger.
#[derive(Debug, Clone)]
pub enum Instance {
    Executor { template: TemplateId },
    World(WorldInstance),
}

impl Instance {
    pub fn template(&self) -> TemplateId {
        match self {
            Self::Executor { template } => *template,
            Self::World(world) => world.template(),
        }
    }

    pub fn as_world(&self) -> Option<&WorldInstance> {
        match self {
            Self::World(world) => Some(world),
            Self::Executor { .. } => None,
        }
    }
}

/// In-memory ledger holding declared templates and deployed instances.
///
/// Implements both the deployment mechanism and the world dispatch surface.
/// Instance addresses are derived from a deploy nonce, the template and the
/// constructor calldata, so every deployment gets a fresh handle.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    templates: BTreeMap<TemplateId, Template>,
    instances: BTreeMap<InstanceHandle, Instance>,
    deploy_nonce: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a template under its content-addressed id.
    pub fn declare(&mut self, template: Template) -> TemplateId {
        let id = template.content_id();
        tracing::debug!(%id, kind = %template.kind, name = %template.name, "declared template");
        self.templates.insert(id, template);
        id
    }

    /// Declare a template under a caller-chosen id. Re-declaring the same
    /// template under the same id is a no-op.
    pub fn declare_at(&mut self, id: TemplateId, template: Template) -> Result<(), DeclareError> {
        if id.is_null() {
            return Err(DeclareError::NullTemplate);
        }
        match self.templates.get(&id) {
            Some(existing) if *existing == template => Ok(()),
            Some(_) => Err(DeclareError::Conflict(id)),
            None => {
                tracing::debug!(%id, kind = %template.kind, name = %template.name, "declared template");
                self.templates.insert(id, template);
                Ok(())
            }
        }
    }

    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.get(&id)
    }

    pub fn templates(&self) -> &BTreeMap<TemplateId, Template> {
        &self.templates
    }

    pub fn instance(&self, handle: InstanceHandle) -> Option<&Instance> {
        self.instances.get(&handle)
    }

    pub fn instances(&self) -> &BTreeMap<InstanceHandle, Instance> {
        &self.instances
    }

    pub fn world(&self, handle: InstanceHandle) -> Option<&WorldInstance> {
        self.instances.get(&handle).and_then(Instance::as_world)
    }

    /// All deployed worlds in handle order.
    pub fn worlds(&self) -> impl Iterator<Item = (InstanceHandle, &WorldInstance)> {
        self.instances
            .iter()
            .filter_map(|(handle, instance)| instance.as_world().map(|w| (*handle, w)))
    }

    pub fn world_count(&self) -> usize {
        self.worlds().count()
    }

    fn world_mut(&mut self, handle: InstanceHandle) -> Result<&mut WorldInstance, DispatchError> {
        match self.instances.get_mut(&handle) {
            Some(Instance::World(world)) => Ok(world),
            _ => Err(DispatchError::UnknownWorld(handle)),
        }
    }

    /// Look up a template and check it is of the expected kind; returns its registered name.
    fn module_name(&self, template: TemplateId, expected: TemplateKind) -> Result<String, DispatchError> {
        let decl = self
            .templates
            .get(&template)
            .ok_or(DispatchError::UnknownTemplate(template))?;
        if decl.kind != expected {
            return Err(DispatchError::WrongKind {
                template,
                expected,
                found: decl.kind,
            });
        }
        Ok(decl.name.clone())
    }

    fn next_address(&mut self, template: TemplateId, args: &[ConstructorArg]) -> InstanceHandle {
        loop {
            let candidate = derive_address(self.deploy_nonce, template, args);
            self.deploy_nonce += 1;
            if !candidate.is_null() && !self.instances.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Deployer for Ledger {
    fn deploy(
        &mut self,
        template: TemplateId,
        args: &[ConstructorArg],
    ) -> Result<InstanceHandle, DeployError> {
        let decl = self
            .templates
            .get(&template)
            .ok_or(DeployError::UnknownTemplate(template))?;

        let instance = match decl.kind {
            TemplateKind::World => Instance::World(construct_world(template, args)?),
            TemplateKind::Executor => {
                if !args.is_empty() {
                    return Err(DeployError::ConstructorMismatch {
                        template,
                        reason: format!("executor takes no arguments, got {}", args.len()),
                    });
                }
                Instance::Executor { template }
            }
            kind @ (TemplateKind::Component | TemplateKind::System) => {
                return Err(DeployError::NotDeployable { template, kind });
            }
        };

        let handle = self.next_address(template, args);
        tracing::debug!(%template, %handle, "deployed instance");
        self.instances.insert(handle, instance);
        Ok(handle)
    }

    fn undeploy(&mut self, handle: InstanceHandle) -> Result<(), DeployError> {
        self.instances
            .remove(&handle)
            .ok_or(DeployError::UnknownInstance(handle))?;
        tracing::debug!(%handle, "undeployed instance");
        Ok(())
    }
}

impl WorldDispatch for Ledger {
    fn register_component(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        let name = self.module_name(template, TemplateKind::Component)?;
        self.world_mut(world)?.register_component(&name, template)
    }

    fn register_system(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        let name = self.module_name(template, TemplateKind::System)?;
        self.world_mut(world)?.register_system(&name, template)
    }

    fn unregister_component(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        let name = self.module_name(template, TemplateKind::Component)?;
        self.world_mut(world)?.unregister_component(&name, template)
    }

    fn unregister_system(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError> {
        let name = self.module_name(template, TemplateKind::System)?;
        self.world_mut(world)?.unregister_system(&name, template)
    }

    fn resolve_component(&self, world: InstanceHandle, name: &str) -> Option<TemplateId> {
        self.world(world)?.component(name)
    }

    fn resolve_system(&self, world: InstanceHandle, name: &str) -> Option<TemplateId> {
        self.world(world)?.system(name)
    }
}

/// A world constructor takes exactly `[Name(name), Handle(executor)]`.
fn construct_world(template: TemplateId, args: &[ConstructorArg]) -> Result<WorldInstance, DeployError> {
    match args {
        [ConstructorArg::Name(name), ConstructorArg::Handle(executor)] if !executor.is_null() => {
            Ok(WorldInstance::new(name.clone(), template, *executor))
        }
        [ConstructorArg::Name(_), ConstructorArg::Handle(_)] => Err(DeployError::ConstructorMismatch {
            template,
            reason: "executor handle is null".into(),
        }),
        _ => Err(DeployError::ConstructorMismatch {
            template,
            reason: format!("expected [name, executor], got {args:?}"),
        }),
    }
}

fn derive_address(nonce: u64, template: TemplateId, args: &[ConstructorArg]) -> InstanceHandle {
    let mut hasher = Sha256::new();
    hasher.update(b"worldforge.instance");
    hasher.update(nonce.to_le_bytes());
    hasher.update(template.0.to_le_bytes());
    for arg in args {
        hasher.update(arg.encode());
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    InstanceHandle(u64::from_le_bytes(bytes))
}
