use worldforge_common::{ConstructorArg, InstanceHandle, TemplateId};

use crate::template::TemplateKind;

/// Errors raised by the deployment mechanism.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("template {0} is not declared")]
    UnknownTemplate(TemplateId),
    #[error("template {template} is a {kind} template and cannot be deployed")]
    NotDeployable {
        template: TemplateId,
        kind: TemplateKind,
    },
    #[error("constructor mismatch for template {template}: {reason}")]
    ConstructorMismatch { template: TemplateId, reason: String },
    #[error("no instance deployed at {0}")]
    UnknownInstance(InstanceHandle),
}

/// Errors raised by a world instance when handling a dispatched call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no world deployed at {0}")]
    UnknownWorld(InstanceHandle),
    #[error("template {0} is not declared")]
    UnknownTemplate(TemplateId),
    #[error("template {template} is a {found} template, expected {expected}")]
    WrongKind {
        template: TemplateId,
        expected: TemplateKind,
        found: TemplateKind,
    },
    #[error("name {name:?} is already registered to {existing}")]
    DuplicateName { name: String, existing: TemplateId },
    #[error("template {0} is not registered in this world")]
    NotRegistered(TemplateId),
}

/// The deployment mechanism: turns a declared template plus constructor
/// arguments into a live, addressable instance.
pub trait Deployer {
    /// Deploy a new instance of `template`, returning its handle.
    fn deploy(
        &mut self,
        template: TemplateId,
        args: &[ConstructorArg],
    ) -> Result<InstanceHandle, DeployError>;

    /// Remove a deployed instance. Only used to compensate a failed deployment sequence.
    fn undeploy(&mut self, handle: InstanceHandle) -> Result<(), DeployError>;
}

/// Calls routed into a deployed world instance.
///
/// A world resolves each registered template to the name the template declares,
/// so callers pass template ids in and look names up afterwards.
pub trait WorldDispatch {
    fn register_component(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError>;

    fn register_system(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError>;

    /// Reverse a prior `register_component`.
    fn unregister_component(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError>;

    /// Reverse a prior `register_system`.
    fn unregister_system(
        &mut self,
        world: InstanceHandle,
        template: TemplateId,
    ) -> Result<(), DispatchError>;

    fn resolve_component(&self, world: InstanceHandle, name: &str) -> Option<TemplateId>;

    fn resolve_system(&self, world: InstanceHandle, name: &str) -> Option<TemplateId>;
}
