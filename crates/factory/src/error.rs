use worldforge_common::TemplateId;
use worldforge_kernel::{DeployError, DispatchError};

use crate::journal::RollbackFailure;
use crate::registration::ModuleKind;

/// Errors from the configuration store and admin operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("factory is not initialized")]
    NotInitialized,
    #[error("factory is already initialized")]
    AlreadyInitialized,
    #[error("{0} identifier must be non-zero")]
    NullIdentifier(&'static str),
}

/// A bulk registration pass aborted at item `index` of its list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error(
        "out of budget before {kind} #{index} ({template}): needed {needed} steps, {remaining} remaining"
    )]
    OutOfBudget {
        kind: ModuleKind,
        index: usize,
        template: TemplateId,
        needed: u64,
        remaining: u64,
    },
    #[error("{kind} #{index} ({template}) rejected: {source}")]
    RegistrationRejected {
        kind: ModuleKind,
        index: usize,
        template: TemplateId,
        #[source]
        source: DispatchError,
    },
}

/// Errors surfaced by `spawn` and `deploy`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error(transparent)]
    Config(#[from] FactoryError),
    #[error("deployment failed: {0}")]
    DeploymentFailed(#[source] DeployError),
    #[error("registration failed: {0}")]
    RegistrationFailed(#[source] RegistrationError),
    /// The spawn failed and at least one compensating action could not be applied.
    #[error("rollback incomplete after: {cause} ({} compensation(s) failed)", .failures.len())]
    RollbackIncomplete {
        cause: Box<SpawnError>,
        failures: Vec<RollbackFailure>,
    },
}

impl SpawnError {
    /// The failure that triggered the rollback, looking through `RollbackIncomplete`.
    pub fn root_cause(&self) -> &SpawnError {
        match self {
            Self::RollbackIncomplete { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}
