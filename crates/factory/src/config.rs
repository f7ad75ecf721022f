use serde::{Deserialize, Serialize};
use worldforge_common::{InstanceHandle, TemplateId};

use crate::error::FactoryError;
use crate::meter::MeteringPolicy;

/// The template and executor every future spawn uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    pub world_template_id: TemplateId,
    pub executor_handle: InstanceHandle,
}

/// Owned configuration store. Empty until `initialize` runs; every read or
/// write before that fails with [`FactoryError::NotInitialized`].
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    current: Option<FactoryConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-time setup of both fields.
    pub fn initialize(
        &mut self,
        world_template_id: TemplateId,
        executor_handle: InstanceHandle,
    ) -> Result<(), FactoryError> {
        if self.current.is_some() {
            return Err(FactoryError::AlreadyInitialized);
        }
        check_template(world_template_id)?;
        check_executor(executor_handle)?;
        self.current = Some(FactoryConfig {
            world_template_id,
            executor_handle,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.current.is_some()
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> Result<FactoryConfig, FactoryError> {
        self.current.ok_or(FactoryError::NotInitialized)
    }

    pub fn get_executor(&self) -> Result<InstanceHandle, FactoryError> {
        Ok(self.get()?.executor_handle)
    }

    pub fn get_world_template(&self) -> Result<TemplateId, FactoryError> {
        Ok(self.get()?.world_template_id)
    }

    pub fn set_executor(&mut self, executor_handle: InstanceHandle) -> Result<(), FactoryError> {
        check_executor(executor_handle)?;
        let config = self.current.as_mut().ok_or(FactoryError::NotInitialized)?;
        config.executor_handle = executor_handle;
        Ok(())
    }

    pub fn set_world_template(&mut self, world_template_id: TemplateId) -> Result<(), FactoryError> {
        check_template(world_template_id)?;
        let config = self.current.as_mut().ok_or(FactoryError::NotInitialized)?;
        config.world_template_id = world_template_id;
        Ok(())
    }
}

fn check_template(id: TemplateId) -> Result<(), FactoryError> {
    if id.is_null() {
        return Err(FactoryError::NullIdentifier("world template"));
    }
    Ok(())
}

fn check_executor(handle: InstanceHandle) -> Result<(), FactoryError> {
    if handle.is_null() {
        return Err(FactoryError::NullIdentifier("executor"));
    }
    Ok(())
}

/// Runtime settings that are not part of the administrative config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorySettings {
    #[serde(default)]
    pub metering: MeteringPolicy,
}
