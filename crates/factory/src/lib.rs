//! World Factory: deploys worlds from a configured template and bulk-registers
//! their initial components and systems.
//!
//! # Invariants
//! - Configuration is set exactly once and read by every spawn; admin changes
//!   only affect worlds spawned afterwards.
//! - A spawn registers every requested module or leaves no trace: no world,
//!   no registrations, no `WorldCreated` notification.
//! - Every registration is charged against a step budget before it is dispatched.

mod config;
mod error;
mod factory;
mod journal;
mod meter;
pub mod registration;

pub use config::{ConfigStore, FactoryConfig, FactorySettings};
pub use error::{FactoryError, RegistrationError, SpawnError};
pub use factory::{SpawnRequest, WorldFactory};
pub use journal::{Effect, FactoryEvent, RollbackFailure, SpawnJournal};
pub use meter::{DEFAULT_STEP_LIMIT, Exhausted, MeteringPolicy, StepMeter};
pub use registration::{ModuleKind, register_all};
