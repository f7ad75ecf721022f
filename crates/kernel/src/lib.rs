//! World Kernel: the ledger that hosts world instances.
//!
//! Provides the two capabilities the factory consumes: a deployment mechanism
//! ([`Deployer`]) and a dispatch surface into live worlds ([`WorldDispatch`]).
//! [`Ledger`] is the in-memory implementation of both.
//!
//! # Invariants
//! - A template must be declared before it can be deployed or registered.
//! - Registration names are unique per world and per registry.
//! - Every registry mutation produces an event record.

mod dispatch;
mod ledger;
mod template;
pub mod world;

pub use dispatch::{DeployError, Deployer, DispatchError, WorldDispatch};
pub use ledger::{DeclareError, Instance, Ledger};
pub use template::{Template, TemplateKind};
pub use world::{WorldEvent, WorldInstance};
