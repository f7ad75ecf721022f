//! Shared identifier types for the worldforge factory.
//!
//! # Invariants
//! - Template identifiers and instance handles are distinct types and never interchange.
//! - The zero value of either type is reserved as "null".

mod types;

pub use types::{ConstructorArg, IdParseError, InstanceHandle, TemplateId};
