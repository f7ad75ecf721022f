use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use worldforge_common::TemplateId;

/// What a declared template deploys as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    World,
    Executor,
    Component,
    System,
}

impl TemplateKind {
    fn tag(self) -> u8 {
        match self {
            Self::World => 0,
            Self::Executor => 1,
            Self::Component => 2,
            Self::System => 3,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::World => "world",
            Self::Executor => "executor",
            Self::Component => "component",
            Self::System => "system",
        };
        f.write_str(s)
    }
}

/// A declared code template.
///
/// Component and system templates carry the name they register under inside a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub kind: TemplateKind,
    pub name: String,
}

impl Template {
    pub fn world(name: impl Into<String>) -> Self {
        Self {
            kind: TemplateKind::World,
            name: name.into(),
        }
    }

    pub fn executor(name: impl Into<String>) -> Self {
        Self {
            kind: TemplateKind::Executor,
            name: name.into(),
        }
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self {
            kind: TemplateKind::Component,
            name: name.into(),
        }
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self {
            kind: TemplateKind::System,
            name: name.into(),
        }
    }

    /// Content-addressed id: identical declarations share an id.
    pub fn content_id(&self) -> TemplateId {
        let mut hasher = Sha256::new();
        hasher.update([self.kind.tag()]);
        hasher.update(self.name.as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        // Zero is reserved for "null".
        TemplateId(u64::from_le_bytes(bytes).max(1))
    }
}
