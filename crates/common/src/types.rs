use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when an identifier string is not a valid hex or decimal number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier {input:?}: expected 0x-prefixed hex or decimal u64")]
pub struct IdParseError {
    pub input: String,
}

fn parse_u64(input: &str) -> Result<u64, IdParseError> {
    let trimmed = input.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| IdParseError {
        input: input.to_string(),
    })
}

/// Declares an opaque `u64` identifier that prints and (de)serializes as hex.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub u64);

        impl $name {
            /// The zero value, never a valid deployed identifier.
            pub const NULL: Self = Self(0);

            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_u64(s).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

hex_id!(
    /// Identifier of a declared, deployable template (world, executor, component or system).
    TemplateId
);

hex_id!(
    /// Address of a deployed instance (a world or an executor).
    InstanceHandle
);

/// A single constructor argument passed to the deployment mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructorArg {
    Name(String),
    Handle(InstanceHandle),
    Value(u64),
}

impl ConstructorArg {
    /// Stable byte encoding used when deriving instance addresses.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Name(name) => {
                out.push(0);
                out.extend_from_slice(&(name.len() as u64).to_le_bytes());
                out.extend_from_slice(name.as_bytes());
            }
            Self::Handle(handle) => {
                out.push(1);
                out.extend_from_slice(&handle.0.to_le_bytes());
            }
            Self::Value(value) => {
                out.push(2);
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_hex() {
        assert_eq!(TemplateId(0x420).to_string(), "0x420");
        assert_eq!(InstanceHandle(0x69).to_string(), "0x69");
    }

    #[test]
    fn parse_hex_and_decimal() {
        assert_eq!("0x420".parse::<TemplateId>().unwrap(), TemplateId(0x420));
        assert_eq!("105".parse::<InstanceHandle>().unwrap(), InstanceHandle(105));
        assert!("0xzz".parse::<TemplateId>().is_err());
        assert!("".parse::<InstanceHandle>().is_err());
    }

    #[test]
    fn serde_uses_hex_strings() {
        let json = serde_json::to_string(&TemplateId(0x420)).unwrap();
        assert_eq!(json, "\"0x420\"");
        let back: InstanceHandle = serde_json::from_str("\"0x69\"").unwrap();
        assert_eq!(back, InstanceHandle(0x69));
    }

    #[test]
    fn null_detection() {
        assert!(TemplateId::NULL.is_null());
        assert!(!InstanceHandle(1).is_null());
    }

    #[test]
    fn encoding_distinguishes_variants() {
        let a = ConstructorArg::Handle(InstanceHandle(7)).encode();
        let b = ConstructorArg::Value(7).encode();
        assert_ne!(a, b);
    }
}
