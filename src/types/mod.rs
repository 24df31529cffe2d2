//! Identifier types.
//!
//! Conversations and turns are tagged with TypeID identifiers
//! (`conv_01h455vb4pex5vsknk084sn02q`): human-readable, time-sortable and
//! globally unique. They show up as span fields in the logs and on
//! orchestrator events.

use mti::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string is not a valid identifier of the expected kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidId {
    /// TypeID parsing failed
    Parse(String),
    /// Wrong prefix
    WrongPrefix {
        /// The expected prefix
        expected: &'static str,
        /// The actual prefix found
        actual: String,
    },
}

impl fmt::Display for InvalidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "invalid identifier: {e}"),
            Self::WrongPrefix { expected, actual } => {
                write!(f, "expected prefix '{expected}', got '{actual}'")
            }
        }
    }
}

impl std::error::Error for InvalidId {}

fn parse_with_prefix(s: &str, expected: &'static str) -> Result<MagicTypeId, InvalidId> {
    let id = MagicTypeId::from_str(s).map_err(|e| InvalidId::Parse(e.to_string()))?;
    let prefix = id.prefix().as_str();
    if prefix != expected {
        return Err(InvalidId::WrongPrefix {
            expected,
            actual: prefix.to_string(),
        });
    }
    Ok(id)
}

macro_rules! typeid {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(MagicTypeId);

        impl $name {
            /// The TypeID prefix for this identifier.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new identifier with a fresh UUIDv7.
            #[must_use]
            pub fn new() -> Self {
                Self(Self::PREFIX.create_type_id::<V7>())
            }

            /// Parses an identifier, validating the prefix.
            ///
            /// # Errors
            ///
            /// Returns `InvalidId::Parse` for malformed input and
            /// `InvalidId::WrongPrefix` for an identifier of another kind.
            pub fn parse(s: &str) -> Result<Self, InvalidId> {
                parse_with_prefix(s, Self::PREFIX).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.to_string().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

typeid!(
    /// Identifies one orchestrator's conversation. Format: `conv_...`
    ConversationId,
    "conv"
);

typeid!(
    /// Identifies one user turn within a conversation. Format: `turn_...`
    TurnId,
    "turn"
);
