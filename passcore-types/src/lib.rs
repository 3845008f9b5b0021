//! Identifier types shared across passcore crates.
//!
//! Identifiers are opaque UUIDs. They are the only values the key engine
//! ever writes into error messages or log lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
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
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Account that owns master keys, signing keys and invite key pairs.
    UserId
);

uuid_id!(
    /// A vault: a named collection of items sharing one key per generation.
    VaultId
);

uuid_id!(
    /// A single secret record inside a vault.
    ItemId
);

uuid_id!(
    /// One (vault, recipient) share.
    ShareId
);

uuid_id!(
    /// Identifies one generation of a vault key.
    ///
    /// Every wrapped item key carries the rotation id it was wrapped under,
    /// so lookups never have to guess a generation.
    RotationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(VaultId::new(), VaultId::new());
        assert_ne!(RotationId::new(), RotationId::new());
    }

    #[test]
    fn display_and_parse_round_trip() {
        let id = ItemId::new();
        let parsed: ItemId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<ShareId>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
