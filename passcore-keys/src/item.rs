//! Plaintext content model for items and vaults.
//!
//! These are the values that end up inside `ItemContent` and `VaultContent`
//! ciphertexts. They only exist in memory while a key scope is open.

use crate::codec::{KIND_ITEM, KIND_VAULT_METADATA, decode_versioned, encode_versioned};
use passcore_crypto::CryptoResult;
use serde::{Deserialize, Serialize};

/// A user-defined extra field on an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomField {
    Text { name: String, value: String },
    Hidden { name: String, value: String },
    Totp { name: String, uri: String },
}

/// Type-specific payload of an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Login {
        username: String,
        password: String,
        urls: Vec<String>,
        totp_uri: Option<String>,
    },
    Note,
    Alias {
        alias_email: String,
    },
    Password {
        password: String,
    },
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Login { .. } => "login",
            ItemKind::Note => "note",
            ItemKind::Alias { .. } => "alias",
            ItemKind::Password { .. } => "password",
        }
    }
}

/// Decrypted contents of one item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub note: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

impl Item {
    pub fn note(title: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            note: note.into(),
            kind: ItemKind::Note,
            custom_fields: Vec::new(),
        }
    }

    pub fn login(
        title: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            note: String::new(),
            kind: ItemKind::Login {
                username: username.into(),
                password: password.into(),
                urls: Vec::new(),
                totp_uri: None,
            },
            custom_fields: Vec::new(),
        }
    }

    pub fn to_wire(&self) -> CryptoResult<Vec<u8>> {
        encode_versioned(KIND_ITEM, self)
    }

    pub fn from_wire(bytes: &[u8]) -> CryptoResult<Self> {
        decode_versioned(KIND_ITEM, bytes)
    }
}

/// Decrypted vault name, description and display color.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub name: String,
    pub description: String,
    pub color: Option<String>,
}

impl VaultMetadata {
    pub fn to_wire(&self) -> CryptoResult<Vec<u8>> {
        encode_versioned(KIND_VAULT_METADATA, self)
    }

    pub fn from_wire(bytes: &[u8]) -> CryptoResult<Self> {
        decode_versioned(KIND_VAULT_METADATA, bytes)
    }
}
