//! Error types for the key engine.

use passcore_types::{RotationId, ShareId, UserId, VaultId};
use thiserror::Error;

/// Result type for key engine operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while encrypting, wrapping or distributing keys.
///
/// Messages carry opaque identifiers only. Plaintext, key bytes and
/// ciphertext never appear here.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authentication failed (wrong key, tampered data or mismatched domain tag)")]
    AuthenticationFailed,

    #[error("invalid key packet: {0}")]
    InvalidKeyPacket(String),

    #[error("vault {vault_id} has no local key for rotation {rotation_id}")]
    MissingRotation {
        vault_id: VaultId,
        rotation_id: RotationId,
    },

    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(
        "rotation conflict for vault {vault_id}: expected generation {expected}, found {found}"
    )]
    RotationConflict {
        vault_id: VaultId,
        expected: u32,
        found: u32,
    },

    #[error("vault {vault_id} has no generation after {rotation}")]
    GenerationExhausted { vault_id: VaultId, rotation: u32 },

    #[error("share {share_id} cannot move from {from} to {to}")]
    InvalidShareTransition {
        share_id: ShareId,
        from: String,
        to: String,
    },

    #[error("vault {vault_id} is already shared with {recipient}")]
    ShareExists { vault_id: VaultId, recipient: UserId },

    #[error("share not found: {0}")]
    ShareNotFound(ShareId),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CryptoError {
    /// Whether the sync layer can recover by fetching missing key material.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CryptoError::MissingRotation { .. } | CryptoError::KeyUnavailable(_)
        )
    }
}
