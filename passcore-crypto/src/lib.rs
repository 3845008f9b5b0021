//! Encryption layer for passcore.
//!
//! Provides the leaf primitives of the key hierarchy:
//! - `EncryptionKey`: 256-bit secrets zeroed on drop
//! - XChaCha20-Poly1305 content cipher with domain-separation tags
//! - Scoped `EncryptionContext`s handed out by an `EncryptionContextProvider`
//! - X25519 envelopes and Ed25519 signing keys for vault sharing
//! - Argon2id passphrase protection for keys at rest
//!
//! # Architecture
//!
//! Callers never hold a long-lived cipher. They ask the provider for a
//! context scoped to one user; the provider resolves the user's master key,
//! runs the caller's closure, and zeroes its copy of the key afterwards:
//!
//! ```no_run
//! use std::sync::Arc;
//! use passcore_crypto::{EncryptionContextProvider, EncryptionKey, EncryptionTag, SessionKeyStore};
//! use passcore_types::UserId;
//!
//! let user = UserId::new();
//! let sessions = Arc::new(SessionKeyStore::new());
//! sessions.unlock(user, EncryptionKey::generate());
//!
//! let provider = EncryptionContextProvider::new(sessions, user);
//! let sealed = provider
//!     .with_context(|ctx| ctx.encrypt("note", Some(EncryptionTag::ItemContent)))
//!     .unwrap()
//!     .unwrap();
//! ```

mod cipher;
mod context;
pub mod envelope;
mod error;
mod key;
pub mod provider;
pub mod signing;

pub use cipher::{
    EncryptedBytes, EncryptedString, EncryptionTag, NONCE_SIZE, TAG_SIZE, decrypt, decrypt_bound,
    decrypt_string, encrypt, encrypt_bound, encrypt_string,
};
pub use context::{EncryptionContext, with_key_scope};
pub use envelope::{
    PassphraseProtectedKey, SealedEnvelope, UserKeyPair, decrypt_private_key, encrypt_private_key,
    open_key, protect_key, protect_key_bound, public_key_fingerprint, seal_key, unprotect_key,
    unprotect_key_bound,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    EncryptionKey, KEY_SIZE, KdfParams, SALT_SIZE, Salt, derive_key, generate_random_key,
};
pub use provider::{
    AsyncMasterKeySource, EncryptionContextProvider, MasterKeySource, SessionKeyStore,
};
pub use signing::{SIGNATURE_SIZE, SigningKeyPair, SigningPublicKey};

/// Re-exported so downstream crates name X25519 keys without a direct dependency.
pub use crypto_box::{PublicKey, SecretKey};
