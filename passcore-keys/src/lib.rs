//! Key hierarchy for passcore vaults.
//!
//! Provides:
//! - Vault key generations wrapping per-item keys (`hierarchy`)
//! - Atomic vault key rotation with parallel item key re-wrapping (`rotation`)
//! - Signed vault key invites and the share lifecycle (`sharing`, `share_registry`)
//! - Plaintext item/vault content and its versioned wire encoding (`item`, `codec`)

pub mod codec;
pub mod config;
pub mod hierarchy;
pub mod item;
pub mod rotation;
pub mod share_registry;
pub mod sharing;

pub use config::KeyringConfig;
pub use hierarchy::{ItemKey, KeyHierarchy, VaultKey, WrappedItemKey, WrappedVaultKey};
pub use item::{CustomField, Item, ItemKind, VaultMetadata};
pub use rotation::{KeyRotationManager, RotationOutcome};
pub use share_registry::{ShareKey, ShareRegistry, ShareState};
pub use sharing::{
    AcceptedKey, EncryptedInviteKey, InviteKeyEntry, ShareKeyDistributor, accept_invite,
    create_invite,
};
