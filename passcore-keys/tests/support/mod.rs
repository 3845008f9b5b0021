//! Shared fixtures for passcore-keys integration tests.

#![allow(dead_code)]

use passcore_crypto::{EncryptionKey, KdfParams};
use passcore_keys::{ItemKey, KeyHierarchy, KeyringConfig, WrappedItemKey, WrappedVaultKey};
use passcore_types::{ItemId, VaultId};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Routes `passcore_keys` logs to the test writer. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("passcore_keys=warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn test_config(rotation_workers: usize) -> KeyringConfig {
    KeyringConfig {
        kdf: fast_kdf(),
        rotation_workers,
    }
}

/// A freshly created vault held in its own hierarchy.
pub struct VaultFixture {
    pub hierarchy: Arc<KeyHierarchy>,
    pub master: EncryptionKey,
    pub vault_id: VaultId,
    pub wrapped_vault_key: WrappedVaultKey,
}

impl VaultFixture {
    pub fn new() -> Self {
        init_tracing();
        let hierarchy = Arc::new(KeyHierarchy::new());
        let master = EncryptionKey::generate();
        let vault_id = VaultId::new();
        let (_, wrapped_vault_key) = hierarchy.create_vault(&master, vault_id).unwrap();
        Self {
            hierarchy,
            master,
            vault_id,
            wrapped_vault_key,
        }
    }

    pub fn add_item(&self) -> (ItemKey, WrappedItemKey) {
        self.hierarchy.create_item_key(self.vault_id, ItemId::new()).unwrap()
    }
}
