//! Vault key rotation.
//!
//! A rotation generates a new vault key generation and re-wraps every item
//! key under it. Item content is never re-encrypted. Nothing is published
//! until every re-wrap has succeeded, so a failed rotation leaves the
//! hierarchy on its previous generation.

use crate::config::KeyringConfig;
use crate::hierarchy::{KeyHierarchy, VaultKey, WrappedItemKey, WrappedVaultKey};
use passcore_crypto::{CryptoError, CryptoResult, EncryptionKey};
use passcore_types::VaultId;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the caller must persist after a successful rotation.
#[derive(Debug)]
pub struct RotationOutcome {
    pub vault_key: Arc<VaultKey>,
    pub wrapped_vault_key: WrappedVaultKey,
    /// Item keys re-wrapped under the new generation, in input order.
    pub item_keys: Vec<WrappedItemKey>,
    pub previous_generation: u32,
}

/// Rotates vault keys held in a shared [`KeyHierarchy`].
pub struct KeyRotationManager {
    hierarchy: Arc<KeyHierarchy>,
    config: KeyringConfig,
}

impl KeyRotationManager {
    pub fn new(hierarchy: Arc<KeyHierarchy>, config: KeyringConfig) -> Self {
        Self { hierarchy, config }
    }

    pub fn hierarchy(&self) -> &Arc<KeyHierarchy> {
        &self.hierarchy
    }

    /// Rotates `vault_id` to a new generation and re-wraps `item_keys`.
    ///
    /// `item_keys` may be wrapped under any generation the hierarchy holds.
    /// Fails with [`CryptoError::RotationConflict`] if another rotation of
    /// the same vault was published first.
    pub fn rotate(
        &self,
        master: &EncryptionKey,
        vault_id: VaultId,
        item_keys: &[WrappedItemKey],
    ) -> CryptoResult<RotationOutcome> {
        self.rotate_inner(master, None, vault_id, item_keys)
    }

    /// Like [`KeyRotationManager::rotate`], and also wraps the new generation
    /// under `passphrase` with the configured KDF parameters.
    pub fn rotate_with_passphrase(
        &self,
        master: &EncryptionKey,
        passphrase: &str,
        vault_id: VaultId,
        item_keys: &[WrappedItemKey],
    ) -> CryptoResult<RotationOutcome> {
        self.rotate_inner(master, Some(passphrase), vault_id, item_keys)
    }

    fn rotate_inner(
        &self,
        master: &EncryptionKey,
        passphrase: Option<&str>,
        vault_id: VaultId,
        item_keys: &[WrappedItemKey],
    ) -> CryptoResult<RotationOutcome> {
        let current = self.hierarchy.active_vault_key(&vault_id)?;
        let previous_generation = current.rotation;
        let generation = previous_generation
            .checked_add(1)
            .ok_or(CryptoError::GenerationExhausted {
                vault_id,
                rotation: previous_generation,
            })?;
        let next = VaultKey::generate(vault_id, generation);

        let staged = self.rewrap_all(&next, item_keys).and_then(|rewrapped| {
            let wrapped = match passphrase {
                Some(passphrase) => {
                    next.wrap_with_passphrase(master, passphrase, &self.config.kdf)?
                }
                None => next.wrap(master)?,
            };
            Ok((rewrapped, wrapped))
        });

        let (rewrapped, wrapped_vault_key) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                warn!(
                    "rotation of vault {vault_id} aborted, \
                     staying on generation {previous_generation}: {e}"
                );
                return Err(e);
            }
        };

        let vault_key = self
            .hierarchy
            .publish(next, previous_generation)
            .inspect_err(|e| {
                warn!("rotation of vault {vault_id} lost a publish race: {e}");
            })?;

        info!(
            "rotated vault {vault_id} to generation {} ({} item keys re-wrapped)",
            vault_key.rotation,
            rewrapped.len()
        );
        Ok(RotationOutcome {
            vault_key,
            wrapped_vault_key,
            item_keys: rewrapped,
            previous_generation,
        })
    }

    fn rewrap_all(
        &self,
        next: &VaultKey,
        item_keys: &[WrappedItemKey],
    ) -> CryptoResult<Vec<WrappedItemKey>> {
        let workers = self.config.rotation_workers.clamp(1, item_keys.len().max(1));
        if workers == 1 {
            return item_keys
                .iter()
                .map(|wrapped| self.rewrap(next, wrapped))
                .collect();
        }

        let chunk_size = item_keys.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = item_keys
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|wrapped| self.rewrap(next, wrapped))
                            .collect::<CryptoResult<Vec<_>>>()
                    })
                })
                .collect();

            let mut rewrapped = Vec::with_capacity(item_keys.len());
            for handle in handles {
                let chunk = handle.join().map_err(|_| {
                    CryptoError::Encryption("item key re-wrap worker panicked".to_string())
                })??;
                rewrapped.extend(chunk);
            }
            Ok(rewrapped)
        })
    }

    fn rewrap(&self, next: &VaultKey, wrapped: &WrappedItemKey) -> CryptoResult<WrappedItemKey> {
        if wrapped.vault_id != next.vault_id {
            return Err(CryptoError::InvalidKeyPacket(format!(
                "item {} belongs to vault {}, not {}",
                wrapped.item_id, wrapped.vault_id, next.vault_id
            )));
        }
        let item_key = self.hierarchy.unwrap_item_key(wrapped)?;
        next.wrap_item_key(&item_key)
    }
}
