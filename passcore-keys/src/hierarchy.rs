//! Vault key → item key hierarchy and the in-memory cache of unwrapped
//! vault key generations.
//!
//! A vault key is wrapped under the owning user's master key (tag
//! `VaultKey`). Each item key is wrapped under exactly one vault key
//! generation (tag `ItemKey`) and the wrapped form records which one. Item
//! and vault content is encrypted under item keys (`ItemContent`) and the
//! vault key (`VaultContent`) respectively.
//!
//! Lookups never fall back to another generation: an item whose rotation is
//! not held locally fails with [`CryptoError::MissingRotation`].
//!
//! The ids stored next to a wrapped key are bound into its associated data,
//! so relabelling a packet (another vault, generation or item) fails to
//! unwrap.

use crate::codec::{
    KIND_WRAPPED_ITEM_KEY, KIND_WRAPPED_VAULT_KEY, decode_versioned, encode_versioned,
};
use crate::item::{Item, VaultMetadata};
use chrono::{DateTime, Utc};
use passcore_crypto::{
    CryptoError, CryptoResult, EncryptedBytes, EncryptionKey, EncryptionTag, KdfParams,
    PassphraseProtectedKey, decrypt, decrypt_bound, encrypt, encrypt_bound, protect_key_bound,
    unprotect_key_bound,
};
use passcore_types::{ItemId, RotationId, VaultId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use zeroize::Zeroizing;

// ============================================================================
// Vault keys
// ============================================================================

/// `vault_id || rotation_id || rotation` for a wrapped vault key.
fn vault_key_binding(vault_id: &VaultId, rotation_id: &RotationId, rotation: u32) -> Vec<u8> {
    let mut binding = Vec::with_capacity(36);
    binding.extend_from_slice(vault_id.as_uuid().as_bytes());
    binding.extend_from_slice(rotation_id.as_uuid().as_bytes());
    binding.extend_from_slice(&rotation.to_be_bytes());
    binding
}

/// `vault_id || rotation_id || item_id` for a wrapped item key.
fn item_key_binding(vault_id: &VaultId, rotation_id: &RotationId, item_id: &ItemId) -> Vec<u8> {
    let mut binding = Vec::with_capacity(48);
    binding.extend_from_slice(vault_id.as_uuid().as_bytes());
    binding.extend_from_slice(rotation_id.as_uuid().as_bytes());
    binding.extend_from_slice(item_id.as_uuid().as_bytes());
    binding
}

/// One generation of a vault's symmetric key.
#[derive(Debug)]
pub struct VaultKey {
    pub vault_id: VaultId,
    pub rotation_id: RotationId,
    /// Generation counter. The first key of a vault is generation 1.
    pub rotation: u32,
    key: EncryptionKey,
}

impl VaultKey {
    /// Fresh random key for `vault_id` at generation `rotation`.
    pub fn generate(vault_id: VaultId, rotation: u32) -> Self {
        Self {
            vault_id,
            rotation_id: RotationId::new(),
            rotation,
            key: EncryptionKey::generate(),
        }
    }

    pub(crate) fn from_parts(
        vault_id: VaultId,
        rotation_id: RotationId,
        rotation: u32,
        key: EncryptionKey,
    ) -> Self {
        Self {
            vault_id,
            rotation_id,
            rotation,
            key,
        }
    }

    pub(crate) fn key(&self) -> &EncryptionKey {
        &self.key
    }

    fn binding(&self) -> Vec<u8> {
        vault_key_binding(&self.vault_id, &self.rotation_id, self.rotation)
    }

    /// Wraps this generation under a user's master key.
    pub fn wrap(&self, master: &EncryptionKey) -> CryptoResult<WrappedVaultKey> {
        let key = encrypt_bound(
            master,
            self.key.as_bytes(),
            EncryptionTag::VaultKey,
            &self.binding(),
        )?;
        Ok(WrappedVaultKey {
            vault_id: self.vault_id,
            rotation_id: self.rotation_id,
            rotation: self.rotation,
            key,
            passphrase: None,
            created_at: Utc::now(),
        })
    }

    /// Like [`VaultKey::wrap`], plus a passphrase wrapper so the vault can be
    /// opened without the master key.
    pub fn wrap_with_passphrase(
        &self,
        master: &EncryptionKey,
        passphrase: &str,
        params: &KdfParams,
    ) -> CryptoResult<WrappedVaultKey> {
        let mut wrapped = self.wrap(master)?;
        wrapped.passphrase = Some(protect_key_bound(
            &self.key,
            passphrase,
            params,
            &self.binding(),
        )?);
        Ok(wrapped)
    }

    pub fn encrypt_metadata(&self, metadata: &VaultMetadata) -> CryptoResult<EncryptedBytes> {
        encrypt(&self.key, &metadata.to_wire()?, Some(EncryptionTag::VaultContent))
    }

    pub fn decrypt_metadata(&self, encrypted: &EncryptedBytes) -> CryptoResult<VaultMetadata> {
        let plaintext = Zeroizing::new(decrypt(
            &self.key,
            encrypted,
            Some(EncryptionTag::VaultContent),
        )?);
        VaultMetadata::from_wire(&plaintext)
    }

    /// Wraps an item key under this generation.
    pub fn wrap_item_key(&self, item_key: &ItemKey) -> CryptoResult<WrappedItemKey> {
        if item_key.vault_id != self.vault_id {
            return Err(CryptoError::InvalidKeyPacket(format!(
                "item {} belongs to vault {}, not {}",
                item_key.item_id, item_key.vault_id, self.vault_id
            )));
        }
        let binding = item_key_binding(&self.vault_id, &self.rotation_id, &item_key.item_id);
        Ok(WrappedItemKey {
            item_id: item_key.item_id,
            vault_id: self.vault_id,
            rotation_id: self.rotation_id,
            key: encrypt_bound(
                &self.key,
                item_key.key.as_bytes(),
                EncryptionTag::ItemKey,
                &binding,
            )?,
        })
    }

    /// Unwraps an item key that was wrapped under exactly this generation.
    pub fn unwrap_item_key(&self, wrapped: &WrappedItemKey) -> CryptoResult<ItemKey> {
        if wrapped.vault_id != self.vault_id || wrapped.rotation_id != self.rotation_id {
            return Err(CryptoError::MissingRotation {
                vault_id: wrapped.vault_id,
                rotation_id: wrapped.rotation_id,
            });
        }
        let binding = item_key_binding(&wrapped.vault_id, &wrapped.rotation_id, &wrapped.item_id);
        let plaintext = decrypt_bound(&self.key, &wrapped.key, EncryptionTag::ItemKey, &binding)
            .map(Zeroizing::new)
            .map_err(|_| {
                CryptoError::InvalidKeyPacket(format!(
                    "item key for {} could not be unwrapped",
                    wrapped.item_id
                ))
            })?;
        Ok(ItemKey {
            item_id: wrapped.item_id,
            vault_id: wrapped.vault_id,
            key: EncryptionKey::from_slice(&plaintext)?,
        })
    }
}

/// A vault key generation as persisted: wrapped under the master key and
/// optionally under a passphrase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WrappedVaultKey {
    pub vault_id: VaultId,
    pub rotation_id: RotationId,
    pub rotation: u32,
    pub key: EncryptedBytes,
    pub passphrase: Option<PassphraseProtectedKey>,
    pub created_at: DateTime<Utc>,
}

impl WrappedVaultKey {
    pub fn to_wire(&self) -> CryptoResult<Vec<u8>> {
        encode_versioned(KIND_WRAPPED_VAULT_KEY, self)
    }

    pub fn from_wire(bytes: &[u8]) -> CryptoResult<Self> {
        decode_versioned(KIND_WRAPPED_VAULT_KEY, bytes)
    }
}

// ============================================================================
// Item keys
// ============================================================================

/// Per-item symmetric key.
#[derive(Debug)]
pub struct ItemKey {
    pub item_id: ItemId,
    pub vault_id: VaultId,
    key: EncryptionKey,
}

impl ItemKey {
    pub fn generate(vault_id: VaultId, item_id: ItemId) -> Self {
        Self {
            item_id,
            vault_id,
            key: EncryptionKey::generate(),
        }
    }

    pub fn encrypt_item(&self, item: &Item) -> CryptoResult<EncryptedBytes> {
        encrypt(&self.key, &item.to_wire()?, Some(EncryptionTag::ItemContent))
    }

    pub fn decrypt_item(&self, encrypted: &EncryptedBytes) -> CryptoResult<Item> {
        let plaintext = Zeroizing::new(decrypt(
            &self.key,
            encrypted,
            Some(EncryptionTag::ItemContent),
        )?);
        Item::from_wire(&plaintext)
    }
}

/// An item key wrapped under one vault key generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedItemKey {
    pub item_id: ItemId,
    pub vault_id: VaultId,
    /// Generation the key is wrapped under.
    pub rotation_id: RotationId,
    pub key: EncryptedBytes,
}

impl WrappedItemKey {
    pub fn to_wire(&self) -> CryptoResult<Vec<u8>> {
        encode_versioned(KIND_WRAPPED_ITEM_KEY, self)
    }

    pub fn from_wire(bytes: &[u8]) -> CryptoResult<Self> {
        decode_versioned(KIND_WRAPPED_ITEM_KEY, bytes)
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Default)]
struct VaultKeyRing {
    active: u32,
    by_rotation: HashMap<RotationId, Arc<VaultKey>>,
    by_generation: BTreeMap<u32, RotationId>,
}

impl VaultKeyRing {
    /// Adds a generation, or returns the cached one if the same key is
    /// already held. A rotation id that disagrees with the cache, or a second
    /// rotation id claiming a held generation number, is refused.
    fn insert(&mut self, vault_key: VaultKey) -> CryptoResult<Arc<VaultKey>> {
        if let Some(existing) = self.by_rotation.get(&vault_key.rotation_id) {
            if existing.rotation == vault_key.rotation && existing.key.ct_eq(&vault_key.key) {
                return Ok(Arc::clone(existing));
            }
            return Err(CryptoError::InvalidKeyPacket(format!(
                "rotation {} of vault {} does not match the cached generation",
                vault_key.rotation_id, vault_key.vault_id
            )));
        }
        if let Some(held) = self.by_generation.get(&vault_key.rotation) {
            return Err(CryptoError::InvalidKeyPacket(format!(
                "generation {} of vault {} is already held by rotation {held}",
                vault_key.rotation, vault_key.vault_id
            )));
        }

        let vault_key = Arc::new(vault_key);
        self.by_generation.insert(vault_key.rotation, vault_key.rotation_id);
        self.active = self.active.max(vault_key.rotation);
        self.by_rotation.insert(vault_key.rotation_id, Arc::clone(&vault_key));
        Ok(vault_key)
    }

    fn active_key(&self) -> Option<Arc<VaultKey>> {
        let rotation_id = self.by_generation.get(&self.active)?;
        self.by_rotation.get(rotation_id).cloned()
    }
}

/// Thread-safe cache of unwrapped vault key generations, keyed by vault.
///
/// Each vault has its own lock; reading an already cached generation takes
/// only read locks.
#[derive(Default)]
pub struct KeyHierarchy {
    vaults: RwLock<HashMap<VaultId, Arc<RwLock<VaultKeyRing>>>>,
}

impl KeyHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    fn ring(&self, vault_id: &VaultId) -> Option<Arc<RwLock<VaultKeyRing>>> {
        self.vaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vault_id)
            .cloned()
    }

    fn ring_or_create(&self, vault_id: VaultId) -> Arc<RwLock<VaultKeyRing>> {
        if let Some(ring) = self.ring(&vault_id) {
            return ring;
        }
        let mut vaults = self.vaults.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(vaults.entry(vault_id).or_default())
    }

    fn cache(&self, vault_key: VaultKey) -> CryptoResult<Arc<VaultKey>> {
        let ring = self.ring_or_create(vault_key.vault_id);
        let mut ring = ring.write().unwrap_or_else(PoisonError::into_inner);
        ring.insert(vault_key)
    }

    /// Creates generation 1 for a new vault and returns it with its wrapped
    /// form for persistence.
    pub fn create_vault(
        &self,
        master: &EncryptionKey,
        vault_id: VaultId,
    ) -> CryptoResult<(Arc<VaultKey>, WrappedVaultKey)> {
        if let Some(found) = self.active_generation(&vault_id) {
            return Err(CryptoError::RotationConflict {
                vault_id,
                expected: 0,
                found,
            });
        }
        let vault_key = VaultKey::generate(vault_id, 1);
        let wrapped = vault_key.wrap(master)?;
        let vault_key = self.publish(vault_key, 0)?;
        info!("created vault {vault_id} at generation 1");
        Ok((vault_key, wrapped))
    }

    /// Unwraps a persisted vault key generation with the user's master key
    /// and caches it. A newer generation becomes the active one.
    ///
    /// The packet is authenticated under `master` even when the generation
    /// is already cached.
    pub fn unwrap_vault_key(
        &self,
        master: &EncryptionKey,
        wrapped: &WrappedVaultKey,
    ) -> CryptoResult<Arc<VaultKey>> {
        let binding = vault_key_binding(&wrapped.vault_id, &wrapped.rotation_id, wrapped.rotation);
        let plaintext = decrypt_bound(master, &wrapped.key, EncryptionTag::VaultKey, &binding)
            .map(Zeroizing::new)
            .map_err(|_| {
                CryptoError::InvalidKeyPacket(format!(
                    "vault key for {} rotation {} could not be unwrapped",
                    wrapped.vault_id, wrapped.rotation_id
                ))
            })?;
        let key = EncryptionKey::from_slice(&plaintext)?;

        debug!(vault_id = %wrapped.vault_id, rotation = wrapped.rotation, "unwrapped vault key");
        self.cache(VaultKey::from_parts(
            wrapped.vault_id,
            wrapped.rotation_id,
            wrapped.rotation,
            key,
        ))
    }

    /// Unwraps through the passphrase wrapper instead of the master key.
    pub fn unwrap_vault_key_with_passphrase(
        &self,
        wrapped: &WrappedVaultKey,
        passphrase: &str,
    ) -> CryptoResult<Arc<VaultKey>> {
        let protected = wrapped.passphrase.as_ref().ok_or_else(|| {
            CryptoError::KeyUnavailable(format!(
                "vault {} has no passphrase wrapper",
                wrapped.vault_id
            ))
        })?;
        let binding = vault_key_binding(&wrapped.vault_id, &wrapped.rotation_id, wrapped.rotation);
        let key = unprotect_key_bound(protected, passphrase, &binding).map_err(|_| {
            CryptoError::InvalidKeyPacket(format!(
                "passphrase does not open vault {} rotation {}",
                wrapped.vault_id, wrapped.rotation_id
            ))
        })?;

        debug!(
            vault_id = %wrapped.vault_id,
            rotation = wrapped.rotation,
            "unwrapped vault key with passphrase"
        );
        self.cache(VaultKey::from_parts(
            wrapped.vault_id,
            wrapped.rotation_id,
            wrapped.rotation,
            key,
        ))
    }

    /// Looks up a cached generation by rotation id.
    pub fn vault_key(
        &self,
        vault_id: &VaultId,
        rotation_id: &RotationId,
    ) -> CryptoResult<Arc<VaultKey>> {
        self.ring(vault_id)
            .and_then(|ring| {
                ring.read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .by_rotation
                    .get(rotation_id)
                    .cloned()
            })
            .ok_or(CryptoError::MissingRotation {
                vault_id: *vault_id,
                rotation_id: *rotation_id,
            })
    }

    /// The generation new item keys are wrapped under.
    pub fn active_vault_key(&self, vault_id: &VaultId) -> CryptoResult<Arc<VaultKey>> {
        self.ring(vault_id)
            .and_then(|ring| ring.read().unwrap_or_else(PoisonError::into_inner).active_key())
            .ok_or_else(|| {
                CryptoError::KeyUnavailable(format!("no vault key held for vault {vault_id}"))
            })
    }

    pub fn active_generation(&self, vault_id: &VaultId) -> Option<u32> {
        let ring = self.ring(vault_id)?;
        let ring = ring.read().unwrap_or_else(PoisonError::into_inner);
        (ring.active > 0).then_some(ring.active)
    }

    /// Cached generations for a vault, oldest first.
    pub fn generations(&self, vault_id: &VaultId) -> Vec<(u32, RotationId)> {
        self.ring(vault_id)
            .map(|ring| {
                ring.read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .by_generation
                    .iter()
                    .map(|(generation, rotation_id)| (*generation, *rotation_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Unwraps an item key under the generation named by its rotation id.
    pub fn unwrap_item_key(&self, wrapped: &WrappedItemKey) -> CryptoResult<ItemKey> {
        self.vault_key(&wrapped.vault_id, &wrapped.rotation_id)?
            .unwrap_item_key(wrapped)
    }

    /// Wraps an item key under its vault's active generation.
    pub fn wrap_item_key(&self, item_key: &ItemKey) -> CryptoResult<WrappedItemKey> {
        self.active_vault_key(&item_key.vault_id)?.wrap_item_key(item_key)
    }

    /// Generates a key for a new item and wraps it under the active generation.
    pub fn create_item_key(
        &self,
        vault_id: VaultId,
        item_id: ItemId,
    ) -> CryptoResult<(ItemKey, WrappedItemKey)> {
        let item_key = ItemKey::generate(vault_id, item_id);
        let wrapped = self.wrap_item_key(&item_key)?;
        Ok((item_key, wrapped))
    }

    /// Adopts a generation received from elsewhere (e.g. an accepted invite)
    /// and rewraps it under this user's master key.
    pub fn import_vault_key(
        &self,
        master: &EncryptionKey,
        vault_key: VaultKey,
    ) -> CryptoResult<(Arc<VaultKey>, WrappedVaultKey)> {
        let wrapped = vault_key.wrap(master)?;
        let vault_id = vault_key.vault_id;
        let rotation = vault_key.rotation;
        let vault_key = self.cache(vault_key)?;
        info!("imported vault {vault_id} generation {rotation}");
        Ok((vault_key, wrapped))
    }

    /// Makes `vault_key` the active generation if the active generation is
    /// still `expected`.
    pub(crate) fn publish(
        &self,
        vault_key: VaultKey,
        expected: u32,
    ) -> CryptoResult<Arc<VaultKey>> {
        let ring = self.ring_or_create(vault_key.vault_id);
        let mut ring = ring.write().unwrap_or_else(PoisonError::into_inner);
        if ring.active != expected {
            return Err(CryptoError::RotationConflict {
                vault_id: vault_key.vault_id,
                expected,
                found: ring.active,
            });
        }
        ring.insert(vault_key)
    }

    /// Drops every cached generation of a vault. Returns false if none were held.
    pub fn evict(&self, vault_id: &VaultId) -> bool {
        self.vaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(vault_id)
            .is_some()
    }
}
