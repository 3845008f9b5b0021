//! Encryption context provider.
//!
//! The provider is an explicit handle (user id + key source) that callers
//! thread through their code. It resolves the user's master key, hands a
//! scoped [`EncryptionContext`] to a closure, and zeroes its copy of the key
//! when the closure returns.

use crate::context::{EncryptionContext, with_key_scope};
use crate::envelope::{PassphraseProtectedKey, unprotect_key};
use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use async_trait::async_trait;
use passcore_types::UserId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Synchronous source of unlocked master keys.
pub trait MasterKeySource: Send + Sync {
    /// Returns a fresh copy of the user's master key, or
    /// [`CryptoError::KeyUnavailable`] if the session is locked.
    fn master_key(&self, user_id: &UserId) -> CryptoResult<EncryptionKey>;
}

/// Asynchronous source of unlocked master keys (e.g. waiting on an unlock prompt).
#[async_trait]
pub trait AsyncMasterKeySource: Send + Sync {
    async fn master_key(&self, user_id: &UserId) -> CryptoResult<EncryptionKey>;
}

/// In-memory store of unlocked master keys, one per user session.
///
/// Locking a user drops (and so zeroes) the stored key.
#[derive(Default)]
pub struct SessionKeyStore {
    keys: RwLock<HashMap<UserId, EncryptionKey>>,
}

impl SessionKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an unlocked master key for `user_id`, replacing any previous one.
    pub fn unlock(&self, user_id: UserId, key: EncryptionKey) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, key);
        debug!(%user_id, "session unlocked");
    }

    /// Unlocks with a passphrase-protected master key.
    pub fn unlock_with_passphrase(
        &self,
        user_id: UserId,
        protected: &PassphraseProtectedKey,
        passphrase: &str,
    ) -> CryptoResult<()> {
        let key = unprotect_key(protected, passphrase).map_err(|_| {
            CryptoError::KeyUnavailable(format!("wrong passphrase for user {user_id}"))
        })?;
        self.unlock(user_id, key);
        Ok(())
    }

    pub fn lock(&self, user_id: &UserId) {
        let removed = self
            .keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        if removed.is_some() {
            debug!(%user_id, "session locked");
        }
    }

    pub fn lock_all(&self) {
        self.keys.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn is_unlocked(&self, user_id: &UserId) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user_id)
    }
}

impl MasterKeySource for SessionKeyStore {
    fn master_key(&self, user_id: &UserId) -> CryptoResult<EncryptionKey> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .ok_or_else(|| {
                CryptoError::KeyUnavailable(format!("no unlocked session for user {user_id}"))
            })
    }
}

#[async_trait]
impl AsyncMasterKeySource for SessionKeyStore {
    async fn master_key(&self, user_id: &UserId) -> CryptoResult<EncryptionKey> {
        MasterKeySource::master_key(self, user_id)
    }
}

/// Hands out encryption contexts over one user's master key.
pub struct EncryptionContextProvider<S> {
    source: Arc<S>,
    user_id: UserId,
}

impl<S> Clone for EncryptionContextProvider<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            user_id: self.user_id,
        }
    }
}

impl<S> EncryptionContextProvider<S> {
    pub fn new(source: Arc<S>, user_id: UserId) -> Self {
        Self { source, user_id }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl<S: MasterKeySource> EncryptionContextProvider<S> {
    /// Runs `f` with a context over the user's master key.
    ///
    /// Fails with [`CryptoError::KeyUnavailable`] before calling `f` if the
    /// session is locked.
    pub fn with_context<R>(&self, f: impl FnOnce(&EncryptionContext<'_>) -> R) -> CryptoResult<R> {
        let mut key = self.source.master_key(&self.user_id)?;
        debug!(user_id = %self.user_id, "opening encryption scope");
        Ok(with_key_scope(&mut key, f))
    }

    /// Runs `f` with the raw master key borrowed for the scope.
    ///
    /// Used by key-wrapping code that needs the key itself rather than a
    /// content cipher. The copy is zeroed afterwards.
    pub fn with_master_key<R>(&self, f: impl FnOnce(&EncryptionKey) -> R) -> CryptoResult<R> {
        let mut key = self.source.master_key(&self.user_id)?;
        let result = f(&key);
        key.dispose();
        Ok(result)
    }
}

impl<S: AsyncMasterKeySource> EncryptionContextProvider<S> {
    /// Awaits the master key, then runs the synchronous closure `f`.
    ///
    /// Dropping the returned future while the key is being resolved never
    /// runs `f`; any key already produced is dropped and zeroed.
    pub async fn with_context_async<R>(
        &self,
        f: impl FnOnce(&EncryptionContext<'_>) -> R,
    ) -> CryptoResult<R> {
        let mut key = self.source.master_key(&self.user_id).await?;
        debug!(user_id = %self.user_id, "opening async encryption scope");
        Ok(with_key_scope(&mut key, f))
    }
}
