//! Per-(vault, recipient) share records and their state machine.
//!
//! ```text
//! Invited ──► Accepted ──► Active
//!    │           │           │
//!    └───────────┴───────────┴──► Revoked (record deleted)
//! ```

use chrono::{DateTime, Utc};
use passcore_crypto::{CryptoError, CryptoResult};
use passcore_types::{RotationId, ShareId, UserId, VaultId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareState {
    Invited,
    Accepted,
    Active,
    Revoked,
}

impl ShareState {
    pub fn can_transition_to(self, next: ShareState) -> bool {
        matches!(
            (self, next),
            (ShareState::Invited, ShareState::Accepted)
                | (ShareState::Accepted, ShareState::Active)
                | (
                    ShareState::Invited | ShareState::Accepted | ShareState::Active,
                    ShareState::Revoked
                )
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareState::Invited => "invited",
            ShareState::Accepted => "accepted",
            ShareState::Active => "active",
            ShareState::Revoked => "revoked",
        }
    }
}

impl fmt::Display for ShareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access grant for one recipient on one vault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareKey {
    pub share_id: ShareId,
    pub vault_id: VaultId,
    pub recipient: UserId,
    /// Vault key generations sealed for the recipient.
    pub rotation_ids: Vec<RotationId>,
    /// Fingerprints of the recipient public keys the invite was sealed to.
    pub recipient_key_fingerprints: Vec<String>,
    pub state: ShareState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShareKey {
    pub fn invited(
        vault_id: VaultId,
        recipient: UserId,
        rotation_ids: Vec<RotationId>,
        recipient_key_fingerprints: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            share_id: ShareId::new(),
            vault_id,
            recipient,
            rotation_ids,
            recipient_key_fingerprints,
            state: ShareState::Invited,
            created_at: now,
            updated_at: now,
        }
    }
}

/// In-memory store of live shares. At most one live record per
/// (vault, recipient) pair.
#[derive(Default)]
pub struct ShareRegistry {
    shares: RwLock<HashMap<ShareId, ShareKey>>,
}

impl ShareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new share. Fails if the pair already has a live record.
    pub fn insert(&self, share: ShareKey) -> CryptoResult<()> {
        let mut shares = self.shares.write().unwrap_or_else(PoisonError::into_inner);
        if shares
            .values()
            .any(|s| s.vault_id == share.vault_id && s.recipient == share.recipient)
        {
            return Err(CryptoError::ShareExists {
                vault_id: share.vault_id,
                recipient: share.recipient,
            });
        }
        shares.insert(share.share_id, share);
        Ok(())
    }

    pub fn get(&self, share_id: &ShareId) -> CryptoResult<ShareKey> {
        self.shares
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(share_id)
            .cloned()
            .ok_or(CryptoError::ShareNotFound(*share_id))
    }

    /// Checks that `share_id` may move to `next` without changing anything.
    pub fn check_transition(&self, share_id: &ShareId, next: ShareState) -> CryptoResult<ShareKey> {
        let share = self.get(share_id)?;
        ensure_transition(&share, next)?;
        Ok(share)
    }

    /// Moves a share to `next`. Moving to `Revoked` deletes the record and
    /// returns its final state.
    pub fn transition(&self, share_id: &ShareId, next: ShareState) -> CryptoResult<ShareKey> {
        let mut shares = self.shares.write().unwrap_or_else(PoisonError::into_inner);
        let share = shares.get_mut(share_id).ok_or(CryptoError::ShareNotFound(*share_id))?;
        ensure_transition(share, next)?;

        share.state = next;
        share.updated_at = Utc::now();
        let updated = share.clone();
        if next == ShareState::Revoked {
            shares.remove(share_id);
        }
        Ok(updated)
    }

    /// Live shares of a vault, oldest first.
    pub fn for_vault(&self, vault_id: &VaultId) -> Vec<ShareKey> {
        let mut shares: Vec<_> = self
            .shares
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.vault_id == *vault_id)
            .cloned()
            .collect();
        shares.sort_by_key(|s| s.created_at);
        shares
    }

    pub fn len(&self) -> usize {
        self.shares.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ensure_transition(share: &ShareKey, next: ShareState) -> CryptoResult<()> {
    if share.state.can_transition_to(next) {
        Ok(())
    } else {
        Err(CryptoError::InvalidShareTransition {
            share_id: share.share_id,
            from: share.state.to_string(),
            to: next.to_string(),
        })
    }
}
