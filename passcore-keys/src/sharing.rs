//! Vault sharing: sealing a vault key generation for invitees and accepting
//! it on the other side.
//!
//! Each invite entry seals the raw vault key to one recipient X25519 key
//! with an ephemeral sender key, and is signed with the inviter's Ed25519
//! key over a transcript binding vault, generation, recipient key and
//! envelope. The recipient accepts only when it can open an entry AND an
//! active inviter key verifies that entry.

use crate::codec::{KIND_INVITE_KEY, decode_versioned, encode_versioned};
use crate::hierarchy::VaultKey;
use crate::share_registry::{ShareKey, ShareRegistry, ShareState};
use passcore_crypto::{
    CryptoError, CryptoResult, EncryptionKey, PublicKey, SealedEnvelope, SecretKey, SigningKeyPair,
    SigningPublicKey, open_key, public_key_fingerprint, seal_key,
};
use passcore_types::{RotationId, ShareId, UserId, VaultId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const TRANSCRIPT_DOMAIN: &[u8] = b"passcore/invite/v1";

/// One sealed copy of the vault key, addressed to one recipient key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteKeyEntry {
    pub recipient_public_key: [u8; 32],
    pub envelope: SealedEnvelope,
    /// Ed25519 signature over the entry transcript.
    pub signature: Vec<u8>,
}

/// A vault key generation sealed for a set of recipient keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInviteKey {
    pub vault_id: VaultId,
    pub rotation_id: RotationId,
    pub rotation: u32,
    pub entries: Vec<InviteKeyEntry>,
}

impl EncryptedInviteKey {
    pub fn to_wire(&self) -> CryptoResult<Vec<u8>> {
        encode_versioned(KIND_INVITE_KEY, self)
    }

    pub fn from_wire(bytes: &[u8]) -> CryptoResult<Self> {
        decode_versioned(KIND_INVITE_KEY, bytes)
    }

    fn transcript(&self, entry_key: &[u8; 32], envelope: &SealedEnvelope) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(TRANSCRIPT_DOMAIN.len() + 132 + envelope.ciphertext.len());
        out.extend_from_slice(TRANSCRIPT_DOMAIN);
        out.extend_from_slice(self.vault_id.as_uuid().as_bytes());
        out.extend_from_slice(self.rotation_id.as_uuid().as_bytes());
        out.extend_from_slice(&self.rotation.to_be_bytes());
        out.extend_from_slice(entry_key);
        out.extend_from_slice(&envelope.ephemeral_public_key);
        out.extend_from_slice(&envelope.nonce);
        out.extend_from_slice(&(envelope.ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&envelope.ciphertext);
        out
    }
}

/// A vault key generation recovered from an invite.
#[derive(Debug)]
pub struct AcceptedKey {
    pub vault_id: VaultId,
    pub rotation_id: RotationId,
    pub rotation: u32,
    /// Fingerprint of the inviter key that verified the invite.
    pub inviter_fingerprint: String,
    /// Fingerprint of the recipient public key the opened entry was sealed to.
    pub recipient_fingerprint: String,
    key: EncryptionKey,
}

impl AcceptedKey {
    /// Turns the accepted key into a vault key generation, ready for
    /// `KeyHierarchy::import_vault_key`.
    pub fn into_vault_key(self) -> VaultKey {
        VaultKey::from_parts(self.vault_id, self.rotation_id, self.rotation, self.key)
    }
}

/// Seals `vault_key` for every key in `recipient_public_keys` and signs each
/// entry with `inviter`.
pub fn create_invite(
    vault_key: &VaultKey,
    inviter: &SigningKeyPair,
    recipient_public_keys: &[PublicKey],
) -> CryptoResult<EncryptedInviteKey> {
    if recipient_public_keys.is_empty() {
        return Err(CryptoError::InvalidKeyPacket(
            "an invite needs at least one recipient key".to_string(),
        ));
    }

    let mut invite = EncryptedInviteKey {
        vault_id: vault_key.vault_id,
        rotation_id: vault_key.rotation_id,
        rotation: vault_key.rotation,
        entries: Vec::with_capacity(recipient_public_keys.len()),
    };
    for recipient in recipient_public_keys {
        let envelope = seal_key(vault_key.key().as_bytes(), recipient)?;
        let recipient_public_key = *recipient.as_bytes();
        let signature = inviter
            .sign(&invite.transcript(&recipient_public_key, &envelope))
            .to_vec();
        invite.entries.push(InviteKeyEntry {
            recipient_public_key,
            envelope,
            signature,
        });
    }

    debug!(
        "sealed vault {} generation {} for {} recipient keys",
        invite.vault_id,
        invite.rotation,
        invite.entries.len()
    );
    Ok(invite)
}

/// Opens each invite with one of the recipient's private keys and verifies
/// it against the inviter's public keys.
///
/// Every invite must pass both checks. An invite with no entry for any
/// supplied private key fails with [`CryptoError::InvalidKeyPacket`]; an
/// entry no active inviter key verifies fails with
/// [`CryptoError::SignatureInvalid`].
pub fn accept_invite(
    group_private_keys: &[SecretKey],
    organization_private_key: Option<&SecretKey>,
    inviter_public_keys: &[SigningPublicKey],
    encrypted_keys: &[EncryptedInviteKey],
) -> CryptoResult<Vec<AcceptedKey>> {
    let candidates: Vec<(&SecretKey, PublicKey)> = group_private_keys
        .iter()
        .chain(organization_private_key)
        .map(|sk| (sk, sk.public_key()))
        .collect();

    encrypted_keys
        .iter()
        .map(|invite| accept_one(&candidates, inviter_public_keys, invite))
        .collect()
}

fn accept_one(
    candidates: &[(&SecretKey, PublicKey)],
    inviter_public_keys: &[SigningPublicKey],
    invite: &EncryptedInviteKey,
) -> CryptoResult<AcceptedKey> {
    let (secret, entry) = candidates
        .iter()
        .find_map(|(sk, pk)| {
            invite
                .entries
                .iter()
                .find(|e| e.recipient_public_key == *pk.as_bytes())
                .map(|e| (*sk, e))
        })
        .ok_or_else(|| {
            CryptoError::InvalidKeyPacket(format!(
                "invite for vault {} is not addressed to any supplied key",
                invite.vault_id
            ))
        })?;

    let transcript = invite.transcript(&entry.recipient_public_key, &entry.envelope);
    let signer = inviter_public_keys
        .iter()
        .filter(|pk| pk.active)
        .find(|pk| pk.verify(&transcript, &entry.signature).is_ok())
        .ok_or_else(|| {
            warn!(
                "invite for vault {} failed signature verification",
                invite.vault_id
            );
            CryptoError::SignatureInvalid(format!(
                "no active inviter key verifies the invite for vault {}",
                invite.vault_id
            ))
        })?;

    let plaintext = Zeroizing::new(open_key(&entry.envelope, secret)?);
    let key = EncryptionKey::from_slice(&plaintext).map_err(|_| {
        CryptoError::InvalidKeyPacket(format!(
            "invite for vault {} has a malformed key",
            invite.vault_id
        ))
    })?;

    Ok(AcceptedKey {
        vault_id: invite.vault_id,
        rotation_id: invite.rotation_id,
        rotation: invite.rotation,
        inviter_fingerprint: signer.fingerprint(),
        recipient_fingerprint: public_key_fingerprint(&PublicKey::from(entry.recipient_public_key)),
        key,
    })
}

/// Drives share records through `Invited → Accepted → Active → Revoked`
/// alongside the invite cryptography.
#[derive(Default)]
pub struct ShareKeyDistributor {
    registry: ShareRegistry,
}

impl ShareKeyDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ShareRegistry {
        &self.registry
    }

    /// Creates an invite for `recipient` and records the share as `Invited`.
    pub fn share_vault(
        &self,
        vault_key: &VaultKey,
        inviter: &SigningKeyPair,
        recipient: UserId,
        recipient_public_keys: &[PublicKey],
    ) -> CryptoResult<(ShareKey, EncryptedInviteKey)> {
        let invite = create_invite(vault_key, inviter, recipient_public_keys)?;
        let share = ShareKey::invited(
            vault_key.vault_id,
            recipient,
            vec![vault_key.rotation_id],
            recipient_public_keys.iter().map(public_key_fingerprint).collect(),
        );
        self.registry.insert(share.clone())?;

        info!(
            "shared vault {} with {recipient} as share {}",
            share.vault_id, share.share_id
        );
        Ok((share, invite))
    }

    /// Accepts the invites of an `Invited` share. The share moves to
    /// `Accepted` only if every invite opens, verifies and was sealed to one
    /// of the share recipient's keys.
    pub fn accept(
        &self,
        share_id: &ShareId,
        group_private_keys: &[SecretKey],
        organization_private_key: Option<&SecretKey>,
        inviter_public_keys: &[SigningPublicKey],
        encrypted_keys: &[EncryptedInviteKey],
    ) -> CryptoResult<Vec<AcceptedKey>> {
        let share = self.registry.check_transition(share_id, ShareState::Accepted)?;
        if let Some(stray) = encrypted_keys.iter().find(|k| k.vault_id != share.vault_id) {
            return Err(CryptoError::InvalidKeyPacket(format!(
                "invite for vault {} does not belong to share {share_id}",
                stray.vault_id
            )));
        }
        if encrypted_keys.is_empty() {
            return Err(CryptoError::InvalidKeyPacket(format!(
                "no invite keys supplied for share {share_id}"
            )));
        }

        let accepted = accept_invite(
            group_private_keys,
            organization_private_key,
            inviter_public_keys,
            encrypted_keys,
        )?;
        if let Some(stray) = accepted.iter().find(|k| {
            !share
                .recipient_key_fingerprints
                .contains(&k.recipient_fingerprint)
        }) {
            warn!("share {share_id} was opened with a key outside the recipient's key set");
            return Err(CryptoError::InvalidKeyPacket(format!(
                "recipient key {} is not part of share {share_id}",
                stray.recipient_fingerprint
            )));
        }
        self.registry.transition(share_id, ShareState::Accepted)?;

        info!("accepted share {share_id} for vault {}", share.vault_id);
        Ok(accepted)
    }

    pub fn activate(&self, share_id: &ShareId) -> CryptoResult<ShareKey> {
        let share = self.registry.transition(share_id, ShareState::Active)?;
        info!("share {share_id} is active");
        Ok(share)
    }

    /// Deletes the share record. Vault keys are left untouched.
    pub fn revoke(&self, share_id: &ShareId) -> CryptoResult<ShareKey> {
        let share = self.registry.transition(share_id, ShareState::Revoked)?;
        info!("revoked share {share_id} on vault {}", share.vault_id);
        Ok(share)
    }

    pub fn share(&self, share_id: &ShareId) -> CryptoResult<ShareKey> {
        self.registry.get(share_id)
    }

    pub fn shares_for_vault(&self, vault_id: &VaultId) -> Vec<ShareKey> {
        self.registry.for_vault(vault_id)
    }
}
