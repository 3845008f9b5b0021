//! Envelope encryption for vault sharing.
//!
//! Uses X25519 key exchange + XSalsa20-Poly1305 to seal a vault key for an
//! invitee's public key. Each seal uses an ephemeral keypair, so the sealed
//! envelope reveals nothing about the sender.
//!
//! Also provides passphrase-protected storage for symmetric keys and
//! X25519 private keys (Argon2id -> XChaCha20-Poly1305).

use crate::cipher::{EncryptedBytes, EncryptionTag, decrypt_bound, encrypt_bound};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{EncryptionKey, KdfParams, Salt, derive_key};
use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Hex fingerprint of an X25519 public key (first 8 bytes).
pub fn public_key_fingerprint(pk: &PublicKey) -> String {
    hex::encode(&pk.as_bytes()[..8])
}

/// X25519 keypair used to receive vault invites.
///
/// The secret key implements `ZeroizeOnDrop` (from crypto_box).
pub struct UserKeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl UserKeyPair {
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Returns the public key as raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Returns the secret key as raw 32-byte array.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Reconstructs a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn fingerprint(&self) -> String {
        public_key_fingerprint(&self.public)
    }
}

/// Key material sealed with a recipient's X25519 public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; 32],
    /// XSalsa20 nonce.
    pub nonce: [u8; 24],
    /// XSalsa20-Poly1305 ciphertext + Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

/// Seals `key_bytes` for `recipient_pk` with a fresh ephemeral keypair.
pub fn seal_key(key_bytes: &[u8], recipient_pk: &PublicKey) -> CryptoResult<SealedEnvelope> {
    let ephemeral = SecretKey::generate(&mut rand::rngs::OsRng);
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient_pk, &ephemeral);

    let mut nonce = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = salsa_box
        .encrypt(GenericArray::from_slice(&nonce), key_bytes)
        .map_err(|e| CryptoError::Encryption(format!("envelope seal failed: {e}")))?;

    Ok(SealedEnvelope {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce,
        ciphertext,
    })
}

/// Opens a sealed envelope with the recipient's secret key.
pub fn open_key(envelope: &SealedEnvelope, recipient_sk: &SecretKey) -> CryptoResult<Vec<u8>> {
    let ephemeral_pk = PublicKey::from(envelope.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient_sk);

    salsa_box
        .decrypt(
            GenericArray::from_slice(&envelope.nonce),
            envelope.ciphertext.as_slice(),
        )
        .map_err(|_| {
            CryptoError::InvalidKeyPacket(
                "envelope open failed (wrong key or tampered data)".to_string(),
            )
        })
}

/// Key material encrypted under a passphrase-derived key.
///
/// Bundles the salt and Argon2id cost so the passphrase is the only input
/// needed to open it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassphraseProtectedKey {
    pub salt: Salt,
    pub params: KdfParams,
    pub encrypted: EncryptedBytes,
}

fn protect_bytes(
    bytes: &[u8],
    passphrase: &str,
    params: &KdfParams,
    binding: &[u8],
) -> CryptoResult<PassphraseProtectedKey> {
    let salt = Salt::random();
    let derived = derive_key(passphrase, &salt, params)?;
    let encrypted = encrypt_bound(&derived, bytes, EncryptionTag::PrivateKey, binding)?;

    Ok(PassphraseProtectedKey {
        salt,
        params: params.clone(),
        encrypted,
    })
}

fn unprotect_bytes(
    protected: &PassphraseProtectedKey,
    passphrase: &str,
    binding: &[u8],
) -> CryptoResult<[u8; 32]> {
    let derived = derive_key(passphrase, &protected.salt, &protected.params)?;
    let mut plaintext = decrypt_bound(
        &derived,
        &protected.encrypted,
        EncryptionTag::PrivateKey,
        binding,
    )?;

    if plaintext.len() != 32 {
        let actual = plaintext.len();
        plaintext.zeroize();
        return Err(CryptoError::InvalidKeyLength { expected: 32, actual });
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();
    Ok(bytes)
}

/// Protects a symmetric key with a passphrase.
pub fn protect_key(
    key: &EncryptionKey,
    passphrase: &str,
    params: &KdfParams,
) -> CryptoResult<PassphraseProtectedKey> {
    protect_bytes(key.as_bytes(), passphrase, params, &[])
}

/// Opens a passphrase-protected symmetric key.
pub fn unprotect_key(
    protected: &PassphraseProtectedKey,
    passphrase: &str,
) -> CryptoResult<EncryptionKey> {
    unprotect_bytes(protected, passphrase, &[]).map(EncryptionKey::from_bytes)
}

/// Protects a symmetric key with a passphrase and authenticates `binding`
/// alongside it.
pub fn protect_key_bound(
    key: &EncryptionKey,
    passphrase: &str,
    params: &KdfParams,
    binding: &[u8],
) -> CryptoResult<PassphraseProtectedKey> {
    protect_bytes(key.as_bytes(), passphrase, params, binding)
}

/// Opens a key protected by [`protect_key_bound`] with the same binding.
pub fn unprotect_key_bound(
    protected: &PassphraseProtectedKey,
    passphrase: &str,
    binding: &[u8],
) -> CryptoResult<EncryptionKey> {
    unprotect_bytes(protected, passphrase, binding).map(EncryptionKey::from_bytes)
}

/// Encrypts an X25519 private key with a passphrase.
pub fn encrypt_private_key(
    sk: &SecretKey,
    passphrase: &str,
    params: &KdfParams,
) -> CryptoResult<PassphraseProtectedKey> {
    let mut bytes = sk.to_bytes();
    let protected = protect_bytes(&bytes, passphrase, params, &[]);
    bytes.zeroize();
    protected
}

/// Decrypts a passphrase-protected X25519 private key.
pub fn decrypt_private_key(
    protected: &PassphraseProtectedKey,
    passphrase: &str,
) -> CryptoResult<SecretKey> {
    unprotect_bytes(protected, passphrase, &[]).map(SecretKey::from)
}
