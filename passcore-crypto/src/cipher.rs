//! Content cipher: XChaCha20-Poly1305 with domain-separation tags.
//!
//! Envelope layout (stable across versions):
//!
//! ```text
//! nonce (24) || ciphertext || poly1305 tag (16)
//! ```
//!
//! `EncryptedString` is the standard padded base64 of the same bytes.
//! The optional [`EncryptionTag`] label is the AEAD associated data, so a
//! ciphertext produced for one domain never authenticates in another.

use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// XChaCha20 nonce size.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

/// Domain-separation label bound into the AEAD associated data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionTag {
    /// A vault key wrapped under a user master key.
    VaultKey,
    /// Vault name, description and other vault metadata.
    VaultContent,
    /// An item key wrapped under a vault key.
    ItemKey,
    /// Item payload (login, note, alias...).
    ItemContent,
    /// Exported private halves of asymmetric keys.
    PrivateKey,
}

impl EncryptionTag {
    pub const ALL: [EncryptionTag; 5] = [
        EncryptionTag::VaultKey,
        EncryptionTag::VaultContent,
        EncryptionTag::ItemKey,
        EncryptionTag::ItemContent,
        EncryptionTag::PrivateKey,
    ];

    /// Associated-data bytes for this tag.
    pub fn label(&self) -> &'static [u8] {
        match self {
            EncryptionTag::VaultKey => b"vaultkey",
            EncryptionTag::VaultContent => b"vaultcontent",
            EncryptionTag::ItemKey => b"itemkey",
            EncryptionTag::ItemContent => b"itemcontent",
            EncryptionTag::PrivateKey => b"privatekey",
        }
    }
}

impl fmt::Display for EncryptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // labels are ASCII
        f.write_str(std::str::from_utf8(self.label()).unwrap_or("?"))
    }
}

/// Associated data for `tag` plus caller-supplied `binding` bytes.
///
/// An empty binding yields the bare label. Otherwise the label and binding
/// are separated by a NUL byte, which no label contains.
fn associated_data(tag: Option<EncryptionTag>, binding: &[u8]) -> Vec<u8> {
    let label = tag.map(|t| t.label()).unwrap_or_default();
    if binding.is_empty() {
        return label.to_vec();
    }
    let mut aad = Vec::with_capacity(label.len() + 1 + binding.len());
    aad.extend_from_slice(label);
    aad.push(0);
    aad.extend_from_slice(binding);
    aad
}

/// Binary ciphertext envelope: `nonce || ciphertext || tag`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedBytes(Vec<u8>);

impl EncryptedBytes {
    /// Wraps bytes read from storage. Validation happens on decrypt.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Base64 form of the same envelope.
    pub fn to_encrypted_string(&self) -> EncryptedString {
        EncryptedString(STANDARD.encode(&self.0))
    }
}

impl fmt::Debug for EncryptedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedBytes({} bytes)", self.0.len())
    }
}

/// Base64 text form of an [`EncryptedBytes`] envelope.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedString(String);

impl EncryptedString {
    pub fn from_string(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the base64 text. Invalid base64 is an authentication failure.
    pub fn to_encrypted_bytes(&self) -> CryptoResult<EncryptedBytes> {
        STANDARD
            .decode(&self.0)
            .map(EncryptedBytes)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

impl fmt::Debug for EncryptedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedString({} chars)", self.0.len())
    }
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(
    key: &EncryptionKey,
    plaintext: &[u8],
    tag: Option<EncryptionTag>,
) -> CryptoResult<EncryptedBytes> {
    seal(key, plaintext, &associated_data(tag, &[]))
}

/// Decrypts an envelope produced by [`encrypt`] with the same key and tag.
///
/// Any failure (short envelope, wrong key, flipped bit, different tag)
/// returns [`CryptoError::AuthenticationFailed`] and no plaintext.
pub fn decrypt(
    key: &EncryptionKey,
    envelope: &EncryptedBytes,
    tag: Option<EncryptionTag>,
) -> CryptoResult<Vec<u8>> {
    open(key, envelope, &associated_data(tag, &[]))
}

/// Like [`encrypt`], but also authenticates `binding` (typically the ids
/// stored next to the ciphertext). Decrypting requires the same binding.
pub fn encrypt_bound(
    key: &EncryptionKey,
    plaintext: &[u8],
    tag: EncryptionTag,
    binding: &[u8],
) -> CryptoResult<EncryptedBytes> {
    seal(key, plaintext, &associated_data(Some(tag), binding))
}

/// Opens an envelope produced by [`encrypt_bound`].
pub fn decrypt_bound(
    key: &EncryptionKey,
    envelope: &EncryptedBytes,
    tag: EncryptionTag,
    binding: &[u8],
) -> CryptoResult<Vec<u8>> {
    open(key, envelope, &associated_data(Some(tag), binding))
}

fn seal(key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> CryptoResult<EncryptedBytes> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(EncryptedBytes(out))
}

fn open(key: &EncryptionKey, envelope: &EncryptedBytes, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let bytes = envelope.as_bytes();
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }
    let (nonce, sealed) = bytes.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Encrypts a UTF-8 string into its base64 envelope.
pub fn encrypt_string(
    key: &EncryptionKey,
    plaintext: &str,
    tag: Option<EncryptionTag>,
) -> CryptoResult<EncryptedString> {
    encrypt(key, plaintext.as_bytes(), tag).map(|e| e.to_encrypted_string())
}

/// Decrypts a base64 envelope back into a string.
pub fn decrypt_string(
    key: &EncryptionKey,
    envelope: &EncryptedString,
    tag: Option<EncryptionTag>,
) -> CryptoResult<String> {
    let bytes = envelope.to_encrypted_bytes()?;
    let plaintext = decrypt(key, &bytes, tag)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Encoding("decrypted payload is not valid UTF-8".to_string()))
}
