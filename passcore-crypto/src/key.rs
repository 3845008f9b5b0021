//! Symmetric key material and passphrase-based derivation.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every symmetric key in the hierarchy (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of an Argon2id salt.
pub const SALT_SIZE: usize = 16;

/// A 256-bit symmetric secret held in process memory.
///
/// The buffer is zeroed when the value is dropped, and can be zeroed early
/// with [`EncryptionKey::dispose`]. `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generates a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from an unwrapped buffer, rejecting any other length.
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Zeroes the buffer in place. The key is unusable afterwards.
    pub fn dispose(&mut self) {
        self.0.zeroize();
    }

    /// Constant-time equality of the key bytes.
    pub fn ct_eq(&self, other: &EncryptionKey) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }

    /// True once the buffer has been zeroed.
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Generates a random key. Shorthand for [`EncryptionKey::generate`].
pub fn generate_random_key() -> EncryptionKey {
    EncryptionKey::generate()
}

/// Random salt for passphrase derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    fn to_argon2(&self) -> CryptoResult<Params> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 parameters: {e}")))
    }

    /// Checks the parameters against Argon2's limits without deriving anything.
    pub fn validate(&self) -> CryptoResult<()> {
        self.to_argon2().map(|_| ())
    }
}

/// Derives a key from a passphrase with Argon2id.
pub fn derive_key(
    passphrase: &str,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<EncryptionKey> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut out = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = EncryptionKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}
