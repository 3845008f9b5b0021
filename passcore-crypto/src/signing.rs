//! Ed25519 signing keys proving authorship of share invites.
//!
//! Public keys travel as ASCII armor. Private keys only leave the device
//! encrypted under a symmetric key (tag [`EncryptionTag::PrivateKey`]).

use crate::cipher::{EncryptedBytes, EncryptionTag, decrypt, encrypt};
use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Ed25519 signature length.
pub const SIGNATURE_SIZE: usize = 64;

const ARMOR_BEGIN: &str = "-----BEGIN PASSCORE SIGNING PUBLIC KEY-----";
const ARMOR_END: &str = "-----END PASSCORE SIGNING PUBLIC KEY-----";

/// Ed25519 key pair owned by one device.
pub struct SigningKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Signs `message` and returns the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Public half, marked active.
    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey {
            key: self.verifying_key,
            active: true,
        }
    }

    pub fn fingerprint(&self) -> String {
        hex::encode(&self.verifying_key.to_bytes()[..8])
    }

    /// Encrypts the private half under `key` for storage or sync.
    pub fn export_private(&self, key: &EncryptionKey) -> CryptoResult<EncryptedBytes> {
        let mut bytes = self.signing_key.to_bytes();
        let sealed = encrypt(key, &bytes, Some(EncryptionTag::PrivateKey));
        bytes.zeroize();
        sealed
    }

    /// Restores a key pair from [`SigningKeyPair::export_private`] output.
    pub fn import_private(key: &EncryptionKey, sealed: &EncryptedBytes) -> CryptoResult<Self> {
        let mut plaintext = decrypt(key, sealed, Some(EncryptionTag::PrivateKey))
            .map_err(|_| {
                CryptoError::InvalidKeyPacket("signing key packet could not be opened".to_string())
            })?;

        if plaintext.len() != 32 {
            let actual = plaintext.len();
            plaintext.zeroize();
            return Err(CryptoError::InvalidKeyLength { expected: 32, actual });
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();

        let signing_key = SigningKey::from_bytes(&bytes);
        bytes.zeroize();
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }
}

/// Distributable public half of a signing key.
///
/// Inactive keys are kept for display but never accepted as a signer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigningPublicKey {
    pub key: VerifyingKey,
    pub active: bool,
}

impl SigningPublicKey {
    pub fn from_bytes(bytes: &[u8; 32], active: bool) -> CryptoResult<Self> {
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|_| {
                CryptoError::InvalidKeyPacket("not a valid ed25519 public key".to_string())
            })?;
        Ok(Self { key, active })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub fn fingerprint(&self) -> String {
        hex::encode(&self.key.to_bytes()[..8])
    }

    pub fn deactivated(self) -> Self {
        Self {
            active: false,
            ..self
        }
    }

    /// Verifies `signature` over `message`. Inactive keys always fail.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        if !self.active {
            return Err(CryptoError::SignatureInvalid(format!(
                "signing key {} is inactive",
                self.fingerprint()
            )));
        }
        let signature = Signature::from_slice(signature)
            .map_err(|_| CryptoError::SignatureInvalid("malformed signature".to_string()))?;
        self.key
            .verify(message, &signature)
            .map_err(|_| {
                CryptoError::SignatureInvalid(format!(
                    "signature does not match key {}",
                    self.fingerprint()
                ))
            })
    }

    /// ASCII armor of the public key.
    pub fn to_armored(&self) -> String {
        format!(
            "{ARMOR_BEGIN}\n{}\n{ARMOR_END}\n",
            STANDARD.encode(self.key.to_bytes())
        )
    }

    /// Parses armor produced by [`SigningPublicKey::to_armored`]. The parsed
    /// key is active.
    pub fn from_armored(armored: &str) -> CryptoResult<Self> {
        let mut lines = armored.lines().map(str::trim).filter(|l| !l.is_empty());

        if lines.next() != Some(ARMOR_BEGIN) {
            return Err(CryptoError::Encoding("missing armor header".to_string()));
        }
        let body = lines
            .next()
            .ok_or_else(|| CryptoError::Encoding("missing armor body".to_string()))?;
        if lines.next() != Some(ARMOR_END) || lines.next().is_some() {
            return Err(CryptoError::Encoding("malformed armor footer".to_string()));
        }

        let raw = STANDARD
            .decode(body)
            .map_err(|e| CryptoError::Encoding(format!("armor body is not base64: {e}")))?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: raw.len(),
            })?;
        Self::from_bytes(&bytes, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"invite transcript");
        assert!(pair.public_key().verify(b"invite transcript", &sig).is_ok());
        assert!(pair.public_key().verify(b"other transcript", &sig).is_err());
    }

    #[test]
    fn inactive_key_never_verifies() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"msg");
        let err = pair.public_key().deactivated().verify(b"msg", &sig).unwrap_err();
        assert!(matches!(err, CryptoError::SignatureInvalid(_)));
    }

    #[test]
    fn armor_round_trip() {
        let pair = SigningKeyPair::generate();
        let armored = pair.public_key().to_armored();
        assert!(armored.starts_with(ARMOR_BEGIN));
        let parsed = SigningPublicKey::from_armored(&armored).unwrap();
        assert_eq!(parsed, pair.public_key());
    }

    #[test]
    fn armor_rejects_truncated_input() {
        assert!(SigningPublicKey::from_armored(ARMOR_BEGIN).is_err());
        assert!(SigningPublicKey::from_armored("garbage").is_err());
        let bad_body = format!("{ARMOR_BEGIN}\nAAAA\n{ARMOR_END}\n");
        assert!(matches!(
            SigningPublicKey::from_armored(&bad_body),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn private_export_requires_same_key() {
        let pair = SigningKeyPair::generate();
        let key = EncryptionKey::generate();
        let sealed = pair.export_private(&key).unwrap();

        let restored = SigningKeyPair::import_private(&key, &sealed).unwrap();
        assert_eq!(restored.public_key(), pair.public_key());

        let other = EncryptionKey::generate();
        assert!(matches!(
            SigningKeyPair::import_private(&other, &sealed),
            Err(CryptoError::InvalidKeyPacket(_))
        ));
    }
}
