//! Keyring configuration.

use passcore_crypto::{CryptoError, CryptoResult, KdfParams};
use serde::{Deserialize, Serialize};

/// Tunables for the key hierarchy and rotation manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    /// Argon2id cost used when a vault key gets a passphrase wrapper.
    pub kdf: KdfParams,

    /// Threads used to re-wrap item keys during rotation (1 = sequential).
    pub rotation_workers: usize,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            rotation_workers: 4,
        }
    }
}

impl KeyringConfig {
    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::Config(format!("malformed keyring config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CryptoResult<()> {
        if self.rotation_workers == 0 {
            return Err(CryptoError::Config("rotation_workers must be at least 1".to_string()));
        }
        self.kdf
            .validate()
            .map_err(|e| CryptoError::Config(e.to_string()))
    }

    /// Cheap parameters for tests. Not for production data.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            kdf: KdfParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            rotation_workers: 2,
        }
    }
}
