//! Versioned wire encoding for persisted and synced blobs.
//!
//! Every blob is a JSON envelope:
//!
//! ```json
//! { "kind": "wrapped_vault_key", "version": 1, "payload": { ... } }
//! ```
//!
//! The kind guards against feeding one blob type to another decoder; the
//! version lets the payload shape evolve.

use passcore_crypto::{CryptoError, CryptoResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current wire format version.
pub const WIRE_VERSION: u32 = 1;

pub const KIND_WRAPPED_VAULT_KEY: &str = "wrapped_vault_key";
pub const KIND_WRAPPED_ITEM_KEY: &str = "wrapped_item_key";
pub const KIND_INVITE_KEY: &str = "invite_key";
pub const KIND_ITEM: &str = "item";
pub const KIND_VAULT_METADATA: &str = "vault_metadata";

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    kind: &'a str,
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    kind: String,
    version: u32,
    payload: serde_json::Value,
}

/// Encodes `value` under `kind` at the current version.
pub fn encode_versioned<T: Serialize>(kind: &str, value: &T) -> CryptoResult<Vec<u8>> {
    Ok(serde_json::to_vec(&EnvelopeOut {
        kind,
        version: WIRE_VERSION,
        payload: value,
    })?)
}

/// Decodes a blob produced by [`encode_versioned`] with the same `kind`.
pub fn decode_versioned<T: DeserializeOwned>(kind: &str, bytes: &[u8]) -> CryptoResult<T> {
    let envelope: EnvelopeIn = serde_json::from_slice(bytes)
        .map_err(|e| CryptoError::Encoding(format!("malformed wire envelope: {e}")))?;

    if envelope.kind != kind {
        return Err(CryptoError::Encoding(format!(
            "expected {kind} blob, found {}",
            envelope.kind
        )));
    }
    if envelope.version != WIRE_VERSION {
        return Err(CryptoError::Encoding(format!(
            "unsupported {kind} version {}",
            envelope.version
        )));
    }

    serde_json::from_value(envelope.payload)
        .map_err(|e| CryptoError::Encoding(format!("malformed {kind} payload: {e}")))
}
