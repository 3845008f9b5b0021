//! Short-lived encryption contexts bound to a borrowed key.
//!
//! An [`EncryptionContext`] cannot outlive the key it borrows, and
//! [`with_key_scope`] zeroes that key on every exit path (return, panic
//! unwind, or the enclosing future being dropped).

use crate::cipher::{self, EncryptedBytes, EncryptedString, EncryptionTag};
use crate::error::CryptoResult;
use crate::key::EncryptionKey;

/// Content cipher bound to one key for the duration of a scope.
pub struct EncryptionContext<'k> {
    key: &'k EncryptionKey,
}

impl<'k> EncryptionContext<'k> {
    pub(crate) fn new(key: &'k EncryptionKey) -> Self {
        Self { key }
    }

    pub fn encrypt(
        &self,
        plaintext: &str,
        tag: Option<EncryptionTag>,
    ) -> CryptoResult<EncryptedString> {
        cipher::encrypt_string(self.key, plaintext, tag)
    }

    pub fn decrypt(
        &self,
        envelope: &EncryptedString,
        tag: Option<EncryptionTag>,
    ) -> CryptoResult<String> {
        cipher::decrypt_string(self.key, envelope, tag)
    }

    pub fn encrypt_bytes(
        &self,
        plaintext: &[u8],
        tag: Option<EncryptionTag>,
    ) -> CryptoResult<EncryptedBytes> {
        cipher::encrypt(self.key, plaintext, tag)
    }

    pub fn decrypt_bytes(
        &self,
        envelope: &EncryptedBytes,
        tag: Option<EncryptionTag>,
    ) -> CryptoResult<Vec<u8>> {
        cipher::decrypt(self.key, envelope, tag)
    }
}

/// Zeroes the guarded key when dropped.
struct ZeroizeOnExit<'a>(&'a mut EncryptionKey);

impl Drop for ZeroizeOnExit<'_> {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Runs `f` with a context over `key`, then zeroes `key`.
///
/// The key is zeroed even if `f` panics. Callers that need the key again
/// must hold their own copy.
pub fn with_key_scope<R>(
    key: &mut EncryptionKey,
    f: impl FnOnce(&EncryptionContext<'_>) -> R,
) -> R {
    let guard = ZeroizeOnExit(key);
    let context = EncryptionContext::new(&*guard.0);
    f(&context)
}
