//! Adversarial tests for the XChaCha20-Poly1305 content cipher.
//!
//! Wrong-key decryption, ciphertext tampering, truncation, cross-domain
//! substitution and envelope encoding. Every failure must be
//! `AuthenticationFailed` with no partial plaintext.

use passcore_crypto::{
    CryptoError, EncryptedBytes, EncryptedString, EncryptionKey, EncryptionTag, NONCE_SIZE,
    TAG_SIZE, decrypt, decrypt_string, encrypt, encrypt_string, generate_random_key,
};
use pretty_assertions::assert_eq;

fn tampered(envelope: &EncryptedBytes, index: usize, mask: u8) -> EncryptedBytes {
    let mut bytes = envelope.as_bytes().to_vec();
    bytes[index] ^= mask;
    EncryptedBytes::from_vec(bytes)
}

// ── Scenarios ──

#[test]
fn hello_with_fixed_key_round_trips() {
    let key = EncryptionKey::from_bytes([0xab; 32]);

    let sealed = encrypt_string(&key, "hello✅", Some(EncryptionTag::ItemContent)).unwrap();
    let opened = decrypt_string(&key, &sealed, Some(EncryptionTag::ItemContent)).unwrap();

    assert_eq!(opened, "hello✅");
}

#[test]
fn round_trip_for_every_tag() {
    let key = generate_random_key();
    for tag in EncryptionTag::ALL {
        let sealed = encrypt(&key, b"tagged payload", Some(tag)).unwrap();
        assert_eq!(decrypt(&key, &sealed, Some(tag)).unwrap(), b"tagged payload");
    }
}

// ── Domain Separation ──

#[test]
fn ciphertext_rejected_under_every_other_tag() {
    let key = generate_random_key();
    for produced in EncryptionTag::ALL {
        let sealed = encrypt(&key, b"domain bound", Some(produced)).unwrap();
        for consumed in EncryptionTag::ALL.into_iter().filter(|t| *t != produced) {
            let err = decrypt(&key, &sealed, Some(consumed)).unwrap_err();
            assert!(
                matches!(err, CryptoError::AuthenticationFailed),
                "{produced} ciphertext must not open as {consumed}"
            );
        }
        assert!(decrypt(&key, &sealed, None).is_err());
    }
}

#[test]
fn item_content_cannot_be_fed_to_vault_content() {
    let key = generate_random_key();
    let sealed = encrypt_string(&key, "item secret", Some(EncryptionTag::ItemContent)).unwrap();
    let err = decrypt_string(&key, &sealed, Some(EncryptionTag::VaultContent)).unwrap_err();
    assert!(matches!(err, CryptoError::AuthenticationFailed));
}

// ── Wrong Key ──

#[test]
fn decrypt_with_wrong_key_returns_authentication_failed() {
    let key_a = generate_random_key();
    let key_b = generate_random_key();

    let sealed = encrypt(&key_a, b"sensitive item data", Some(EncryptionTag::ItemContent)).unwrap();
    let err = decrypt(&key_b, &sealed, Some(EncryptionTag::ItemContent)).unwrap_err();

    assert!(matches!(err, CryptoError::AuthenticationFailed));
}

#[test]
fn decrypt_string_with_wrong_key_returns_error() {
    let key_a = generate_random_key();
    let key_b = generate_random_key();

    let sealed = encrypt_string(&key_a, "secret text", None).unwrap();
    assert!(decrypt_string(&key_b, &sealed, None).is_err());
}

// ── Tampering ──

#[test]
fn every_bit_flip_detected() {
    let key = generate_random_key();
    let sealed = encrypt(
        &key,
        b"integrity-protected data",
        Some(EncryptionTag::VaultContent),
    )
    .unwrap();

    for index in 0..sealed.len() {
        for bit in 0..8 {
            let flipped = tampered(&sealed, index, 1 << bit);
            assert!(
                matches!(
                    decrypt(&key, &flipped, Some(EncryptionTag::VaultContent)),
                    Err(CryptoError::AuthenticationFailed)
                ),
                "flip of bit {bit} in byte {index} must be detected"
            );
        }
    }
}

#[test]
fn appended_bytes_detected() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"original data", None).unwrap();
    let mut bytes = sealed.into_vec();
    bytes.push(0xFF);

    assert!(decrypt(&key, &EncryptedBytes::from_vec(bytes), None).is_err());
}

#[test]
fn swapped_nonce_detected() {
    let key = generate_random_key();
    let a = encrypt(&key, b"message A", None).unwrap();
    let b = encrypt(&key, b"message B", None).unwrap();

    let mut franken = a.as_bytes()[..NONCE_SIZE].to_vec();
    franken.extend_from_slice(&b.as_bytes()[NONCE_SIZE..]);

    assert!(decrypt(&key, &EncryptedBytes::from_vec(franken), None).is_err());
}

// ── Truncation / Malformed Envelopes ──

#[test]
fn truncated_envelopes_fail_closed() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"data that will be truncated", None).unwrap();

    for len in [0, 1, NONCE_SIZE, NONCE_SIZE + TAG_SIZE - 1, sealed.len() - 1] {
        let cut = EncryptedBytes::from_vec(sealed.as_bytes()[..len].to_vec());
        assert!(
            matches!(decrypt(&key, &cut, None), Err(CryptoError::AuthenticationFailed)),
            "truncation to {len} bytes must fail"
        );
    }
}

#[test]
fn invalid_base64_is_authentication_failure() {
    let key = generate_random_key();
    let bogus = EncryptedString::from_string("not-valid-base64!!!".to_string());
    assert!(matches!(
        decrypt_string(&key, &bogus, None),
        Err(CryptoError::AuthenticationFailed)
    ));
}

#[test]
fn non_utf8_plaintext_is_encoding_error() {
    let key = generate_random_key();
    let sealed = encrypt(&key, &[0xff, 0xfe, 0xfd], None).unwrap();
    let err = decrypt_string(&key, &sealed.to_encrypted_string(), None).unwrap_err();
    assert!(matches!(err, CryptoError::Encoding(_)));
}

// ── Boundary Conditions ──

#[test]
fn encrypt_decrypt_empty_plaintext() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"", Some(EncryptionTag::ItemContent)).unwrap();
    assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
    assert!(decrypt(&key, &sealed, Some(EncryptionTag::ItemContent)).unwrap().is_empty());
}

#[test]
fn encrypt_decrypt_large_plaintext() {
    let key = generate_random_key();
    let large = vec![0xAB; 1024 * 1024];
    let sealed = encrypt(&key, &large, None).unwrap();
    assert_eq!(decrypt(&key, &sealed, None).unwrap(), large);
}

#[test]
fn encrypt_produces_unique_envelopes() {
    let key = generate_random_key();
    let plaintext = b"same plaintext encrypted twice";

    let a = encrypt(&key, plaintext, Some(EncryptionTag::ItemContent)).unwrap();
    let b = encrypt(&key, plaintext, Some(EncryptionTag::ItemContent)).unwrap();

    assert_ne!(a.as_bytes()[..NONCE_SIZE], b.as_bytes()[..NONCE_SIZE], "nonces should differ");
    assert_ne!(a, b, "envelopes should differ");

    assert_eq!(decrypt(&key, &a, Some(EncryptionTag::ItemContent)).unwrap(), plaintext);
    assert_eq!(decrypt(&key, &b, Some(EncryptionTag::ItemContent)).unwrap(), plaintext);
}

// ── Encoding ──

#[test]
fn string_envelope_is_base64_of_byte_envelope() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"layout", None).unwrap();
    let text = sealed.to_encrypted_string();

    assert_eq!(text.to_encrypted_bytes().unwrap(), sealed);
    assert_eq!(decrypt_string(&key, &text, None).unwrap(), "layout");
}

#[test]
fn envelopes_survive_json() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"serialize me", Some(EncryptionTag::VaultContent)).unwrap();

    let json = serde_json::to_vec(&sealed).unwrap();
    let restored: EncryptedBytes = serde_json::from_slice(&json).unwrap();

    assert_eq!(
        decrypt(&key, &restored, Some(EncryptionTag::VaultContent)).unwrap(),
        b"serialize me"
    );
}
