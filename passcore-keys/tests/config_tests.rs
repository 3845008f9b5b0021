use passcore_crypto::{CryptoError, KdfParams};
use passcore_keys::KeyringConfig;

#[test]
fn default_kdf_is_argon2id_64mib() {
    let config = KeyringConfig::default();
    assert_eq!(config.kdf.memory_kib, 64 * 1024);
    assert_eq!(config.kdf.iterations, 3);
    assert_eq!(config.kdf.parallelism, 4);
}

#[test]
fn default_rotation_workers() {
    assert_eq!(KeyringConfig::default().rotation_workers, 4);
}

#[test]
fn from_json_fills_missing_fields_with_defaults() {
    let config = KeyringConfig::from_json(r#"{ "rotation_workers": 8 }"#).unwrap();
    assert_eq!(config.rotation_workers, 8);
    assert_eq!(config.kdf, KdfParams::default());
}

#[test]
fn from_json_reads_kdf() {
    let json = r#"{
        "kdf": { "memory_kib": 19456, "iterations": 2, "parallelism": 1 },
        "rotation_workers": 1
    }"#;
    let config = KeyringConfig::from_json(json).unwrap();
    assert_eq!(
        config.kdf,
        KdfParams {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1
        }
    );
}

#[test]
fn from_json_rejects_zero_workers() {
    let err = KeyringConfig::from_json(r#"{ "rotation_workers": 0 }"#).unwrap_err();
    assert!(matches!(err, CryptoError::Config(_)));
}

#[test]
fn from_json_rejects_impossible_kdf() {
    let json = r#"{ "kdf": { "memory_kib": 1, "iterations": 0, "parallelism": 0 } }"#;
    assert!(matches!(KeyringConfig::from_json(json), Err(CryptoError::Config(_))));
}

#[test]
fn from_json_rejects_malformed_input() {
    assert!(matches!(
        KeyringConfig::from_json("{ not json"),
        Err(CryptoError::Config(_))
    ));
}

#[test]
fn config_round_trips_through_json() {
    let config = KeyringConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(KeyringConfig::from_json(&json).unwrap(), config);
}
