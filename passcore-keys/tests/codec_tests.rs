//! Versioned wire encoding of persisted blobs and item content.

mod support;

use passcore_crypto::{CryptoError, EncryptionKey};
use passcore_keys::codec::{
    KIND_ITEM, KIND_WRAPPED_ITEM_KEY, WIRE_VERSION, decode_versioned, encode_versioned,
};
use passcore_keys::{CustomField, Item, ItemKind, VaultMetadata, WrappedItemKey, WrappedVaultKey};
use pretty_assertions::assert_eq;
use support::{VaultFixture, fast_kdf};

fn every_item_kind() -> Vec<Item> {
    vec![
        Item {
            title: "Mail ✉".into(),
            note: "work account".into(),
            kind: ItemKind::Login {
                username: "alice@example.com".into(),
                password: "p@ss✅word".into(),
                urls: vec!["https://mail.example.com".into(), "https://example.com/login".into()],
                totp_uri: Some("otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP".into()),
            },
            custom_fields: vec![
                CustomField::Text {
                    name: "recovery".into(),
                    value: "blue".into(),
                },
                CustomField::Hidden {
                    name: "pin".into(),
                    value: "0000".into(),
                },
                CustomField::Totp {
                    name: "backup".into(),
                    uri: "otpauth://totp/backup".into(),
                },
            ],
        },
        Item::note("Groceries", "milk\neggs\n"),
        Item {
            title: "Newsletter alias".into(),
            note: String::new(),
            kind: ItemKind::Alias {
                alias_email: "news.x7k2@alias.example".into(),
            },
            custom_fields: Vec::new(),
        },
        Item {
            title: "Router".into(),
            note: String::new(),
            kind: ItemKind::Password {
                password: "hunter2".into(),
            },
            custom_fields: Vec::new(),
        },
    ]
}

#[test]
fn every_item_kind_survives_encode_encrypt_decrypt_decode() {
    let vault = VaultFixture::new();
    for item in every_item_kind() {
        let (item_key, _) = vault.add_item();
        let sealed = item_key.encrypt_item(&item).unwrap();
        assert_eq!(item_key.decrypt_item(&sealed).unwrap(), item, "{}", item.kind.name());
    }
}

#[test]
fn wrapped_keys_survive_the_wire() {
    let vault = VaultFixture::new();
    let (_, wrapped_item) = vault.add_item();

    let vault_bytes = vault.wrapped_vault_key.to_wire().unwrap();
    let item_bytes = wrapped_item.to_wire().unwrap();

    assert_eq!(WrappedVaultKey::from_wire(&vault_bytes).unwrap(), vault.wrapped_vault_key);
    assert_eq!(WrappedItemKey::from_wire(&item_bytes).unwrap(), wrapped_item);
}

#[test]
fn passphrase_wrapper_survives_the_wire() {
    let vault = VaultFixture::new();
    let vault_key = vault.hierarchy.active_vault_key(&vault.vault_id).unwrap();
    let wrapped = vault_key
        .wrap_with_passphrase(&EncryptionKey::generate(), "pw", &fast_kdf())
        .unwrap();

    let restored = WrappedVaultKey::from_wire(&wrapped.to_wire().unwrap()).unwrap();
    assert_eq!(restored.passphrase, wrapped.passphrase);
}

#[test]
fn blobs_are_not_interchangeable() {
    let vault = VaultFixture::new();
    let (_, wrapped_item) = vault.add_item();
    let item_bytes = wrapped_item.to_wire().unwrap();

    assert!(matches!(
        WrappedVaultKey::from_wire(&item_bytes),
        Err(CryptoError::Encoding(_))
    ));
    assert!(matches!(
        VaultMetadata::from_wire(&item_bytes),
        Err(CryptoError::Encoding(_))
    ));
}

#[test]
fn unsupported_version_is_rejected() {
    let vault = VaultFixture::new();
    let (_, wrapped_item) = vault.add_item();

    let mut value: serde_json::Value =
        serde_json::from_slice(&wrapped_item.to_wire().unwrap()).unwrap();
    assert_eq!(value["kind"], KIND_WRAPPED_ITEM_KEY);
    assert_eq!(value["version"], WIRE_VERSION);
    value["version"] = serde_json::json!(WIRE_VERSION + 1);

    let err = WrappedItemKey::from_wire(&serde_json::to_vec(&value).unwrap()).unwrap_err();
    assert!(matches!(err, CryptoError::Encoding(_)));
}

#[test]
fn garbage_is_an_encoding_error() {
    assert!(matches!(
        decode_versioned::<Item>(KIND_ITEM, b"\x00\x01not json"),
        Err(CryptoError::Encoding(_))
    ));
    let wrong_payload = encode_versioned(KIND_ITEM, &serde_json::json!({ "title": 5 })).unwrap();
    assert!(matches!(
        Item::from_wire(&wrong_payload),
        Err(CryptoError::Encoding(_))
    ));
}

#[test]
fn custom_fields_default_to_empty() {
    let legacy = concat!(
        r#"{"kind":"item","version":1,"#,
        r#""payload":{"title":"t","note":"n","kind":{"type":"note"}}}"#
    );
    let item = Item::from_wire(legacy.as_bytes()).unwrap();
    assert_eq!(item, Item::note("t", "n"));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_item() -> impl Strategy<Value = Item> {
        let kind = prop_oneof![
            Just(ItemKind::Note),
            ".*".prop_map(|password| ItemKind::Password { password }),
            "[a-z0-9.]{1,20}@[a-z]{1,10}\\.test"
                .prop_map(|alias_email| ItemKind::Alias { alias_email }),
            (".*", ".*", prop::collection::vec(".*", 0..3), prop::option::of(".*")).prop_map(
                |(username, password, urls, totp_uri)| ItemKind::Login {
                    username,
                    password,
                    urls,
                    totp_uri,
                }
            ),
        ];
        (".*", ".*", kind).prop_map(|(title, note, kind)| Item {
            title,
            note,
            kind,
            custom_fields: Vec::new(),
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn item_wire_round_trip(item in arb_item()) {
            let bytes = item.to_wire().unwrap();
            prop_assert_eq!(Item::from_wire(&bytes).unwrap(), item);
        }
    }
}
