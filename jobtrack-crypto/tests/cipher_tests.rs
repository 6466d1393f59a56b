//! Adversarial tests for the field-value cipher (PBKDF2 + AES-256-GCM).
//!
//! Validates that:
//! - Values round-trip and every encryption uses a fresh IV
//! - Wrong keys, tampered bytes and non-ciphertext input are rejected
//! - Derivation from the same password and user id is interchangeable
//! - JSON objects round-trip, with timestamps normalized to ISO-8601

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{TimeZone, Utc};
use jobtrack_crypto::{
    CryptoError, KdfParams, MIN_ENCODED_LEN, Salt, decrypt_object, decrypt_string, derive_key,
    derive_user_key, encrypt_object, encrypt_string, generate_random_key,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[test]
fn string_roundtrip() {
    let key = generate_random_key();
    let encoded = encrypt_string("Senior Backend Engineer", &key).unwrap();
    assert_eq!(decrypt_string(&encoded, &key).unwrap(), "Senior Backend Engineer");
}

#[test]
fn empty_and_unicode_strings_roundtrip() {
    let key = generate_random_key();
    let long = "x".repeat(10_000);
    for plaintext in ["", "ü", "Zürich — 東京 🚀", long.as_str()] {
        let encoded = encrypt_string(plaintext, &key).unwrap();
        assert_eq!(decrypt_string(&encoded, &key).unwrap(), plaintext);
    }
}

#[test]
fn same_plaintext_encrypts_differently() {
    let key = generate_random_key();
    let a = encrypt_string("Acme", &key).unwrap();
    let b = encrypt_string("Acme", &key).unwrap();
    assert_ne!(a, b);
    assert_eq!(decrypt_string(&a, &key).unwrap(), "Acme");
    assert_eq!(decrypt_string(&b, &key).unwrap(), "Acme");
}

#[test]
fn output_is_base64_and_long() {
    let key = generate_random_key();
    let encoded = encrypt_string("Acme", &key).unwrap();
    assert!(encoded.len() > 50);
    assert!(encoded.len() >= MIN_ENCODED_LEN);
    assert!(BASE64.decode(&encoded).is_ok());
}

#[test]
fn wrong_key_fails_with_decryption_failure() {
    let key_a = generate_random_key();
    let key_b = generate_random_key();
    let encoded = encrypt_string("secret notes", &key_a).unwrap();

    let err = decrypt_string(&encoded, &key_b).unwrap_err();
    match err {
        CryptoError::DecryptionFailure(msg) => {
            assert!(
                msg.contains("wrong key") || msg.contains("tampered"),
                "should indicate wrong key or tampered data, got: {msg}"
            );
        }
        other => panic!("expected CryptoError::DecryptionFailure, got: {other:?}"),
    }
}

#[test]
fn tampered_ciphertext_detected() {
    let key = generate_random_key();
    let encoded = encrypt_string("salary: 120k", &key).unwrap();
    let mut blob = BASE64.decode(&encoded).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0xFF;

    let err = decrypt_string(&BASE64.encode(blob), &key).unwrap_err();
    assert!(matches!(err, CryptoError::DecryptionFailure(_)));
}

#[test]
fn tampered_iv_detected() {
    let key = generate_random_key();
    let encoded = encrypt_string("salary: 120k", &key).unwrap();
    let mut blob = BASE64.decode(&encoded).unwrap();
    blob[0] ^= 0x01;

    assert!(matches!(
        decrypt_string(&BASE64.encode(blob), &key),
        Err(CryptoError::DecryptionFailure(_))
    ));
}

#[test]
fn plaintext_input_rejected() {
    let key = generate_random_key();
    for input in ["Acme", "not base64!", "", "QWNtZSBDb3Jwb3JhdGlvbg=="] {
        let err = decrypt_string(input, &key).unwrap_err();
        assert!(
            matches!(err, CryptoError::DecryptionFailure(_)),
            "input {input:?} should fail as DecryptionFailure, got {err:?}"
        );
    }
}

#[test]
fn derived_keys_are_interchangeable() {
    let params = KdfParams::default();
    let k1 = derive_user_key("correct-horse", "user-42", &params).unwrap();
    let k2 = derive_user_key("correct-horse", "user-42", &params).unwrap();

    let from_k1 = encrypt_string("Acme", &k1).unwrap();
    let from_k2 = encrypt_string("Globex", &k2).unwrap();
    assert_eq!(decrypt_string(&from_k1, &k2).unwrap(), "Acme");
    assert_eq!(decrypt_string(&from_k2, &k1).unwrap(), "Globex");
}

#[test]
fn derive_with_explicit_user_salt_matches_convenience() {
    let params = KdfParams::default();
    let salt = Salt::for_user("user-42").unwrap();
    let explicit = derive_key("correct-horse", &salt, &params).unwrap();
    let convenience = derive_user_key("correct-horse", "user-42", &params).unwrap();

    let encoded = encrypt_string("sample", &explicit).unwrap();
    assert_eq!(decrypt_string(&encoded, &convenience).unwrap(), "sample");
}

#[test]
fn different_password_cannot_decrypt() {
    let params = KdfParams::default();
    let right = derive_user_key("correct-horse", "user-42", &params).unwrap();
    let wrong = derive_user_key("battery-staple", "user-42", &params).unwrap();

    let encoded = encrypt_string("Acme", &right).unwrap();
    assert!(matches!(
        decrypt_string(&encoded, &wrong),
        Err(CryptoError::DecryptionFailure(_))
    ));
}

#[test]
fn empty_inputs_rejected_at_derivation() {
    let params = KdfParams::default();
    assert!(matches!(
        derive_user_key("", "user-42", &params),
        Err(CryptoError::InvalidInput(_))
    ));
    assert!(matches!(
        derive_user_key("pw", "", &params),
        Err(CryptoError::InvalidInput(_))
    ));
}

#[test]
fn object_roundtrip_preserves_structure() {
    let key = generate_random_key();
    let value = json!({
        "company": "Acme",
        "rounds": [1, 2, {"panel": true}],
        "offer": null,
        "nested": {"deep": {"deeper": "yes"}}
    });

    let encoded = encrypt_object(&value, &key).unwrap();
    let decoded: serde_json::Value = decrypt_object(&encoded, &key).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn null_and_none_roundtrip() {
    let key = generate_random_key();

    let encoded = encrypt_object(&serde_json::Value::Null, &key).unwrap();
    let decoded: serde_json::Value = decrypt_object(&encoded, &key).unwrap();
    assert_eq!(decoded, serde_json::Value::Null);

    let none: Option<String> = None;
    let encoded = encrypt_object(&none, &key).unwrap();
    let decoded: Option<String> = decrypt_object(&encoded, &key).unwrap();
    assert_eq!(decoded, None);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Interview {
    stage: String,
    scheduled_at: chrono::DateTime<Utc>,
}

#[test]
fn timestamps_are_normalized_to_iso_strings() {
    let key = generate_random_key();
    let interview = Interview {
        stage: "onsite".to_string(),
        scheduled_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
    };

    let encoded = encrypt_object(&interview, &key).unwrap();

    let untyped: serde_json::Value = decrypt_object(&encoded, &key).unwrap();
    assert_eq!(untyped["scheduled_at"], json!("2024-03-05T14:30:00Z"));

    let typed: Interview = decrypt_object(&encoded, &key).unwrap();
    assert_eq!(typed, interview);
}

// Property-based tests
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn string_always_roundtrips(plaintext in ".*") {
            let key = generate_random_key();
            let encoded = encrypt_string(&plaintext, &key).unwrap();
            prop_assert!(encoded.len() > 50);
            prop_assert_eq!(decrypt_string(&encoded, &key).unwrap(), plaintext);
        }

        #[test]
        fn foreign_key_never_decrypts(plaintext in ".{0,64}") {
            let key = generate_random_key();
            let other = generate_random_key();
            let encoded = encrypt_string(&plaintext, &key).unwrap();
            prop_assert!(decrypt_string(&encoded, &other).is_err());
        }
    }
}
