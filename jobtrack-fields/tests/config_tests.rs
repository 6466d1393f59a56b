use jobtrack_crypto::{KeyManager, KeyStrategy, MIN_ITERATIONS};
use jobtrack_fields::{DecryptMode, FieldCryptoConfig};

#[test]
fn default_kdf_iterations() {
    let config = FieldCryptoConfig::default();
    assert_eq!(config.kdf_iterations, 100_000);
    assert_eq!(config.kdf_params().iterations, MIN_ITERATIONS);
}

#[test]
fn default_key_strategy_is_volatile() {
    let config = FieldCryptoConfig::default();
    assert_eq!(config.key_strategy, "volatile");
    assert!(config.key_db_path.is_none());
}

#[test]
fn default_threshold() {
    let config = FieldCryptoConfig::default();
    assert_eq!(config.encrypted_length_threshold, 50);
}

#[test]
fn default_modes() {
    let config = FieldCryptoConfig::default();
    assert_eq!(config.single_record_mode, DecryptMode::Strict);
    assert_eq!(config.batch_mode, DecryptMode::Lenient);
}

#[test]
fn key_store_config_carries_strategy_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = FieldCryptoConfig {
        key_strategy: "durable".to_string(),
        key_db_path: Some(dir.path().join("keys.duckdb")),
        ..Default::default()
    };
    let store = config.key_store_config();
    assert_eq!(store.strategy, "durable");
    assert_eq!(store.db_path, config.key_db_path);

    let manager = KeyManager::open(&store).unwrap();
    assert_eq!(manager.strategy(), KeyStrategy::Durable);
}

#[test]
fn modes_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&DecryptMode::Lenient).unwrap(), "\"lenient\"");
    let parsed: DecryptMode = serde_json::from_str("\"strict\"").unwrap();
    assert_eq!(parsed, DecryptMode::Strict);
}

#[test]
fn serialization_roundtrip() {
    let config = FieldCryptoConfig {
        batch_mode: DecryptMode::Strict,
        encrypted_length_threshold: 64,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let deserialized: FieldCryptoConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.kdf_iterations, config.kdf_iterations);
    assert_eq!(deserialized.key_strategy, config.key_strategy);
    assert_eq!(deserialized.key_db_path, config.key_db_path);
    assert_eq!(deserialized.encrypted_length_threshold, 64);
    assert_eq!(deserialized.single_record_mode, DecryptMode::Strict);
    assert_eq!(deserialized.batch_mode, DecryptMode::Strict);
}
