use super::config::{BridgeConfig, ConfigError};

#[test]
fn test_builder_valid() {
    let config = BridgeConfig::builder()
        .device_id("6E:D8:32:FB:11:A4")
        .setup_code("031-45-154")
        .store_dir("/tmp/bridge")
        .build()
        .unwrap();

    assert_eq!(config.device_id, "6E:D8:32:FB:11:A4");
    assert_eq!(config.setup_code, "031-45-154");
}

#[test]
fn test_invalid_device_id() {
    let result = BridgeConfig::builder()
        .device_id("6ED832FB11A4")
        .setup_code("031-45-154")
        .build();

    assert!(matches!(result, Err(ConfigError::InvalidDeviceId(_))));
}

#[test]
fn test_invalid_setup_code() {
    for code in ["03145154", "031-45-15a", "0314-5-154", "031 45 154"] {
        let result = BridgeConfig::builder()
            .device_id("6E:D8:32:FB:11:A4")
            .setup_code(code)
            .build();
        assert!(
            matches!(result, Err(ConfigError::InvalidSetupCode)),
            "accepted {code:?}"
        );
    }
}

#[test]
fn test_random_setup_code_shape() {
    for _ in 0..32 {
        let code = BridgeConfig::random_setup_code();
        assert_eq!(code.len(), 10);
        assert_eq!(code.as_bytes()[3], b'-');
        assert_eq!(code.as_bytes()[6], b'-');
    }
}

#[test]
fn test_debug_hides_setup_code() {
    let config = BridgeConfig::builder()
        .device_id("6E:D8:32:FB:11:A4")
        .setup_code("031-45-154")
        .build()
        .unwrap();

    let rendered = format!("{config:?}");
    assert!(!rendered.contains("031-45-154"));
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.json");

    let config = BridgeConfig::builder()
        .device_id("6E:D8:32:FB:11:A4")
        .setup_code("031-45-154")
        .store_dir(dir.path())
        .build()
        .unwrap();

    config.save(&path).unwrap();
    let loaded = BridgeConfig::load(&path).unwrap();
    assert_eq!(loaded.device_id, config.device_id);
    assert_eq!(loaded.setup_code, config.setup_code);
}
