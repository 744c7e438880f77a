use codejudge::config::{Config, ConfigError, DriverKind};

use super::FIXTURES_PATH;

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    let python = config.get_language("python").expect("python not found");
    assert_eq!(python.driver, DriverKind::Python);
    assert!(!python.is_compiled());
    assert_eq!(config.docker.container_prefix, "codejudge");
    assert_eq!(config.harness.float_tolerance, 1e-6);
}

#[test]
fn test_load_invalid_empty_image() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_image.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_unknown_driver() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_driver.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_load_negative_tolerance() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_tolerance.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_file() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_example_config_is_default() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/codejudge.example.toml");
    let config = Config::from_file(path).expect("Failed to load example config");
    assert_eq!(
        config.language_ids(),
        Config::default().language_ids()
    );
}
