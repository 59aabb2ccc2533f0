use ironlog_data::MockStorage;
use ironlog_loader::{ConfigError, LoaderConfig, LoaderFactory};
use std::time::Duration;

#[test]
fn test_defaults() {
    let config = LoaderConfig::default();
    assert_eq!(config.batch_delay_ms, 0);
    assert_eq!(config.max_batch_size, 500);
    assert_eq!(config.batch_delay(), Duration::ZERO);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_yaml_section() {
    let yaml = r#"
app:
  name: ironlog
loader:
  batch_delay_ms: 2
  max_batch_size: 100
"#;
    let config = LoaderConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(
        config,
        LoaderConfig::new().with_batch_delay(2).with_max_batch_size(100)
    );
}

#[test]
fn test_missing_section_uses_defaults() {
    let config = LoaderConfig::from_yaml_str("app:\n  name: ironlog\n").unwrap();
    assert_eq!(config, LoaderConfig::default());

    let config = LoaderConfig::from_yaml_str("loader:\n").unwrap();
    assert_eq!(config, LoaderConfig::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(matches!(
        LoaderConfig::from_yaml_str("loader:\n  max_batch_size: 0\n"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        LoaderConfig::from_yaml_str("loader:\n  batch_delay_ms: 5000\n"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        LoaderConfig::from_yaml_str("loader:\n  max_batch_size: lots\n"),
        Err(ConfigError::Load(_))
    ));
    assert!(matches!(
        LoaderConfig::from_yaml_str("loader: [unterminated"),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_factory_validates_config() {
    let bad = LoaderConfig::new().with_batch_delay(60_000);
    assert!(LoaderFactory::new(MockStorage::new(), bad).is_err());

    let factory = LoaderFactory::new(MockStorage::new(), LoaderConfig::default()).unwrap();
    assert_eq!(factory.config().max_batch_size, 500);
}
