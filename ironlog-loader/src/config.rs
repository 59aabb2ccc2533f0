//! Configuration for the request loader.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

fn default_batch_delay_ms() -> u64 { 0 }
fn default_max_batch_size() -> usize { 500 }

/// Longest batch window accepted by [`LoaderConfig::validate`].
const MAX_BATCH_DELAY_MS: u64 = 1_000;

/// Errors raised while loading or validating a [`LoaderConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    Load(String),
    /// A value is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "Loader config load error: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid loader config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Tuning for batch windows.
///
/// Deserialized from the `loader` section of `application.yaml`. Every
/// field has a default, so the section may be omitted entirely.
///
/// ```yaml
/// loader:
///   batch_delay_ms: 0     # default: 0 (flush at the end of the current tick)
///   max_batch_size: 500   # default: 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoaderConfig {
    /// How long a window stays open after its first key, in milliseconds.
    ///
    /// `0` flushes as soon as the current resolution tick yields, which is
    /// enough on a current-thread runtime. Multi-threaded runtimes may want
    /// a millisecond or two so siblings polled on other workers pile up.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Maximum keys handed to storage in a single flush. Overflow waits for
    /// the next window.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: default_batch_delay_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch window delay in milliseconds.
    pub fn with_batch_delay(mut self, ms: u64) -> Self {
        self.batch_delay_ms = ms;
        self
    }

    /// Set the maximum number of keys per flush.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Read the `loader` section of a YAML document.
    ///
    /// A document without that section yields the defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use ironlog_loader::LoaderConfig;
    ///
    /// let config = LoaderConfig::from_yaml_str("loader:\n  max_batch_size: 50\n").unwrap();
    /// assert_eq!(config.max_batch_size, 50);
    /// assert_eq!(config.batch_delay_ms, 0);
    /// ```
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
        let config = match doc.get("loader") {
            Some(section) if !section.is_null() => serde_yaml::from_value(section.clone())
                .map_err(|e| ConfigError::Load(e.to_string()))?,
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be at least 1".into()));
        }
        if self.batch_delay_ms > MAX_BATCH_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "batch_delay_ms cannot exceed {MAX_BATCH_DELAY_MS}"
            )));
        }
        Ok(())
    }
}
