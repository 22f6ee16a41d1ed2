//! Recorder configuration.
//!
//! Tests usually rely on [`RecorderConfig::default`]. Suites that share
//! settings across many recorders can keep them in a YAML file:
//!
//! ```yaml
//! label: "loading-flag"
//! wait_timeout_ms: 250
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Settings applied to a single recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Name carried in log fields and snapshots.
    #[serde(default)]
    pub label: Option<String>,

    /// Deadline for the `wait_for_*` helpers, in milliseconds.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

fn default_wait_timeout_ms() -> u64 {
    1000
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            label: None,
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl RecorderConfig {
    /// Parses configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading recorder configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_yaml(&content)?;
        debug!(
            label = config.label.as_deref().unwrap_or("unlabelled"),
            wait_timeout_ms = config.wait_timeout_ms,
            "Recorder configuration loaded"
        );
        Ok(config)
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the wait deadline, in whole milliseconds and never below one.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// Deadline for the `wait_for_*` helpers.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Rejects settings that would make every wait fail immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("wait_timeout_ms must be greater than zero")]
    InvalidTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.label, None);
        assert_eq!(config.wait_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
label: "loading-flag"
wait_timeout_ms: 250
"#;
        let config = RecorderConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.label.as_deref(), Some("loading-flag"));
        assert_eq!(config.wait_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = RecorderConfig::from_yaml("label: only-label").unwrap();
        assert_eq!(config.wait_timeout_ms, 1000);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = RecorderConfig::from_yaml("wait_timeout_ms: 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = RecorderConfig::from_yaml("wait_timeout_ms: [nope").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "label: from-file\nwait_timeout_ms: 50").unwrap();

        let config = RecorderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.label.as_deref(), Some("from-file"));
        assert_eq!(config.wait_timeout_ms, 50);
    }

    #[test]
    fn test_from_missing_file() {
        let err = RecorderConfig::from_file("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_builders() {
        let config = RecorderConfig::default()
            .with_label("ticks")
            .with_wait_timeout(Duration::from_millis(20));
        assert_eq!(config.label.as_deref(), Some("ticks"));
        assert_eq!(config.wait_timeout_ms, 20);
    }

    #[test]
    fn test_sub_millisecond_timeout_stays_valid() {
        let config = RecorderConfig::default().with_wait_timeout(Duration::from_micros(500));
        assert_eq!(config.wait_timeout_ms, 1);
        assert!(config.validate().is_ok());

        let config = RecorderConfig::default().with_wait_timeout(Duration::MAX);
        assert_eq!(config.wait_timeout_ms, u64::MAX);
    }
}
