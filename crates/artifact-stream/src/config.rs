//! Streaming configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! max_plan_steps = 30
//! writer_channel_capacity = 256
//! session_timeout_ms = 120000
//! log_deltas = true
//! ```

use artifact_core::kinds::MAX_PLAN_STEPS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Settings shared by the sessions of one producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Upper bound on plan steps accepted by the aggregation helpers
    pub max_plan_steps: usize,
    /// Queued operations per channel writer before data writes are merged
    pub writer_channel_capacity: usize,
    /// Deadline after which a watched session is failed with `Timeout`
    pub session_timeout_ms: Option<u64>,
    /// Log every delta body at `trace`
    pub log_deltas: bool,
}

impl StreamConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max plan steps
    #[inline]
    #[must_use]
    pub fn with_max_plan_steps(mut self, max: usize) -> Self {
        self.max_plan_steps = max;
        self
    }

    /// With writer channel capacity
    #[inline]
    #[must_use]
    pub fn with_writer_channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_channel_capacity = capacity;
        self
    }

    /// With session timeout
    #[inline]
    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// With delta logging
    #[inline]
    #[must_use]
    pub fn with_log_deltas(mut self, enabled: bool) -> Self {
        self.log_deltas = enabled;
        self
    }

    /// Session timeout as a duration
    #[inline]
    #[must_use]
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML or out-of-range values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "stream config loaded");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns error naming the first out-of-range field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_plan_steps == 0 || self.max_plan_steps > MAX_PLAN_STEPS {
            return Err(ConfigError::Invalid(format!(
                "max_plan_steps must be in 1..={MAX_PLAN_STEPS}, got {}",
                self.max_plan_steps
            )));
        }
        if self.writer_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "writer_channel_capacity must be positive".to_string(),
            ));
        }
        if self.session_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "session_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_plan_steps: MAX_PLAN_STEPS,
            writer_channel_capacity: 1024,
            session_timeout_ms: None,
            log_deltas: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_is_default() {
        let config = StreamConfig::from_toml_str("").unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.max_plan_steps, 50);
        assert!(config.session_timeout().is_none());
    }

    #[test]
    fn toml_overrides() {
        let config = StreamConfig::from_toml_str(
            "max_plan_steps = 10\nsession_timeout_ms = 2500\nlog_deltas = true\n",
        )
        .unwrap();
        assert_eq!(config.max_plan_steps, 10);
        assert_eq!(config.session_timeout(), Some(Duration::from_millis(2500)));
        assert!(config.log_deltas);
        assert_eq!(config.writer_channel_capacity, 1024);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            StreamConfig::from_toml_str("max_plan_steps = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StreamConfig::from_toml_str("max_plan_steps = 51"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StreamConfig::from_toml_str("writer_channel_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            StreamConfig::from_toml_str("max_steps = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "writer_channel_capacity = 8").unwrap();
        let config = StreamConfig::load(file.path()).unwrap();
        assert_eq!(config.writer_channel_capacity, 8);
    }

    #[test]
    fn load_missing_file() {
        let err = StreamConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn builder_methods() {
        let config = StreamConfig::new()
            .with_max_plan_steps(5)
            .with_writer_channel_capacity(3)
            .with_session_timeout(Duration::from_secs(2))
            .with_log_deltas(true);
        assert_eq!(config.session_timeout_ms, Some(2000));
        assert!(config.validate().is_ok());
    }
}
