//! Store configuration

use serde::{Deserialize, Serialize};
use triage_bus::DEFAULT_CAPACITY;
use triage_index::DEFAULT_BATCH_SIZE;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Not valid TOML for a store configuration
    #[error("invalid store configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but out of range
    #[error("invalid store configuration: {0}")]
    Invalid(String),
}

/// Store tuning knobs
///
/// ```toml
/// index_batch_size = 100
/// bus_capacity = 1024
/// default_status = "open"
/// activity_log = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Summaries per indexing batch
    pub index_batch_size: usize,
    /// Events a change subscriber may lag behind
    pub bus_capacity: usize,
    /// Status of tickets created without one
    pub default_status: String,
    /// Record activity log entries for mutations
    pub activity_log: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_batch_size: DEFAULT_BATCH_SIZE,
            bus_capacity: DEFAULT_CAPACITY,
            default_status: "open".to_string(),
            activity_log: true,
        }
    }
}

impl StoreConfig {
    /// Parse and check a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_batch_size == 0 {
            return Err(ConfigError::Invalid("index_batch_size must be positive".into()));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Invalid("bus_capacity must be positive".into()));
        }
        if self.default_status.trim().is_empty() {
            return Err(ConfigError::Invalid("default_status must not be empty".into()));
        }
        Ok(())
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_index_batch_size(mut self, size: usize) -> Self {
        self.index_batch_size = size;
        self
    }

    /// With bus capacity
    #[inline]
    #[must_use]
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// With default status
    #[inline]
    #[must_use]
    pub fn with_default_status(mut self, status: impl Into<String>) -> Self {
        self.default_status = status.into();
        self
    }

    /// With or without activity logging
    #[inline]
    #[must_use]
    pub fn with_activity_log(mut self, enabled: bool) -> Self {
        self.activity_log = enabled;
        self
    }
}
