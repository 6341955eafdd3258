//! Configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlfsConfig {
    /// Local disk backend settings
    pub local: LocalConfig,

    /// Deadline applied to each top-level operation started by tools built on
    /// this crate; `None` means no deadline
    #[serde(with = "humantime_serde_opt")]
    pub default_timeout: Option<Duration>,
}

impl UrlfsConfig {
    /// Parse a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&text)
    }

    /// Reject settings no backend can work with
    pub fn validate(&self) -> Result<()> {
        self.local.validate()?;
        if self.default_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig {
                message: "default_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Local disk backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Register the local backend at all
    pub enabled: bool,

    /// URL scheme the local backend is registered under
    pub scheme: String,

    /// Directory URL paths are resolved beneath; absolute paths if unset
    pub root: Option<PathBuf>,

    /// How often watched files are polled for changes
    #[serde(with = "humantime_serde")]
    pub watch_interval: Duration,

    /// Capacity of each watch's error channel
    pub watch_error_capacity: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scheme: "file".to_string(),
            root: None,
            watch_interval: Duration::from_secs(1),
            watch_error_capacity: 16,
        }
    }
}

impl LocalConfig {
    fn validate(&self) -> Result<()> {
        if self.scheme.is_empty() {
            return Err(Error::InvalidConfig {
                message: "local.scheme must not be empty".to_string(),
            });
        }
        if self.watch_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "local.watch_interval must be greater than zero".to_string(),
            });
        }
        if self.watch_error_capacity == 0 {
            return Err(Error::InvalidConfig {
                message: "local.watch_error_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Duration serialization helper for human-readable formats
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Same as [`humantime_serde`] for optional durations
mod humantime_serde_opt {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
