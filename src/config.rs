use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Level;

/// Logstash envelope shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormatVersion {
    #[default]
    V0,
    V1,
}

impl FormatVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::V0 => "v0",
            FormatVersion::V1 => "v1",
        }
    }
}

/// Case-insensitive. Anything other than `v1` falls back to `v0`.
impl From<&str> for FormatVersion {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("v1") {
            FormatVersion::V1
        } else {
            FormatVersion::V0
        }
    }
}

impl From<String> for FormatVersion {
    fn from(value: String) -> Self {
        FormatVersion::from(value.as_str())
    }
}

impl From<FormatVersion> for String {
    fn from(version: FormatVersion) -> Self {
        version.as_str().to_string()
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection pool tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle connections kept for reuse.
    pub max_idle: usize,

    /// Idle connections older than this are closed instead of reused.
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 3,
            idle_timeout: Duration::from_secs(240),
        }
    }
}

/// Hook configuration. Fixed once the hook is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub host: String,
    pub port: u16,

    /// Name of the list events are pushed onto.
    pub key: String,

    pub format: FormatVersion,

    /// Least severe level that is shipped.
    pub min_level: Level,

    /// Deliver from a background worker instead of the calling task.
    #[serde(rename = "async")]
    pub async_delivery: bool,

    /// Bound of the delivery queue. Only used in async mode.
    pub queue_capacity: usize,

    pub pool: PoolConfig,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            key: "logstash".to_string(),
            format: FormatVersion::V0,
            min_level: Level::Info,
            async_delivery: false,
            queue_capacity: 1_000,
            pool: PoolConfig::default(),
        }
    }
}

impl HookConfig {
    /// Synchronous V0 hook for `host:port`, pushing to `key`.
    pub fn new(host: impl Into<String>, port: u16, key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            key: key.into(),
            ..Default::default()
        }
    }

    /// Select the envelope format. Unknown names select V0.
    pub fn with_format(mut self, format: impl AsRef<str>) -> Self {
        self.format = FormatVersion::from(format.as_ref());
        self
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Deliver asynchronously through a queue holding up to `capacity` events.
    pub fn with_async(mut self, capacity: usize) -> Self {
        self.async_delivery = true;
        self.queue_capacity = capacity;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// `host:port` as used for dialing and in error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selection_is_lenient() {
        assert_eq!(FormatVersion::from("V1"), FormatVersion::V1);
        assert_eq!(FormatVersion::from("v1"), FormatVersion::V1);
        assert_eq!(FormatVersion::from("V0"), FormatVersion::V0);
        assert_eq!(FormatVersion::from("bogus"), FormatVersion::V0);
        assert_eq!(FormatVersion::from(""), FormatVersion::V0);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: HookConfig = serde_json::from_str(
            r#"{"host": "redis.internal", "key": "app_logs", "format": "V1", "min_level": "warn", "async": true}"#,
        )
        .unwrap();

        assert_eq!(config.host, "redis.internal");
        assert_eq!(config.port, 6379);
        assert_eq!(config.key, "app_logs");
        assert_eq!(config.format, FormatVersion::V1);
        assert_eq!(config.min_level, Level::Warn);
        assert!(config.async_delivery);
        assert_eq!(config.queue_capacity, 1_000);
        assert_eq!(config.pool, PoolConfig::default());
    }

    #[test]
    fn unknown_format_in_config_falls_back() {
        let config: HookConfig = serde_json::from_str(r#"{"format": "v7"}"#).unwrap();
        assert_eq!(config.format, FormatVersion::V0);
    }
}
