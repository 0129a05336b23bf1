use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log event.
///
/// Ordered from least to most severe, so `Level::Warn < Level::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    /// All levels, least severe first.
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Panic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a valid log level: {0:?}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "panic" => Ok(Level::Panic),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = ParseLevelError;

    // `Self::Error` would be ambiguous with the `Level::Error` variant.
    fn try_from(value: String) -> Result<Self, ParseLevelError> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            _ => Level::Error,
        }
    }
}

/// Levels a hook wants to receive.
///
/// The raw slot sequence always starts with one reserved, empty slot
/// ahead of the real levels. It never names a severity: `iter`,
/// `contains` and `len` skip it, `slots` exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledLevels {
    slots: Vec<Option<Level>>,
}

impl EnabledLevels {
    /// `min_level` and every level more severe than it.
    pub fn at_or_above(min_level: Level) -> Self {
        let mut slots = vec![None];
        slots.extend(Level::ALL.iter().filter(|l| **l >= min_level).map(|l| Some(*l)));
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<Level>] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = Level> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    pub fn contains(&self, level: Level) -> bool {
        self.iter().any(|l| l == level)
    }

    /// Number of real levels, reserved slot excluded.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A custom field value attached to a log event.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Pre-rendered `Debug` output of a value with no native mapping.
    Debug(String),
}

impl FieldValue {
    /// The string a custom field is shipped as.
    ///
    /// Strings are kept verbatim. Everything else uses its display form.
    pub fn to_field_string(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Debug(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::I64(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::I64(value as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::U64(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::U64(value as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A structured log event handed to the hook.
///
/// The hook only reads it. Async delivery clones it into the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, FieldValue>,
}

impl LogEvent {
    /// Create an event stamped with the current time and no fields.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// Attach a custom field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Override the event time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_threshold_enables_warn_and_above() {
        let levels = EnabledLevels::at_or_above(Level::Warn);
        let real: Vec<Level> = levels.iter().collect();
        assert_eq!(real, vec![Level::Warn, Level::Error, Level::Fatal, Level::Panic]);
        assert_eq!(levels.slots().len(), 5);
        assert_eq!(levels.slots()[0], None);
        assert!(!levels.contains(Level::Info));
    }

    #[test]
    fn every_threshold_is_a_floor() {
        for min in Level::ALL {
            let levels = EnabledLevels::at_or_above(min);
            for level in Level::ALL {
                assert_eq!(levels.contains(level), level >= min, "min={min} level={level}");
            }
            assert_eq!(levels.slots()[0], None);
        }
        assert_eq!(EnabledLevels::at_or_above(Level::Debug).len(), 6);
        assert_eq!(EnabledLevels::at_or_above(Level::Panic).len(), 1);
    }

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!("WARN".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("Info".parse::<Level>(), Ok(Level::Info));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn level_deserializes_through_string_conversion() {
        let level: Level = serde_json::from_str("\"Warning\"").unwrap();
        assert_eq!(level, Level::Warn);
        assert_eq!(Level::try_from("panic".to_string()), Ok(Level::Panic));
        assert_eq!(serde_json::to_string(&Level::Warn).unwrap(), "\"warning\"");
    }

    #[test]
    fn unknown_level_error_names_the_input() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "not a valid log level: \"verbose\"");

        let err = serde_json::from_str::<Level>("\"loud\"").unwrap_err();
        assert!(err.to_string().contains("not a valid log level: \"loud\""));
    }

    #[test]
    fn non_string_fields_use_display_form() {
        assert_eq!(FieldValue::from("walrus").to_field_string(), "walrus");
        assert_eq!(FieldValue::from(1).to_field_string(), "1");
        assert_eq!(FieldValue::from(true).to_field_string(), "true");
        assert_eq!(FieldValue::from(2.5).to_field_string(), "2.5");
    }
}
