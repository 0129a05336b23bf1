use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::FormatVersion;
use crate::error::HookError;
use crate::hostname::report_hostname;
use crate::types::LogEvent;

/// Nested `@fields` block. Only `level` is ever filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvelopeFields {
    pub file: String,
    pub level: String,
    pub timestamp: String,
}

/// Logstash v0 message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageV0 {
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    #[serde(rename = "@source_host")]
    pub source_host: String,
    #[serde(rename = "@message")]
    pub message: String,
    /// Always empty; severity goes into `@fields.level`.
    #[serde(rename = "@level")]
    pub level: String,
    #[serde(rename = "@fields")]
    pub fields: EnvelopeFields,
    #[serde(rename = "@custom_fields")]
    pub custom_fields: BTreeMap<String, String>,
}

/// Logstash v1 message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageV1 {
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub host: String,
    pub message: String,
    #[serde(rename = "@fields")]
    pub fields: EnvelopeFields,
    #[serde(rename = "@custom_fields")]
    pub custom_fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    V0(MessageV0),
    V1(MessageV1),
}

impl Envelope {
    pub fn custom_fields(&self) -> &BTreeMap<String, String> {
        match self {
            Envelope::V0(m) => &m.custom_fields,
            Envelope::V1(m) => &m.custom_fields,
        }
    }

    pub fn source_host(&self) -> &str {
        match self {
            Envelope::V0(m) => &m.source_host,
            Envelope::V1(m) => &m.host,
        }
    }
}

/// Build the envelope for `event`, looking up the host name.
pub fn format(event: &LogEvent, version: FormatVersion) -> Envelope {
    format_with_host(event, version, report_hostname())
}

pub fn format_with_host(event: &LogEvent, version: FormatVersion, host: String) -> Envelope {
    let timestamp = rfc3339_nano(&event.timestamp);
    let fields = EnvelopeFields {
        level: event.level.to_string(),
        ..Default::default()
    };
    let custom_fields = custom_fields(event);

    match version {
        FormatVersion::V0 => Envelope::V0(MessageV0 {
            kind: None,
            timestamp,
            source_host: host,
            message: event.message.clone(),
            level: String::new(),
            fields,
            custom_fields,
        }),
        FormatVersion::V1 => Envelope::V1(MessageV1 {
            kind: None,
            timestamp,
            host,
            message: event.message.clone(),
            fields,
            custom_fields,
        }),
    }
}

/// Serialize an envelope to the bytes pushed onto the list.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, HookError> {
    Ok(serde_json::to_vec(envelope)?)
}

fn custom_fields(event: &LogEvent) -> BTreeMap<String, String> {
    event
        .fields
        .iter()
        .map(|(key, value)| (key.clone(), value.to_field_string()))
        .collect()
}

/// RFC 3339 in UTC with up to nanosecond precision and trailing zeros
/// trimmed, e.g. `2024-05-01T10:00:00.5Z`.
pub fn rfc3339_nano(ts: &DateTime<Utc>) -> String {
    let mut out = ts.format("%Y-%m-%dT%H:%M:%S").to_string();
    // Leap seconds report nanos past 1e9.
    let nanos = ts.timestamp_subsec_nanos().min(999_999_999);
    if nanos > 0 {
        let frac = format!("{:09}", nanos);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push('Z');
    out
}
