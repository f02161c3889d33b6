//! Suricata EVE JSON decoder

use std::net::IpAddr;

use chrono::{DateTime, FixedOffset};
use contracts::{AlertInfo, DecodeError, EventDecoder, SecurityEvent};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Timestamp layouts accepted after RFC 3339 (Suricata writes `+0000` offsets)
const EVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];

/// Wire shape of an EVE record
#[derive(Debug, Deserialize)]
struct EveRecord {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    src_ip: Option<IpAddr>,
    #[serde(default)]
    dest_ip: Option<IpAddr>,
    #[serde(default)]
    alert: Option<AlertInfo>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// Decodes Suricata EVE JSON payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct EveDecoder;

impl EveDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl EventDecoder for EveDecoder {
    fn decode(&self, payload: &[u8]) -> Result<SecurityEvent, DecodeError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }

        let record: EveRecord = serde_json::from_slice(payload)?;
        let raw_ts = record.timestamp.unwrap_or_default();
        let timestamp = parse_event_time(&raw_ts).ok_or(DecodeError::Timestamp { value: raw_ts })?;

        Ok(SecurityEvent {
            timestamp,
            src_ip: record.src_ip,
            dest_ip: record.dest_ip,
            alert: record.alert,
            fields: record.fields,
        })
    }
}

/// Parse an EVE timestamp, `None` if no known layout matches
pub fn parse_event_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }
    EVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
}
