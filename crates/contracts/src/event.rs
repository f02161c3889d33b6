//! RawMessage / SecurityEvent - Ingestion output
//!
//! Raw broker payloads and the decoded sensor event.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::IpAddr;

/// Raw message as delivered by the broker
///
/// Consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Topic the message was published on
    pub topic: String,

    /// Opaque payload (zero-copy)
    pub payload: Bytes,
}

impl RawMessage {
    /// Create a new raw message
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Decoded network-security detection record
///
/// Fields not modelled explicitly are kept in `fields` so the indexed
/// document carries the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event time, normalized to RFC 3339 on serialization
    pub timestamp: DateTime<FixedOffset>,

    /// Source address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<IpAddr>,

    /// Destination address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<IpAddr>,

    /// Alert block (only present on detections)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertInfo>,

    /// Remaining sensor fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Alert block of a sensor event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertInfo {
    /// Rule signature text
    #[serde(default)]
    pub signature: String,

    /// Numeric severity; 0 when the sensor omits it
    #[serde(default)]
    pub severity: i64,

    /// Remaining alert fields (signature_id, category, action, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Everything needed to raise an alert for one event
#[derive(Debug, Clone, Copy)]
pub struct AlertContext<'a> {
    pub src_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub alert: &'a AlertInfo,
}

impl SecurityEvent {
    /// Create an event with only a timestamp
    pub fn new(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            timestamp,
            src_ip: None,
            dest_ip: None,
            alert: None,
            fields: Map::new(),
        }
    }

    /// Source, destination and alert block, if all three are present
    pub fn alert_context(&self) -> Option<AlertContext<'_>> {
        match (self.src_ip, self.dest_ip, self.alert.as_ref()) {
            (Some(src_ip), Some(dest_ip), Some(alert)) => Some(AlertContext {
                src_ip,
                dest_ip,
                alert,
            }),
            _ => None,
        }
    }
}
