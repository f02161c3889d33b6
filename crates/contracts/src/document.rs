//! BulkDocument - Dispatcher output to the bulk sink
//!
//! A serialized event paired with its daily index.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::SecurityEvent;

/// Date layout of daily index partitions (`suricata-2024.03.01`)
pub const INDEX_DATE_FORMAT: &str = "%Y.%m.%d";

/// Document destined for the bulk-indexing sink
#[derive(Debug, Clone, Serialize)]
pub struct BulkDocument {
    /// Target index name
    pub index: String,

    /// Document body
    pub body: Value,
}

impl BulkDocument {
    /// Create a document for an explicit index
    pub fn new(index: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            body,
        }
    }

    /// Serialize an event into the daily index derived from its own timestamp
    pub fn from_event(prefix: &str, event: &SecurityEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            index: daily_index(prefix, &event.timestamp),
            body: serde_json::to_value(event)?,
        })
    }
}

/// `<prefix>-<YYYY.MM.DD>`, dated in UTC
pub fn daily_index<Tz: TimeZone>(prefix: &str, timestamp: &DateTime<Tz>) -> String {
    let utc = timestamp.with_timezone(&Utc);
    format!("{}-{}", prefix, utc.format(INDEX_DATE_FORMAT))
}
