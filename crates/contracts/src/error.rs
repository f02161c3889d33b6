//! Layered error definitions
//!
//! Fatal startup errors (`ContractError`) and the per-message errors of
//! decoding, alerting and bulk indexing.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Broker Errors =====
    /// Broker connection error (fatal at startup)
    #[error("broker connection error for '{url}': {message}")]
    BrokerConnection { url: String, message: String },

    // ===== Sink Errors =====
    /// Sink connection error (fatal at startup)
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create broker connection error
    pub fn broker_connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokerConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Raw payload could not be turned into a `SecurityEvent`
///
/// Non-fatal: the message is skipped, nothing is indexed or alerted.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON or does not match the event shape
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Event timestamp missing or unparseable
    #[error("invalid event timestamp '{value}'")]
    Timestamp { value: String },

    /// Payload is empty
    #[error("empty event payload")]
    Empty,
}

/// Alert submission failure
///
/// Non-fatal: logged, counters unchanged, the bulk document is unaffected.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Alert endpoint answered with something other than 201
    #[error("alert endpoint rejected notification ({status}): {body}")]
    AlertRejected { status: u16, body: String },

    /// Connection failure, timeout, or similar
    #[error("alert transport error: {message}")]
    AlertTransport { message: String },

    /// Shutdown interrupted the call
    #[error("alert submission cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Create alert transport error
    pub fn alert_transport(message: impl Into<String>) -> Self {
        Self::AlertTransport {
            message: message.into(),
        }
    }
}

/// Bulk indexing failure, reported asynchronously through the error channel
#[derive(Debug, Clone, Error)]
pub enum BulkError {
    /// Request could not be delivered
    #[error("bulk request to '{endpoint}' failed: {message}")]
    Request { endpoint: String, message: String },

    /// Endpoint answered with an error status
    #[error("bulk request to '{endpoint}' returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Request accepted, but some items were rejected
    #[error("bulk request to '{endpoint}' rejected {failed} of {total} documents: {reason}")]
    Rejected {
        endpoint: String,
        failed: usize,
        total: usize,
        reason: String,
    },

    /// Endpoint answered 2xx but the body is not a bulk response
    #[error("bulk response from '{endpoint}' for {documents} documents is unreadable: {message}")]
    UnreadableResponse {
        endpoint: String,
        documents: usize,
        message: String,
    },

    /// Document could not be serialized
    #[error("bulk document for index '{index}' could not be encoded: {message}")]
    Encode { index: String, message: String },
}
