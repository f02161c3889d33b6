//! AlertNotification - Dispatcher output to the alert-management API
//!
//! Wire schema of the alert body (Alerta-compatible).

use serde::{Deserialize, Serialize};

/// Outbound alert record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub attributes: AlertAttributes,
    pub environment: String,
    /// Rule signature
    pub event: String,
    pub group: String,
    pub origin: String,
    /// Asset label
    pub resource: String,
    pub service: Vec<String>,
    /// Severity label
    pub severity: String,
    pub text: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Numeric severity as a decimal string
    pub value: String,
    /// Seconds before the alert expires
    pub timeout: u32,
}

/// Free-form alert attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertAttributes {
    pub region: String,
}
