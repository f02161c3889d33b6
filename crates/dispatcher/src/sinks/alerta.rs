//! AlertaSender - JSON alert submission over HTTP

use contracts::{AlertConfig, AlertNotification, AlertSink, DispatchError};
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::error::DispatcherError;

/// Posts notifications to the alert-management API
///
/// One attempt per notification, bounded by the configured request timeout.
/// Only `201 Created` counts as accepted.
pub struct AlertaSender {
    name: String,
    client: reqwest::Client,
    url: String,
}

impl AlertaSender {
    /// Create a sender for `config.url`
    #[instrument(name = "alerta_sender_new", skip(config), fields(url = %config.url))]
    pub fn new(config: &AlertConfig) -> Result<Self, DispatcherError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DispatcherError::sink_creation("alerta", e.to_string()))?;

        Ok(Self {
            name: "alerta".to_string(),
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AlertSink for AlertaSender {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, notification: &AlertNotification) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| DispatchError::alert_transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::CREATED {
            debug!(sink = %self.name, resource = %notification.resource, "Alert accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::AlertRejected {
            status: status.as_u16(),
            body,
        })
    }
}
