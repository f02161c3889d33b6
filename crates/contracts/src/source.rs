//! MessageSource / EventDecoder traits - Ingestion input interfaces
//!
//! Decouples the worker pool from the concrete broker and payload format.

use crate::{ContractError, DecodeError, RawMessage, SecurityEvent};

/// Broker subscription abstraction
///
/// Real (Redis) and mock sources implement this trait; the subscription pump
/// drains it into the shared work queue.
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Topic this source is subscribed to
    fn topic(&self) -> &str;

    /// Next message, `None` once the subscription has ended
    ///
    /// # Errors
    /// Transient stream errors; the pump logs them and keeps reading.
    async fn next_message(&mut self) -> Option<Result<RawMessage, ContractError>>;

    /// Unsubscribe and release the connection
    async fn close(&mut self);
}

/// Raw bytes -> structured event
pub trait EventDecoder: Send + Sync {
    /// Decode one payload
    ///
    /// # Errors
    /// Malformed payloads; never panics.
    fn decode(&self, payload: &[u8]) -> Result<SecurityEvent, DecodeError>;
}
