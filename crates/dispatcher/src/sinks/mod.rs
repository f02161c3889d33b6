//! Concrete sink implementations

pub mod alerta;
pub mod elastic;

pub use alerta::AlertaSender;
pub use elastic::{BulkErrorReceiver, ElasticBulkSink};
