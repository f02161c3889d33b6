//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event time comes from the sensor record itself, never from the wall clock
//! - Daily index partitions are dated in UTC

mod config;
mod document;
mod error;
mod event;
mod notification;
mod sink;
mod source;

pub use config::*;
pub use document::*;
pub use error::*;
pub use event::*;
pub use notification::*;
pub use sink::*;
pub use source::*;
