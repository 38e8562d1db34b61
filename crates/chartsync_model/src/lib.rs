//! # chartsync model
//!
//! Domain records cached on the device and the payloads the remote server
//! returns for them.
//!
//! This crate provides:
//! - [`Timestamp`] (milliseconds since the Unix epoch)
//! - [`Domain`], the closed set of locally stored record categories
//! - One record type per domain plus the [`Record`] enum that wraps them
//! - [`wire`] payload types with nullable identity fields, so degenerate
//!   server data can be detected and skipped instead of failing a sync
//!
//! This is a pure data crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod domain;
mod record;
mod time;
pub mod wire;

pub use domain::Domain;
pub use record::{
    ChartItem, Concept, ConceptType, Form, Location, MiscEntry, Observation, Order, Patient,
    Record, User,
};
pub use time::Timestamp;
