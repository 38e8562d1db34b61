//! # chartsync store
//!
//! The local, durable cache the sync engine reconciles against the server.
//!
//! This crate provides:
//! - [`LocalStore`], the boundary the engine writes through
//! - [`Operation`] and [`Filter`] for batch application and selection
//! - [`MemoryStore`], a savepoint-capable in-memory store
//! - [`FileStore`], a [`MemoryStore`] persisted to a locked directory
//!
//! ## Savepoints
//!
//! Savepoints are named and nestable. Rolling back a savepoint restores
//! the state captured when it began and discards it together with every
//! savepoint opened after it; releasing one keeps the changes and discards
//! it the same way. Changes become durable only once no savepoint is open.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod operation;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::{MemoryStore, Tables};
pub use operation::{Filter, Operation};
pub use store::LocalStore;
