//! icefloe is a table format engine: tables are sequences of immutable
//! snapshots tracked by manifest files, committed with optimistic
//! concurrency against a catalog pointer.
//!
//! Reading goes through [`Table::new_scan`], which plans the data files
//! and matching delete files of a snapshot. Writing goes through the
//! operations of [`transaction`], each committed with retries on conflict.

// Make sure all our public APIs have docs.
#![deny(missing_docs)]

mod table;
pub use table::Table;
mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

pub mod catalog;
pub use catalog::{Namespace, TableIdentifier};
pub mod config;
pub mod expr;
pub mod io;
pub mod metrics;
pub mod transaction;
pub mod types;
