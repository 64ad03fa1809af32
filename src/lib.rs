//! Vaultsync: Sharded Content Store Client
//!
//! Client for a backend that spreads record content across several storage
//! nodes. Records carry a pointer to their content blob; writes may move a
//! blob to another node and the returned pointer must be saved back onto the
//! record. On top of that sit optimistic local mutations with rollback, an
//! executor where the latest call on a stream wins, and attachment handling
//! that keeps deletes on the node that owns the bytes.

pub mod attachment;
pub mod backend;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod executor;
pub mod logging;
pub mod optimistic;
pub mod records;
pub mod store;
pub mod tooling;
pub mod types;

pub use error::{ApiError, ErrorKind};
pub use types::{ContentRef, RecordId};
