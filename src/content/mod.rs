//! Content Blobs
//!
//! Large JSON payloads owned by exactly one record and addressed only through
//! that record's [`crate::types::ContentRef`].

pub mod locator;
pub mod sync;

pub use locator::{ContentLocator, ContentWrite};
pub use sync::{ContentSync, MigrationHook};
