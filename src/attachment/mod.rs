//! Attachment Lifecycle
//!
//! Binary files referenced from content blobs. Each reference is pinned to
//! the node that stores its bytes, which is not necessarily the node holding
//! the blob.

pub mod manager;
pub mod model;

pub use manager::{AttachmentManager, PurgeReport, UploadFile, UploadedFile};
pub use model::{AttachmentEntry, AttachmentList, AttachmentRef, PendingAttachment};
