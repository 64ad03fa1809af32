//! Node Backend Protocol
//!
//! Typed requests, the shared response envelope, and the transport seam used
//! to reach individual nodes. A deployment may expose several nodes; the
//! default node is the primary endpoint and other nodes only become known
//! through values returned by earlier writes.

pub mod client;
pub mod memory;
pub mod request;
pub mod response;
pub mod transport;

pub use client::NodeClient;
pub use memory::{MemoryBackend, RecordedRequest};
pub use request::{BackendRequest, FilePayload, WireRequest};
pub use response::{Envelope, FileContentBody, SaveRecordBody, Status, UploadBody};
pub use transport::{HttpTransport, NodeTransport};
