//! Registry operations over HTTP
//!
//! One store per concern, both sharing the session's [`HttpTransport`](crate::registry::transport::HttpTransport).

pub mod blob_operations;
pub mod manifest_operations;

pub use blob_operations::{HttpBlobStore, HttpBlobWriter};
pub use manifest_operations::HttpManifestStore;
