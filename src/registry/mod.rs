//! Registry module for Docker Registry HTTP API v2 interactions
//!
//! The push pipeline only talks to the traits defined here. The HTTP
//! implementations live in [`client`], [`operations`] and [`auth`]; tests
//! substitute in-memory doubles.

pub mod auth;
pub mod client;
pub mod deadline;
pub mod operations;
pub mod reference;
pub mod transport;

use crate::digest::DigestUtils;
use crate::error::Result;
use crate::image::{Descriptor, SerializedManifest};
use async_trait::async_trait;
use std::io::Cursor;
use std::pin::Pin;
use tokio::io::AsyncRead;

pub use client::{HttpConnector, RegistryClient, candidate_base_urls};
pub use deadline::Deadline;
pub use reference::ImageReference;

/// Byte source streamed into a blob upload
pub type BlobReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// One blob upload session
#[async_trait]
pub trait BlobWriter: Send {
    /// Stream `size` bytes from `reader` into the session
    async fn read_from(&mut self, reader: BlobReader, size: u64) -> Result<u64>;

    /// Finish the upload; the registry verifies the content against `expected`
    async fn commit(&mut self, expected: &Descriptor) -> Result<Descriptor>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Descriptor of the blob if the repository already holds it
    async fn stat(&self, digest: &str) -> Result<Option<Descriptor>>;

    async fn create(&self) -> Result<Box<dyn BlobWriter>>;

    /// Upload a small in-memory blob in one go
    async fn put(&self, media_type: &str, content: Vec<u8>) -> Result<Descriptor> {
        let size = content.len() as u64;
        let expected = Descriptor::new(
            media_type,
            size,
            &DigestUtils::compute_docker_digest(&content),
        );

        let mut writer = self.create().await?;
        writer.read_from(Box::pin(Cursor::new(content)), size).await?;
        writer.commit(&expected).await
    }
}

#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Digest of the manifest held under `reference` (a digest or a tag),
    /// or `None` when the repository has nothing there
    async fn exists(&self, reference: &str) -> Result<Option<String>>;

    /// Store the manifest under `tag`, or under its digest when no tag is
    /// given. Returns the digest the registry assigned.
    async fn put(&self, manifest: &SerializedManifest, tag: Option<&str>) -> Result<String>;
}

/// An opened repository session
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;
    fn base_url(&self) -> &str;
    fn blobs(&self) -> &dyn BlobStore;
    fn manifests(&self) -> &dyn ManifestStore;
}

#[async_trait]
pub trait RepositoryConnector: Send + Sync {
    /// Open `name` on the registry at `base_url`
    async fn open(&self, name: &str, base_url: &str) -> Result<Box<dyn Repository>>;
}
