//! Saved image handling
//!
//! Turns the archive produced by `docker save` into the values a push needs:
//! the parsed archive manifest, each image's configuration, one descriptor
//! per layer artifact and finally the registry manifest that ties them
//! together.
//!
//! # Overview
//!
//! - [`ImageArchive`] owns the temporary extraction and the parsed entries.
//! - [`resolve_layers`] maps every layer artifact to a [`LayerDescriptor`].
//! - [`ManifestBuilder`] renders the schema 2 manifest for one entry.
//!
//! All paths read from the archive go through [`resolve_in_scope`], which
//! refuses anything that would leave the extraction root.

pub mod archive;
pub mod config;
pub mod descriptor;
pub mod manifest;
pub mod scope;

pub use archive::{ImageArchive, ManifestEntry, ManifestItem};
pub use config::ImageConfig;
pub use descriptor::{
    Descriptor, LayerDescriptor, Platform, resolve_layers, MEDIA_TYPE_IMAGE_CONFIG,
    MEDIA_TYPE_MANIFEST, MEDIA_TYPE_UNCOMPRESSED_LAYER,
};
pub use manifest::{ImageManifest, ManifestBuilder, SerializedManifest};
pub use scope::resolve_in_scope;
