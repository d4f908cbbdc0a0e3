//! Docker image manifest, schema version 2
//!
//! The builder is pure: it turns an image configuration and the layer
//! descriptors of the same archive entry into canonical manifest bytes. The
//! digest of those bytes is stable across runs and is the local fallback
//! when a registry does not report the digest it stored.

use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use crate::image::config::ImageConfig;
use crate::image::descriptor::{Descriptor, LayerDescriptor, MEDIA_TYPE_MANIFEST};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

/// Manifest bytes as they are sent to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedManifest {
    pub media_type: String,
    pub bytes: Vec<u8>,
    pub digest: String,
}

pub struct ManifestBuilder<'a> {
    config: &'a ImageConfig,
    layers: Vec<Descriptor>,
}

impl<'a> ManifestBuilder<'a> {
    /// `layers` must be the descriptors of one entry, bottom layer first
    pub fn new(config: &'a ImageConfig, layers: &[&LayerDescriptor]) -> Self {
        let layers = layers
            .iter()
            .map(|layer| Descriptor {
                platform: None,
                ..layer.descriptor.clone()
            })
            .collect();

        Self { config, layers }
    }

    pub fn manifest(&self) -> ImageManifest {
        ImageManifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_MANIFEST.to_string(),
            config: self.config.descriptor(),
            layers: self.layers.clone(),
        }
    }

    pub fn build(&self) -> Result<SerializedManifest> {
        let bytes = serde_json::to_vec_pretty(&self.manifest())
            .map_err(|e| PusherError::Parse(format!("Failed to serialize manifest: {}", e)))?;
        let digest = DigestUtils::compute_docker_digest(&bytes);

        Ok(SerializedManifest {
            media_type: MEDIA_TYPE_MANIFEST.to_string(),
            bytes,
            digest,
        })
    }
}
