//! Content descriptors and the layer descriptor resolver
//!
//! A saved archive stores every layer as an uncompressed tarball. The
//! resolver pairs each tarball with the diff id the configuration declares at
//! the same position; that diff id is the blob's digest in the registry.

use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use crate::image::archive::ImageArchive;
use crate::image::scope::resolve_in_scope;
use crate::logging::Logger;
use crate::registry::BlobReader;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_IMAGE_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub const MEDIA_TYPE_UNCOMPRESSED_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub size: u64,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Descriptor {
    pub fn new(media_type: &str, size: u64, digest: &str) -> Self {
        Self {
            media_type: media_type.to_string(),
            size,
            digest: digest.to_string(),
            urls: Vec::new(),
            platform: None,
        }
    }
}

/// One layer of one archive entry, ready to be streamed to a registry
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub descriptor: Descriptor,
    pub entry_index: usize,
    pub layer_index: usize,
    pub path: PathBuf,
}

impl LayerDescriptor {
    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }

    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub async fn open(&self) -> Result<BlobReader> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            PusherError::Io(format!("Failed to open layer {}: {}", self.path.display(), e))
        })?;
        Ok(Box::pin(file))
    }
}

/// Resolve every layer of every entry, entry order first, then layer order
pub async fn resolve_layers(
    archive: &ImageArchive,
    verify: bool,
    logger: &Logger,
) -> Result<Vec<LayerDescriptor>> {
    let mut layers = Vec::new();

    for (entry_index, entry) in archive.entries().iter().enumerate() {
        let platform = entry.config.platform();

        for (layer_index, layer_path) in entry.item.layers.iter().enumerate() {
            let diff_id = entry.config.diff_ids.get(layer_index).ok_or_else(|| {
                PusherError::Descriptor(format!(
                    "Layer {} ({}) has no matching diff id in the image configuration",
                    layer_index, layer_path
                ))
            })?;

            if !DigestUtils::is_valid_docker_digest(diff_id) {
                return Err(PusherError::Descriptor(format!(
                    "Diff id '{}' of layer {} is not a sha256 digest",
                    diff_id, layer_path
                )));
            }

            let path = resolve_in_scope(archive.root(), layer_path)?;
            let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
                PusherError::Descriptor(format!("Layer artifact {} is missing: {}", layer_path, e))
            })?;

            if !metadata.is_file() {
                return Err(PusherError::Descriptor(format!(
                    "Layer artifact {} is not a regular file",
                    layer_path
                )));
            }

            if verify {
                let actual = DigestUtils::compute_file_digest(&path).await?;
                if &actual != diff_id {
                    return Err(PusherError::Descriptor(format!(
                        "Layer {} hashes to {} but the configuration declares {}",
                        layer_path, actual, diff_id
                    )));
                }
                logger.detail(&format!("Verified {}", logger.short_digest(diff_id)));
            }

            logger.detail(&format!(
                "Layer {}/{}: {} ({})",
                layer_index + 1,
                entry.item.layers.len(),
                logger.short_digest(diff_id),
                logger.format_size(metadata.len())
            ));

            layers.push(LayerDescriptor {
                descriptor: Descriptor {
                    platform: Some(platform.clone()),
                    ..Descriptor::new(MEDIA_TYPE_UNCOMPRESSED_LAYER, metadata.len(), diff_id)
                },
                entry_index,
                layer_index,
                path,
            });
        }
    }

    Ok(layers)
}
