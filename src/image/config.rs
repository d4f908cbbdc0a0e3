//! Image configuration blob
//!
//! Only the fields the push needs are decoded. The raw bytes are kept
//! verbatim: the manifest references the config by the digest of exactly
//! these bytes, so they must never be re-serialized.

use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use crate::image::descriptor::{Descriptor, MEDIA_TYPE_IMAGE_CONFIG, Platform};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawImageConfig {
    #[serde(default)]
    architecture: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    variant: Option<String>,
    rootfs: Option<RawRootFs>,
}

#[derive(Debug, Deserialize)]
struct RawRootFs {
    #[serde(rename = "type")]
    fs_type: String,
    #[serde(default)]
    diff_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub architecture: String,
    pub os: String,
    pub variant: Option<String>,
    /// Uncompressed layer digests, bottom layer first
    pub diff_ids: Vec<String>,
    raw: Vec<u8>,
    digest: String,
}

impl ImageConfig {
    pub fn from_raw(raw: Vec<u8>) -> Result<Self> {
        let parsed: RawImageConfig = serde_json::from_slice(&raw)
            .map_err(|e| PusherError::Parse(format!("Malformed image configuration: {}", e)))?;

        let rootfs = parsed.rootfs.ok_or_else(|| {
            PusherError::Parse("Image configuration has no rootfs section".to_string())
        })?;

        if rootfs.fs_type != "layers" {
            return Err(PusherError::Parse(format!(
                "Unsupported rootfs type '{}'",
                rootfs.fs_type
            )));
        }

        let digest = DigestUtils::compute_docker_digest(&raw);

        Ok(Self {
            architecture: parsed.architecture,
            os: parsed.os,
            variant: parsed.variant,
            diff_ids: rootfs.diff_ids,
            raw,
            digest,
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Digest of the raw configuration bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn platform(&self) -> Platform {
        Platform {
            architecture: self.architecture.clone(),
            os: self.os.clone(),
            variant: self.variant.clone(),
        }
    }

    /// Descriptor of the config blob as referenced from a manifest
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(MEDIA_TYPE_IMAGE_CONFIG, self.raw.len() as u64, &self.digest)
    }
}
