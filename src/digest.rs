//! SHA256 digest utilities
//!
//! Centralized functionality for computing, validating and formatting the
//! `sha256:<hex>` digests that key blobs and manifests in a registry.

use crate::error::{PusherError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Utilities for working with SHA256 digests in Docker context
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Compute full Docker digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    /// Stream a file through SHA256 without loading it into memory
    pub async fn compute_file_digest(path: &Path) -> Result<String> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            PusherError::Io(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

        loop {
            let read = file.read(&mut buffer).await.map_err(|e| {
                PusherError::Io(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    /// Validate SHA256 hex string (64 characters, all hex)
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Validate full Docker digest format (sha256:xxxxx)
    pub fn is_valid_docker_digest(digest: &str) -> bool {
        digest
            .strip_prefix("sha256:")
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Normalize digest to full Docker format (add sha256: prefix if missing)
    pub fn normalize_digest(digest: &str) -> Result<String> {
        if let Some(hex_part) = digest.strip_prefix("sha256:") {
            if !Self::is_valid_sha256_hex(hex_part) {
                return Err(PusherError::Validation(format!(
                    "Invalid SHA256 digest: '{}'",
                    digest
                )));
            }
            Ok(digest.to_string())
        } else {
            if !Self::is_valid_sha256_hex(digest) {
                return Err(PusherError::Validation(format!(
                    "Invalid SHA256 digest: expected 64 hex characters, got '{}'",
                    digest
                )));
            }
            Ok(format!("sha256:{}", digest))
        }
    }
}
