//! Manifest push orchestration
//!
//! Runs once every blob of the image is in the repository. The manifest of
//! an entry is keyed by its image config digest. When the repository already
//! knows that key and the tag points at the same manifest nothing is
//! written; a known manifest under a new tag is put again under that tag.

use crate::error::Result;
use crate::image::{LayerDescriptor, MEDIA_TYPE_IMAGE_CONFIG, ManifestBuilder, ManifestEntry};
use crate::logging::Logger;
use crate::registry::{Deadline, Repository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOutcome {
    pub entry_index: usize,
    pub tag: String,
    pub digest: String,
    pub config_digest: String,
    /// False when the manifest was already present
    pub pushed: bool,
}

pub async fn push_manifest(
    repository: &dyn Repository,
    entry_index: usize,
    entry: &ManifestEntry,
    layers: &[LayerDescriptor],
    tag: &str,
    deadline: &Deadline,
    logger: &Logger,
) -> Result<ManifestOutcome> {
    let config_digest = entry.config.digest().to_string();
    let manifests = repository.manifests();

    let existing = deadline
        .run("manifest exists", manifests.exists(&config_digest))
        .await
        .map_err(|e| e.into_manifest_push("exists"))?;

    if let Some(existing) = existing {
        let tagged = deadline
            .run("manifest tag lookup", manifests.exists(tag))
            .await
            .map_err(|e| e.into_manifest_push("exists"))?;

        if tagged.as_deref() == Some(existing.as_str()) {
            logger.info(&format!(
                "Manifest {} already exists as {}:{}, skipping",
                logger.short_digest(&existing),
                repository.name(),
                tag
            ));
            return Ok(ManifestOutcome {
                entry_index,
                tag: tag.to_string(),
                digest: existing,
                config_digest,
                pushed: false,
            });
        }

        logger.step(&format!(
            "Manifest {} exists but {} does not point at it, tagging",
            logger.short_digest(&existing),
            tag
        ));
    } else {
        ensure_config(repository, entry, &config_digest, deadline, logger).await?;
    }

    let entry_layers: Vec<&LayerDescriptor> = layers
        .iter()
        .filter(|layer| layer.entry_index == entry_index)
        .collect();
    let manifest = ManifestBuilder::new(&entry.config, &entry_layers)
        .build()
        .map_err(|e| e.into_manifest_push("build"))?;

    let assigned = deadline
        .run("manifest put", manifests.put(&manifest, Some(tag)))
        .await
        .map_err(|e| e.into_manifest_push("put"))?;

    if assigned != manifest.digest {
        logger.warning(&format!(
            "Registry assigned {} to a manifest that hashes to {}",
            assigned, manifest.digest
        ));
    }

    logger.success(&format!(
        "Manifest {} pushed as {}:{}",
        logger.short_digest(&assigned),
        repository.name(),
        tag
    ));

    Ok(ManifestOutcome {
        entry_index,
        tag: tag.to_string(),
        digest: assigned,
        config_digest,
        pushed: true,
    })
}

async fn ensure_config(
    repository: &dyn Repository,
    entry: &ManifestEntry,
    config_digest: &str,
    deadline: &Deadline,
    logger: &Logger,
) -> Result<()> {
    let blobs = repository.blobs();
    let present = deadline
        .run("config blob stat", blobs.stat(config_digest))
        .await
        .map_err(|e| e.into_manifest_push("config"))?;

    if present.is_none() {
        logger.step(&format!(
            "Uploading config {}",
            logger.short_digest(config_digest)
        ));
        deadline
            .run(
                "config blob upload",
                blobs.put(MEDIA_TYPE_IMAGE_CONFIG, entry.config.raw().to_vec()),
            )
            .await
            .map_err(|e| e.into_manifest_push("config"))?;
    }
    Ok(())
}
