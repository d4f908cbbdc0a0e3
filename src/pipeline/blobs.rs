//! Blob push orchestration
//!
//! Every distinct layer digest is checked with a stat first and uploaded
//! only when the repository lacks it. Up to `concurrency` layers are in
//! flight; the first failure ends the whole step and drops whatever is
//! still running or queued.

use crate::error::Result;
use crate::image::LayerDescriptor;
use crate::logging::Logger;
use crate::registry::{BlobStore, Deadline};
use futures::{StreamExt, TryFutureExt, TryStreamExt, stream};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobPushReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlobOutcome {
    Uploaded(String),
    Skipped(String),
}

/// Layers sharing a digest are pushed once, at their first position
pub fn unique_layers(layers: &[LayerDescriptor]) -> Vec<&LayerDescriptor> {
    let mut seen = HashSet::new();
    layers
        .iter()
        .filter(|layer| seen.insert(layer.digest()))
        .collect()
}

pub async fn push_blobs(
    blobs: &dyn BlobStore,
    layers: &[LayerDescriptor],
    concurrency: usize,
    deadline: &Deadline,
    logger: &Logger,
) -> Result<BlobPushReport> {
    let unique = unique_layers(layers);
    let total = unique.len();
    logger.info(&format!(
        "Pushing {} layer(s) with up to {} in flight",
        total,
        concurrency.max(1)
    ));

    // Completion order; the first error ends the stream and drops the rest
    let mut outcomes: Vec<(usize, BlobOutcome)> = stream::iter(
        unique.into_iter().enumerate().map(|(index, layer)| {
            push_layer(blobs, layer, index, total, deadline, logger)
                .map_ok(move |outcome| (index, outcome))
        }),
    )
    .buffer_unordered(concurrency.max(1))
    .try_collect()
    .await?;
    outcomes.sort_by_key(|(index, _)| *index);

    let mut report = BlobPushReport::default();
    for (_, outcome) in outcomes {
        match outcome {
            BlobOutcome::Uploaded(digest) => report.uploaded.push(digest),
            BlobOutcome::Skipped(digest) => report.skipped.push(digest),
        }
    }
    Ok(report)
}

async fn push_layer(
    blobs: &dyn BlobStore,
    layer: &LayerDescriptor,
    index: usize,
    total: usize,
    deadline: &Deadline,
    logger: &Logger,
) -> Result<BlobOutcome> {
    let digest = layer.digest();
    let short = logger.short_digest(digest);

    let existing = deadline
        .run("blob stat", blobs.stat(digest))
        .await
        .map_err(|e| e.into_blob_push(digest, "stat"))?;

    if existing.is_some() {
        logger.step(&format!("[{}/{}] {} already exists, skipping", index + 1, total, short));
        return Ok(BlobOutcome::Skipped(digest.to_string()));
    }

    logger.step(&format!(
        "[{}/{}] Uploading {} ({})",
        index + 1,
        total,
        short,
        logger.format_size(layer.size())
    ));

    let mut writer = deadline
        .run("blob upload session", blobs.create())
        .await
        .map_err(|e| e.into_blob_push(digest, "create"))?;

    let reader = layer
        .open()
        .await
        .map_err(|e| e.into_blob_push(digest, "open"))?;

    deadline
        .run("blob upload", writer.read_from(reader, layer.size()))
        .await
        .map_err(|e| e.into_blob_push(digest, "upload"))?;

    deadline
        .run("blob commit", writer.commit(&layer.descriptor))
        .await
        .map_err(|e| e.into_blob_push(digest, "commit"))?;

    logger.success(&format!("Layer {} pushed", short));
    Ok(BlobOutcome::Uploaded(digest.to_string()))
}
