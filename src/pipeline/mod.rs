//! Direct push pipeline
//!
//! [`PushDriver`] moves one image from an [`ImageSource`] into a registry
//! repository without going through the daemon's own push:
//!
//! ```text
//! Idle -> Loading -> DescriptorsResolved -> BlobsPushing -> BlobsComplete
//!      -> ManifestsPushing -> Done
//! ```
//!
//! Any step may end in `Failed`. A failure is final for the image; nothing
//! is retried. The extracted archive is removed on every exit path.

pub mod blobs;
pub mod manifests;

use crate::config::PushConfig;
use crate::engine::ImageSource;
use crate::error::{PusherError, Result};
use crate::image::{ImageArchive, resolve_layers};
use crate::logging::Logger;
use crate::registry::{Deadline, ImageReference, RegistryClient, RepositoryConnector};
use std::fmt;
use std::sync::Arc;

pub use blobs::{BlobPushReport, push_blobs, unique_layers};
pub use manifests::{ManifestOutcome, push_manifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Idle,
    Loading,
    DescriptorsResolved,
    BlobsPushing,
    BlobsComplete,
    ManifestsPushing,
    Done,
    Failed,
}

impl fmt::Display for PushState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PushState::Idle => "idle",
            PushState::Loading => "loading",
            PushState::DescriptorsResolved => "descriptors resolved",
            PushState::BlobsPushing => "pushing blobs",
            PushState::BlobsComplete => "blobs complete",
            PushState::ManifestsPushing => "pushing manifests",
            PushState::Done => "done",
            PushState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub repository: String,
    pub base_url: String,
    pub manifests: Vec<ManifestOutcome>,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

impl PushResult {
    /// Digest of the last manifest written or found
    pub fn digest(&self) -> Option<&str> {
        self.manifests.last().map(|m| m.digest.as_str())
    }
}

pub struct PushDriver {
    source: Arc<dyn ImageSource>,
    connector: Arc<dyn RepositoryConnector>,
    config: PushConfig,
    logger: Logger,
    history: Vec<PushState>,
}

impl PushDriver {
    pub fn new(
        source: Arc<dyn ImageSource>,
        connector: Arc<dyn RepositoryConnector>,
        config: PushConfig,
        logger: Logger,
    ) -> Self {
        Self {
            source,
            connector,
            config,
            logger,
            history: vec![PushState::Idle],
        }
    }

    pub fn state(&self) -> PushState {
        self.history.last().copied().unwrap_or(PushState::Idle)
    }

    /// Every state visited by the last push, starting with `Idle`
    pub fn history(&self) -> &[PushState] {
        &self.history
    }

    /// Push `image` from the image source to the registry at `remote`
    pub async fn push_direct(&mut self, image: &str, remote: &str) -> Result<PushResult> {
        self.history = vec![PushState::Idle];

        match self.run(image, remote).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.logger
                    .verbose(&format!("Push stopped while {}", self.state()));
                self.transition(PushState::Failed);
                Err(e)
            }
        }
    }

    async fn run(&mut self, image: &str, remote: &str) -> Result<PushResult> {
        let reference = ImageReference::parse(image)?;
        if let Some(digest) = &reference.digest {
            return Err(PusherError::Validation(format!(
                "Cannot push to a digest reference ({}); name a tag instead",
                digest
            )));
        }
        let tag = reference.tag_or_default().to_string();
        let logger = self.logger.clone();

        logger.section(&format!("Pushing {} to {}", reference, remote));

        self.transition(PushState::Loading);
        let archive = ImageArchive::load(self.source.as_ref(), image, &logger).await?;
        let layers = resolve_layers(&archive, self.config.verify_layers, &logger).await?;
        self.transition(PushState::DescriptorsResolved);

        let deadline = Deadline::after(self.config.timeout());
        let client = RegistryClient::new(self.connector.clone(), logger.clone());
        let repository = deadline
            .run("repository open", client.open(reference.repository(), remote))
            .await?;

        self.transition(PushState::BlobsPushing);
        let report = push_blobs(
            repository.blobs(),
            &layers,
            self.config.concurrency,
            &deadline,
            &logger,
        )
        .await?;
        self.transition(PushState::BlobsComplete);
        logger.verbose(&format!(
            "Blobs complete with {} of the deadline left",
            logger.format_duration(deadline.remaining())
        ));

        self.transition(PushState::ManifestsPushing);
        let mut outcomes = Vec::with_capacity(archive.entries().len());
        for (index, entry) in archive.entries().iter().enumerate() {
            let outcome = push_manifest(
                repository.as_ref(),
                index,
                entry,
                &layers,
                &tag,
                &deadline,
                &logger,
            )
            .await?;
            outcomes.push(outcome);
        }
        self.transition(PushState::Done);

        if let Err(e) = archive.close() {
            logger.warning(&e.to_string());
        }

        let result = PushResult {
            repository: repository.name().to_string(),
            base_url: repository.base_url().to_string(),
            manifests: outcomes,
            uploaded: report.uploaded,
            skipped: report.skipped,
        };

        logger.summary_kv(
            "Push Summary",
            &[
                ("Repository", result.repository.clone()),
                ("Endpoint", result.base_url.clone()),
                ("Layers uploaded", result.uploaded.len().to_string()),
                ("Layers skipped", result.skipped.len().to_string()),
                ("Elapsed", logger.format_duration(logger.elapsed())),
            ],
        );

        Ok(result)
    }

    fn transition(&mut self, next: PushState) {
        self.logger
            .debug(&format!("State: {} -> {}", self.state(), next));
        self.history.push(next);
    }
}
