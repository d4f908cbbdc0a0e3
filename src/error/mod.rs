//! Error types for the direct push pipeline
//!
//! Every failure is fatal to the image being pushed. The pipeline-level variants
//! (`Load`, `Descriptor`, `RepositoryOpen`, `BlobPush`, `ManifestPush`, `Timeout`)
//! name the step that failed; the remaining variants carry the underlying cause
//! until an orchestrator folds them into its own variant.

pub mod handlers;

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PusherError>;

#[derive(Debug, Error)]
pub enum PusherError {
    /// Archive retrieval, extraction or parsing failed
    #[error("Image load error: {0}")]
    Load(String),
    /// Layer artifact and configuration disagree
    #[error("Layer descriptor error: {0}")]
    Descriptor(String),
    /// No candidate base URL produced a repository session
    #[error("Unable to open repository {repository}: {reason}")]
    RepositoryOpen { repository: String, reason: String },
    #[error("Blob push failed for {digest} ({step}): {reason}")]
    BlobPush {
        digest: String,
        step: &'static str,
        reason: String,
    },
    #[error("Manifest push failed ({step}): {reason}")]
    ManifestPush { step: &'static str, reason: String },
    /// The shared deadline for remote calls elapsed
    #[error("Timed out during {step}: deadline of {}s exceeded", budget.as_secs())]
    Timeout { step: String, budget: Duration },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("Upload error: {0}")]
    Upload(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Engine error: {0}")]
    Engine(String),
}

impl PusherError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PusherError::Timeout { .. })
    }

    /// Folds any error into a [`PusherError::Load`], keeping timeouts and load errors as they are.
    pub fn into_load(self) -> Self {
        match self {
            err @ (PusherError::Load(_) | PusherError::Timeout { .. }) => err,
            other => PusherError::Load(other.to_string()),
        }
    }

    /// Folds any error into a [`PusherError::BlobPush`] for `digest`.
    pub fn into_blob_push(self, digest: &str, step: &'static str) -> Self {
        match self {
            err @ (PusherError::BlobPush { .. } | PusherError::Timeout { .. }) => err,
            other => PusherError::BlobPush {
                digest: digest.to_string(),
                step,
                reason: other.to_string(),
            },
        }
    }

    /// Folds any error into a [`PusherError::ManifestPush`].
    pub fn into_manifest_push(self, step: &'static str) -> Self {
        match self {
            err @ (PusherError::ManifestPush { .. } | PusherError::Timeout { .. }) => err,
            other => PusherError::ManifestPush {
                step,
                reason: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for PusherError {
    fn from(err: std::io::Error) -> Self {
        PusherError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PusherError {
    fn from(err: serde_json::Error) -> Self {
        PusherError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for PusherError {
    fn from(err: reqwest::Error) -> Self {
        PusherError::Network(err.to_string())
    }
}

impl From<url::ParseError> for PusherError {
    fn from(err: url::ParseError) -> Self {
        PusherError::Validation(err.to_string())
    }
}

impl From<bollard::errors::Error> for PusherError {
    fn from(err: bollard::errors::Error) -> Self {
        PusherError::Engine(err.to_string())
    }
}
