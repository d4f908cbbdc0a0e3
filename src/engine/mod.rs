//! Image sources
//!
//! An [`ImageSource`] produces the `docker save` archive for an image
//! reference. [`DockerEngine`] asks a Docker daemon for it through the Engine
//! API; [`ArchiveFileSource`] reads an archive that was exported earlier.

use crate::config::EngineConfig;
use crate::error::{PusherError, Result};
use async_trait::async_trait;
use bollard::{ClientVersion, Docker};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Human readable origin, used in log lines
    fn describe(&self) -> String;

    /// Write the saved archive for `reference` into `dest`, returning the byte count
    async fn save(&self, reference: &str, dest: &mut tokio::fs::File) -> Result<u64>;
}

/// Docker daemon reached through the Engine API
pub struct DockerEngine {
    docker: Docker,
    host: String,
}

impl DockerEngine {
    pub fn connect(config: &EngineConfig) -> Result<Self> {
        let (major_version, minor_version) = config.api_version_parts()?;
        let version = ClientVersion {
            major_version,
            minor_version,
        };

        let (docker, host) = match config.host.as_deref() {
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                let address = host.replacen("tcp://", "http://", 1);
                let docker = Docker::connect_with_http(&address, config.timeout_secs, &version)?;
                (docker, address)
            }
            Some(host) => (Self::connect_socket(host, config.timeout_secs, &version)?, host.to_string()),
            None => (
                Self::connect_socket(DEFAULT_SOCKET, config.timeout_secs, &version)?,
                format!("unix://{}", DEFAULT_SOCKET),
            ),
        };

        Ok(Self { docker, host })
    }

    #[cfg(unix)]
    fn connect_socket(host: &str, timeout: u64, version: &ClientVersion) -> Result<Docker> {
        let path = host.strip_prefix("unix://").unwrap_or(host);
        Ok(Docker::connect_with_unix(path, timeout, version)?)
    }

    #[cfg(not(unix))]
    fn connect_socket(host: &str, _timeout: u64, _version: &ClientVersion) -> Result<Docker> {
        Err(PusherError::Config(format!(
            "Socket engine hosts are not supported on this platform: {}",
            host
        )))
    }
}

#[async_trait]
impl ImageSource for DockerEngine {
    fn describe(&self) -> String {
        format!("docker engine at {}", self.host)
    }

    async fn save(&self, reference: &str, dest: &mut tokio::fs::File) -> Result<u64> {
        let mut stream = self.docker.export_image(reference);
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                PusherError::Engine(format!("Failed to save image {}: {}", reference, e))
            })?;
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        if written == 0 {
            return Err(PusherError::Engine(format!(
                "Engine returned an empty archive for {}",
                reference
            )));
        }

        Ok(written)
    }
}

/// Archive produced earlier by `docker save`
pub struct ArchiveFileSource {
    path: PathBuf,
}

impl ArchiveFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageSource for ArchiveFileSource {
    fn describe(&self) -> String {
        format!("archive {}", self.path.display())
    }

    async fn save(&self, _reference: &str, dest: &mut tokio::fs::File) -> Result<u64> {
        let mut source = tokio::fs::File::open(&self.path).await.map_err(|e| {
            PusherError::Io(format!("Failed to open archive {}: {}", self.path.display(), e))
        })?;
        Ok(tokio::io::copy(&mut source, dest).await?)
    }
}
