//! Saved image archive loader
//!
//! The archive produced by `docker save` is written into a fresh temporary
//! directory, unpacked next to it, and its `manifest.json` parsed together
//! with every configuration blob it references. The temporary directory is
//! owned by [`ImageArchive`] and removed when it is dropped, whichever way
//! the push ends.

use crate::engine::ImageSource;
use crate::error::{PusherError, Result};
use crate::image::config::ImageConfig;
use crate::image::descriptor::Descriptor;
use crate::image::scope::resolve_in_scope;
use crate::logging::Logger;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

pub const ARCHIVE_MANIFEST: &str = "manifest.json";
const ARCHIVE_FILE: &str = "image.tar";
const EXTRACT_DIR: &str = "rootfs";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One item of the archive's `manifest.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestItem {
    pub config: String,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
    /// Foreign layers keyed by diff id
    #[serde(default)]
    pub layer_sources: Option<HashMap<String, Descriptor>>,
}

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub item: ManifestItem,
    pub config: ImageConfig,
}

#[derive(Debug)]
pub struct ImageArchive {
    workdir: TempDir,
    root: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl ImageArchive {
    /// Retrieve, unpack and parse the archive for `reference`.
    ///
    /// Every failure is reported as [`PusherError::Load`]; nothing is left on disk.
    pub async fn load(source: &dyn ImageSource, reference: &str, logger: &Logger) -> Result<Self> {
        Self::load_inner(source, reference, logger)
            .await
            .map_err(PusherError::into_load)
    }

    async fn load_inner(source: &dyn ImageSource, reference: &str, logger: &Logger) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("papa-image-")
            .tempdir()
            .map_err(|e| PusherError::Io(format!("Failed to create working directory: {}", e)))?;

        let archive_path = workdir.path().join(ARCHIVE_FILE);
        let root = workdir.path().join(EXTRACT_DIR);

        logger.step(&format!("Saving {} from {}", reference, source.describe()));
        let mut file = tokio::fs::File::create(&archive_path).await?;
        let written = source.save(reference, &mut file).await?;
        file.flush().await?;
        drop(file);
        logger.detail(&format!("Archive size: {}", logger.format_size(written)));

        std::fs::create_dir(&root)?;
        let (tar_path, dest) = (archive_path.clone(), root.clone());
        tokio::task::spawn_blocking(move || extract(&tar_path, &dest))
            .await
            .map_err(|e| PusherError::Load(format!("Extraction task failed: {}", e)))??;
        tokio::fs::remove_file(&archive_path).await?;

        let entries = read_entries(&root).await?;
        logger.detail(&format!("Archive holds {} image(s)", entries.len()));

        Ok(Self {
            workdir,
            root,
            entries,
        })
    }

    /// Directory the archive was extracted into
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Remove the extraction directory now instead of on drop
    pub fn close(self) -> Result<()> {
        self.workdir.close().map_err(|e| {
            PusherError::Io(format!("Failed to remove extracted archive: {}", e))
        })
    }
}

fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    let mut file = File::open(archive_path)?;
    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if read == 2 && magic == GZIP_MAGIC {
        Box::new(flate2::read::GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| PusherError::Load(format!("Failed to extract image archive: {}", e)))
}

async fn read_entries(root: &Path) -> Result<Vec<ManifestEntry>> {
    let manifest_path = resolve_in_scope(root, ARCHIVE_MANIFEST)?;
    let content = tokio::fs::read(&manifest_path).await.map_err(|e| {
        PusherError::Load(format!("Archive has no readable {}: {}", ARCHIVE_MANIFEST, e))
    })?;

    let items: Vec<ManifestItem> = serde_json::from_slice(&content)
        .map_err(|e| PusherError::Load(format!("Malformed {}: {}", ARCHIVE_MANIFEST, e)))?;

    if items.is_empty() {
        return Err(PusherError::Load(format!(
            "{} lists no images",
            ARCHIVE_MANIFEST
        )));
    }

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let config_path = resolve_in_scope(root, &item.config)?;
        let raw = tokio::fs::read(&config_path).await.map_err(|e| {
            PusherError::Load(format!("Cannot read image config {}: {}", item.config, e))
        })?;
        let config = ImageConfig::from_raw(raw)?;

        for layer in &item.layers {
            resolve_in_scope(root, layer)?;
        }

        if config.diff_ids.len() != item.layers.len() {
            return Err(PusherError::Load(format!(
                "Image config {} declares {} diff ids but the archive lists {} layers",
                item.config,
                config.diff_ids.len(),
                item.layers.len()
            )));
        }

        entries.push(ManifestEntry { item, config });
    }

    Ok(entries)
}
