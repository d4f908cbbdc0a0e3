//! In-memory engine and registry doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use docker_papa::digest::DigestUtils;
use docker_papa::engine::ImageSource;
use docker_papa::error::{PusherError, Result};
use docker_papa::image::{Descriptor, SerializedManifest};
use docker_papa::registry::{
    BlobReader, BlobStore, BlobWriter, ManifestStore, Repository, RepositoryConnector,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// ---------------------------------------------------------------------------
// Archives
// ---------------------------------------------------------------------------

pub struct TestLayer {
    pub content: Vec<u8>,
    pub digest: String,
}

impl TestLayer {
    pub fn new(fill: u8, size: usize) -> Self {
        let content = vec![fill; size];
        let digest = DigestUtils::compute_docker_digest(&content);
        Self { content, digest }
    }
}

pub fn config_json(diff_ids: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "architecture": "amd64",
        "os": "linux",
        "rootfs": { "type": "layers", "diff_ids": diff_ids },
    }))
    .unwrap()
}

/// Builds `docker save` style archives in memory
#[derive(Default)]
pub struct ArchiveBuilder {
    files: Vec<(String, Vec<u8>)>,
    symlinks: Vec<(String, String)>,
    items: Vec<serde_json::Value>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.symlinks.push((path.to_string(), target.to_string()));
        self
    }

    pub fn item(mut self, config: &str, layers: &[&str]) -> Self {
        self.items.push(serde_json::json!({
            "Config": config,
            "RepoTags": null,
            "Layers": layers,
        }));
        self
    }

    /// One image entry whose config names `layers` in order
    pub fn image(mut self, name: &str, layers: &[&TestLayer]) -> Self {
        let diff_ids: Vec<&str> = layers.iter().map(|l| l.digest.as_str()).collect();
        let config_path = format!("{}.json", name);
        let mut layer_paths = Vec::new();

        self = self.file(&config_path, &config_json(&diff_ids));
        for (index, layer) in layers.iter().enumerate() {
            let path = format!("{}-{}/layer.tar", name, index);
            self = self.file(&path, &layer.content);
            layer_paths.push(path);
        }

        let refs: Vec<&str> = layer_paths.iter().map(String::as_str).collect();
        self.item(&config_path, &refs)
    }

    pub fn build(self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        let manifest = serde_json::to_vec(&self.items).unwrap();
        append_file(&mut builder, "manifest.json", &manifest);
        for (path, content) in &self.files {
            append_file(&mut builder, path, content);
        }
        for (path, target) in &self.symlinks {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder.append_link(&mut header, path, target).unwrap();
        }

        builder.into_inner().unwrap()
    }
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, content: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, content).unwrap();
}

// ---------------------------------------------------------------------------
// Image source
// ---------------------------------------------------------------------------

pub struct MemorySource {
    archive: Vec<u8>,
    pub saved: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new(archive: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            archive,
            saved: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn save(&self, reference: &str, dest: &mut tokio::fs::File) -> Result<u64> {
        self.saved.lock().unwrap().push(reference.to_string());
        dest.write_all(&self.archive).await?;
        Ok(self.archive.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Stat(String),
    Create,
    Upload(u64),
    Commit { digest: String, size: u64 },
    ConfigPut(String),
    ManifestExists(String),
    ManifestPut { tag: Option<String>, digest: String },
}

#[derive(Default)]
struct RegistryState {
    blobs: HashMap<String, u64>,
    manifests: HashMap<String, Vec<u8>>,
    images: HashMap<String, String>,
    tags: HashMap<String, String>,
    calls: Vec<Call>,
    unreachable: HashSet<String>,
    failing_commits: HashSet<String>,
    open_delay: Option<Duration>,
    stat_delay: Option<Duration>,
    stat_delays: HashMap<String, Duration>,
}

/// Registry double recording every call made against it
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<MemoryConnector> {
        Arc::new(MemoryConnector {
            registry: self.clone(),
        })
    }

    pub fn seed_blob(&self, digest: &str, size: u64) {
        self.state.lock().unwrap().blobs.insert(digest.to_string(), size);
    }

    pub fn unreachable(&self, base_url: &str) {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .insert(base_url.to_string());
    }

    pub fn fail_commit(&self, digest: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_commits
            .insert(digest.to_string());
    }

    pub fn delay_open(&self, delay: Duration) {
        self.state.lock().unwrap().open_delay = Some(delay);
    }

    pub fn delay_stat(&self, delay: Duration) {
        self.state.lock().unwrap().stat_delay = Some(delay);
    }

    /// Delay stats of one digest only
    pub fn delay_stat_of(&self, digest: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .stat_delays
            .insert(digest.to_string(), delay);
    }

    /// Record that the manifest `digest` exists for the image config `config_digest`
    pub fn seed_manifest(&self, config_digest: &str, digest: &str) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(config_digest.to_string(), digest.to_string());
    }

    pub fn seed_tag(&self, tag: &str, digest: &str) {
        self.state
            .lock()
            .unwrap()
            .tags
            .insert(tag.to_string(), digest.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn has_blob(&self, digest: &str) -> bool {
        self.state.lock().unwrap().blobs.contains_key(digest)
    }

    pub fn manifest(&self, digest: &str) -> Option<serde_json::Value> {
        self.state
            .lock()
            .unwrap()
            .manifests
            .get(digest)
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
    }

    pub fn tag(&self, tag: &str) -> Option<String> {
        self.state.lock().unwrap().tags.get(tag).cloned()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

pub struct MemoryConnector {
    registry: MemoryRegistry,
}

#[async_trait]
impl RepositoryConnector for MemoryConnector {
    async fn open(&self, name: &str, base_url: &str) -> Result<Box<dyn Repository>> {
        self.registry.record(Call::Open(base_url.to_string()));

        let (delay, unreachable) = {
            let state = self.registry.state.lock().unwrap();
            (state.open_delay, state.unreachable.contains(base_url))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            return Err(PusherError::Network(format!("connection refused: {}", base_url)));
        }

        Ok(Box::new(MemoryRepository {
            name: name.to_string(),
            base_url: base_url.to_string(),
            blobs: MemoryBlobStore {
                registry: self.registry.clone(),
            },
            manifests: MemoryManifestStore {
                registry: self.registry.clone(),
            },
        }))
    }
}

struct MemoryRepository {
    name: String,
    base_url: String,
    blobs: MemoryBlobStore,
    manifests: MemoryManifestStore,
}

impl Repository for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn blobs(&self) -> &dyn BlobStore {
        &self.blobs
    }

    fn manifests(&self) -> &dyn ManifestStore {
        &self.manifests
    }
}

struct MemoryBlobStore {
    registry: MemoryRegistry,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn stat(&self, digest: &str) -> Result<Option<Descriptor>> {
        self.registry.record(Call::Stat(digest.to_string()));

        let delay = {
            let state = self.registry.state.lock().unwrap();
            state.stat_delays.get(digest).copied().or(state.stat_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let size = self.registry.state.lock().unwrap().blobs.get(digest).copied();
        Ok(size.map(|size| Descriptor::new("application/octet-stream", size, digest)))
    }

    async fn create(&self) -> Result<Box<dyn BlobWriter>> {
        self.registry.record(Call::Create);
        Ok(Box::new(MemoryBlobWriter {
            registry: self.registry.clone(),
            content: Vec::new(),
        }))
    }

    async fn put(&self, media_type: &str, content: Vec<u8>) -> Result<Descriptor> {
        let digest = DigestUtils::compute_docker_digest(&content);
        self.registry.record(Call::ConfigPut(digest.clone()));
        self.registry
            .state
            .lock()
            .unwrap()
            .blobs
            .insert(digest.clone(), content.len() as u64);
        Ok(Descriptor::new(media_type, content.len() as u64, &digest))
    }
}

struct MemoryBlobWriter {
    registry: MemoryRegistry,
    content: Vec<u8>,
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    async fn read_from(&mut self, mut reader: BlobReader, size: u64) -> Result<u64> {
        let read = reader.read_to_end(&mut self.content).await? as u64;
        self.registry.record(Call::Upload(read));
        if read != size {
            return Err(PusherError::Upload(format!("expected {} bytes, got {}", size, read)));
        }
        Ok(read)
    }

    async fn commit(&mut self, expected: &Descriptor) -> Result<Descriptor> {
        let size = self.content.len() as u64;
        self.registry.record(Call::Commit {
            digest: expected.digest.clone(),
            size,
        });

        let mut state = self.registry.state.lock().unwrap();
        if state.failing_commits.contains(&expected.digest) {
            return Err(PusherError::Upload("BLOB_UPLOAD_INVALID".to_string()));
        }
        if DigestUtils::compute_docker_digest(&self.content) != expected.digest {
            return Err(PusherError::Upload("DIGEST_INVALID".to_string()));
        }
        state.blobs.insert(expected.digest.clone(), size);
        Ok(expected.clone())
    }
}

struct MemoryManifestStore {
    registry: MemoryRegistry,
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    // Manifests are found by their own digest, by the digest of the image
    // config they carry, or by tag
    async fn exists(&self, reference: &str) -> Result<Option<String>> {
        self.registry.record(Call::ManifestExists(reference.to_string()));
        let state = self.registry.state.lock().unwrap();
        if state.manifests.contains_key(reference) {
            return Ok(Some(reference.to_string()));
        }
        Ok(state
            .images
            .get(reference)
            .or_else(|| state.tags.get(reference))
            .cloned())
    }

    async fn put(&self, manifest: &SerializedManifest, tag: Option<&str>) -> Result<String> {
        self.registry.record(Call::ManifestPut {
            tag: tag.map(str::to_string),
            digest: manifest.digest.clone(),
        });

        let mut state = self.registry.state.lock().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&manifest.bytes)?;
        let referenced = std::iter::once(&json["config"])
            .chain(json["layers"].as_array().into_iter().flatten())
            .filter_map(|d| d["digest"].as_str());
        for digest in referenced {
            if !state.blobs.contains_key(digest) {
                return Err(PusherError::Registry(format!("BLOB_UNKNOWN {}", digest)));
            }
        }

        let digest = DigestUtils::compute_docker_digest(&manifest.bytes);
        if let Some(config_digest) = json["config"]["digest"].as_str() {
            state.images.insert(config_digest.to_string(), digest.clone());
        }
        state.manifests.insert(digest.clone(), manifest.bytes.clone());
        if let Some(tag) = tag {
            state.tags.insert(tag.to_string(), digest.clone());
        }
        Ok(digest)
    }
}
