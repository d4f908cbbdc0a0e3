mod common;

use common::{ArchiveBuilder, MemorySource, TestLayer, config_json};
use docker_papa::error::PusherError;
use docker_papa::image::{ImageArchive, MEDIA_TYPE_UNCOMPRESSED_LAYER, resolve_layers};
use docker_papa::logging::Logger;
use std::io::Write;

async fn load(archive: Vec<u8>) -> docker_papa::Result<ImageArchive> {
    let source = MemorySource::new(archive);
    ImageArchive::load(&*source, "app:latest", &Logger::new_quiet()).await
}

fn assert_load_error(result: docker_papa::Result<ImageArchive>, needle: &str) {
    match result {
        Err(PusherError::Load(message)) => {
            assert!(message.contains(needle), "'{}' does not mention '{}'", message, needle)
        }
        Err(other) => panic!("expected a load error, got {other}"),
        Ok(_) => panic!("expected a load error"),
    }
}

#[tokio::test]
async fn test_loads_entries_and_resolves_layers_in_order() {
    let first = TestLayer::new(b'a', 100);
    let second = TestLayer::new(b'b', 250);
    let archive = load(ArchiveBuilder::new().image("app", &[&first, &second]).build())
        .await
        .unwrap();

    assert_eq!(archive.entries().len(), 1);
    let entry = &archive.entries()[0];
    assert_eq!(entry.config.diff_ids, vec![first.digest.clone(), second.digest.clone()]);
    assert_eq!(entry.config.os, "linux");

    let layers = resolve_layers(&archive, true, &Logger::new_quiet()).await.unwrap();
    let resolved: Vec<_> = layers.iter().map(|l| (l.digest(), l.size())).collect();
    assert_eq!(
        resolved,
        vec![(first.digest.as_str(), 100), (second.digest.as_str(), 250)]
    );
    assert!(layers.iter().all(|l| l.descriptor.media_type == MEDIA_TYPE_UNCOMPRESSED_LAYER));
    assert_eq!(
        layers[0].descriptor.platform.as_ref().map(|p| p.architecture.as_str()),
        Some("amd64")
    );
    let root = archive.root().canonicalize().unwrap();
    assert!(layers.iter().all(|l| l.path.starts_with(&root)));
}

#[tokio::test]
async fn test_close_removes_extraction() {
    let layer = TestLayer::new(b'a', 8);
    let archive = load(ArchiveBuilder::new().image("app", &[&layer]).build())
        .await
        .unwrap();
    let root = archive.root().to_path_buf();
    assert!(root.join("manifest.json").exists());

    archive.close().unwrap();
    assert!(!root.exists());
}

#[tokio::test]
async fn test_dropping_archive_removes_extraction() {
    let layer = TestLayer::new(b'a', 8);
    let archive = load(ArchiveBuilder::new().image("app", &[&layer]).build())
        .await
        .unwrap();
    let root = archive.root().to_path_buf();

    drop(archive);
    assert!(!root.exists());
}

#[tokio::test]
async fn test_gzip_archive_is_accepted() {
    let layer = TestLayer::new(b'z', 32);
    let plain = ArchiveBuilder::new().image("app", &[&layer]).build();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&plain).unwrap();

    let archive = load(encoder.finish().unwrap()).await.unwrap();
    assert_eq!(archive.entries()[0].config.diff_ids, vec![layer.digest]);
}

#[tokio::test]
async fn test_layer_path_with_dot_dot_is_rejected() {
    let layer = TestLayer::new(b'a', 8);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .item("app.json", &["../../../etc/passwd"])
        .build();

    assert_load_error(load(archive).await, "outside the archive root");
}

#[tokio::test]
async fn test_config_path_with_dot_dot_is_rejected() {
    let archive = ArchiveBuilder::new().item("../outside.json", &[]).build();
    assert_load_error(load(archive).await, "outside the archive root");
}

#[tokio::test]
async fn test_absolute_layer_path_is_rejected() {
    let layer = TestLayer::new(b'a', 8);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .item("app.json", &["/etc/passwd"])
        .build();

    assert_load_error(load(archive).await, "outside the archive root");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_leaving_root_is_rejected() {
    let layer = TestLayer::new(b'a', 8);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .symlink("escape", "/etc")
        .item("app.json", &["escape/passwd"])
        .build();

    assert_load_error(load(archive).await, "outside the archive root");
}

#[cfg(unix)]
#[tokio::test]
async fn test_relative_symlink_leaving_root_is_rejected() {
    let layer = TestLayer::new(b'a', 8);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .symlink("up", "../../../../..")
        .item("app.json", &["up/etc/passwd"])
        .build();

    assert_load_error(load(archive).await, "outside the archive root");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_layer_inside_root_is_followed() {
    let layer = TestLayer::new(b'q', 12);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .file("blobs/real.tar", &layer.content)
        .symlink("link.tar", "blobs/real.tar")
        .item("app.json", &["link.tar"])
        .build();

    let archive = load(archive).await.unwrap();
    let layers = resolve_layers(&archive, true, &Logger::new_quiet()).await.unwrap();
    assert_eq!(layers[0].size(), 12);
    assert!(layers[0].path.ends_with("blobs/real.tar"));
}

#[tokio::test]
async fn test_diff_id_count_mismatch_is_rejected() {
    let layer = TestLayer::new(b'a', 8);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .file("l0/layer.tar", &layer.content)
        .file("l1/layer.tar", &layer.content)
        .item("app.json", &["l0/layer.tar", "l1/layer.tar"])
        .build();

    assert_load_error(load(archive).await, "declares 1 diff ids");
}

#[tokio::test]
async fn test_empty_manifest_is_rejected() {
    assert_load_error(load(ArchiveBuilder::new().build()).await, "lists no images");
}

#[tokio::test]
async fn test_malformed_config_is_a_load_error() {
    let archive = ArchiveBuilder::new()
        .file("app.json", b"{\"rootfs\": 12")
        .item("app.json", &[])
        .build();

    assert!(matches!(load(archive).await, Err(PusherError::Load(_))));
}

#[tokio::test]
async fn test_archive_without_manifest_is_rejected() {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(3);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "other.txt", &b"abc"[..]).unwrap();

    assert_load_error(load(builder.into_inner().unwrap()).await, "manifest.json");
}

#[tokio::test]
async fn test_missing_layer_artifact_is_a_descriptor_error() {
    let layer = TestLayer::new(b'a', 8);
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&[&layer.digest]))
        .item("app.json", &["missing/layer.tar"])
        .build();

    let archive = load(archive).await.unwrap();
    let err = resolve_layers(&archive, false, &Logger::new_quiet())
        .await
        .unwrap_err();
    assert!(matches!(err, PusherError::Descriptor(_)));
}

#[tokio::test]
async fn test_invalid_diff_id_is_a_descriptor_error() {
    let archive = ArchiveBuilder::new()
        .file("app.json", &config_json(&["sha256:aaa"]))
        .file("l0/layer.tar", b"data")
        .item("app.json", &["l0/layer.tar"])
        .build();

    let archive = load(archive).await.unwrap();
    let err = resolve_layers(&archive, false, &Logger::new_quiet())
        .await
        .unwrap_err();
    assert!(matches!(err, PusherError::Descriptor(_)));
}
