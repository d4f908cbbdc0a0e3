//! Manifest operations for the HTTP repository session
//!
//! Implements Docker Registry v2 manifest operations:
//! - Manifest existence checks (HEAD /v2/{name}/manifests/{reference})
//! - Manifest upload (PUT /v2/{name}/manifests/{reference})

use crate::error::Result;
use crate::error::handlers::HttpErrorHandler;
use crate::image::{MEDIA_TYPE_MANIFEST, SerializedManifest};
use crate::registry::ManifestStore;
use crate::registry::transport::{HttpTransport, error_text, header_value};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};

pub struct HttpManifestStore {
    transport: HttpTransport,
    repository: String,
}

impl HttpManifestStore {
    pub fn new(transport: HttpTransport, repository: &str) -> Self {
        Self {
            transport,
            repository: repository.to_string(),
        }
    }
}

#[async_trait]
impl ManifestStore for HttpManifestStore {
    async fn exists(&self, reference: &str) -> Result<Option<String>> {
        let url = self
            .transport
            .endpoint(&format!("/v2/{}/manifests/{}", self.repository, reference))?;
        let request = self
            .transport
            .request(Method::HEAD, url)
            .header("Accept", MEDIA_TYPE_MANIFEST);
        let response = self.transport.send(request, "manifest existence check").await?;

        match response.status() {
            StatusCode::OK => Ok(Some(
                header_value(&response, "Docker-Content-Digest")
                    .unwrap_or_else(|| reference.to_string()),
            )),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text(response).await,
                "manifest existence check",
            )),
        }
    }

    async fn put(&self, manifest: &SerializedManifest, tag: Option<&str>) -> Result<String> {
        let reference = tag.unwrap_or(&manifest.digest);
        let url = self
            .transport
            .endpoint(&format!("/v2/{}/manifests/{}", self.repository, reference))?;

        self.transport.logger().verbose(&format!(
            "Uploading manifest with content-type: {}",
            manifest.media_type
        ));

        let request = self
            .transport
            .request(Method::PUT, url)
            .header("Content-Type", manifest.media_type.as_str())
            .body(manifest.bytes.clone());
        let response = self.transport.send(request, "manifest upload").await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text(response).await,
                "manifest upload",
            ));
        }

        Ok(header_value(&response, "Docker-Content-Digest").unwrap_or_else(|| manifest.digest.clone()))
    }
}
