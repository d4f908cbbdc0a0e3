//! Blob operations for the HTTP repository session
//!
//! Implements Docker Registry v2 blob operations:
//! - Blob existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Upload session creation (POST /v2/{name}/blobs/uploads/)
//! - Streamed upload (PATCH {location})
//! - Upload commit (PUT {location}?digest={digest})

use crate::error::handlers::HttpErrorHandler;
use crate::error::{PusherError, Result};
use crate::image::Descriptor;
use crate::registry::transport::{HttpTransport, error_text, header_value};
use crate::registry::{BlobReader, BlobStore, BlobWriter};
use async_trait::async_trait;
use reqwest::{Body, Method, StatusCode};
use tokio_util::io::ReaderStream;
use url::Url;

const OCTET_STREAM: &str = "application/octet-stream";

pub struct HttpBlobStore {
    transport: HttpTransport,
    repository: String,
}

impl HttpBlobStore {
    pub fn new(transport: HttpTransport, repository: &str) -> Self {
        Self {
            transport,
            repository: repository.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn stat(&self, digest: &str) -> Result<Option<Descriptor>> {
        let url = self
            .transport
            .endpoint(&format!("/v2/{}/blobs/{}", self.repository, digest))?;
        let response = self
            .transport
            .send(self.transport.request(Method::HEAD, url), "blob existence check")
            .await?;

        match response.status() {
            StatusCode::OK => {
                let size = header_value(&response, "Content-Length")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or_default();
                let media_type =
                    header_value(&response, "Content-Type").unwrap_or_else(|| OCTET_STREAM.to_string());
                let digest = header_value(&response, "Docker-Content-Digest")
                    .unwrap_or_else(|| digest.to_string());
                Ok(Some(Descriptor::new(&media_type, size, &digest)))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text(response).await,
                "blob existence check",
            )),
        }
    }

    async fn create(&self) -> Result<Box<dyn BlobWriter>> {
        let url = self
            .transport
            .endpoint(&format!("/v2/{}/blobs/uploads/", self.repository))?;
        let response = self
            .transport
            .send(self.transport.request(Method::POST, url), "upload session")
            .await?;

        let status = response.status();
        if status != StatusCode::ACCEPTED && !status.is_success() {
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text(response).await,
                "upload session",
            ));
        }

        let location = header_value(&response, "Location").ok_or_else(|| {
            PusherError::Upload("Missing Location header in upload session response".to_string())
        })?;
        let location = self.transport.resolve_location(&location)?;
        self.transport
            .logger()
            .detail(&format!("Upload session started at {}", location.path()));

        Ok(Box::new(HttpBlobWriter {
            transport: self.transport.clone(),
            location,
            written: 0,
        }))
    }
}

pub struct HttpBlobWriter {
    transport: HttpTransport,
    location: Url,
    written: u64,
}

#[async_trait]
impl BlobWriter for HttpBlobWriter {
    async fn read_from(&mut self, reader: BlobReader, size: u64) -> Result<u64> {
        let body = Body::wrap_stream(ReaderStream::new(reader));
        let request = self
            .transport
            .request(Method::PATCH, self.location.clone())
            .header("Content-Type", OCTET_STREAM)
            .header("Content-Length", size.to_string())
            .body(body);

        let response = self.transport.send(request, "blob upload").await?;
        let status = response.status();
        if status != StatusCode::ACCEPTED && !status.is_success() {
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text(response).await,
                "blob upload",
            ));
        }

        if let Some(location) = header_value(&response, "Location") {
            self.location = self.transport.resolve_location(&location)?;
        }
        self.written += size;
        Ok(size)
    }

    async fn commit(&mut self, expected: &Descriptor) -> Result<Descriptor> {
        if self.written != expected.size {
            return Err(PusherError::Upload(format!(
                "Wrote {} bytes but {} declares {}",
                self.written, expected.digest, expected.size
            )));
        }

        let mut url = self.location.clone();
        url.query_pairs_mut().append_pair("digest", &expected.digest);

        let request = self
            .transport
            .request(Method::PUT, url)
            .header("Content-Length", "0");
        let response = self.transport.send(request, "blob commit").await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text(response).await,
                "blob commit",
            ));
        }

        if let Some(digest) = header_value(&response, "Docker-Content-Digest") {
            if digest != expected.digest {
                return Err(PusherError::Upload(format!(
                    "Registry stored {} but {} was expected",
                    digest, expected.digest
                )));
            }
        }

        Ok(expected.clone())
    }
}
