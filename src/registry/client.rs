//! Repository client
//!
//! Derives the base URLs a remote may answer on and opens a repository
//! session on the first one that works. [`HttpConnector`] is the Registry v2
//! implementation: it probes `GET /v2/`, negotiates credentials and hands
//! out HTTP backed blob and manifest stores.

use crate::config::{AuthConfig, PushConfig};
use crate::error::handlers::HttpErrorHandler;
use crate::error::{PusherError, Result};
use crate::logging::Logger;
use crate::registry::auth::{Auth, AuthChallenge};
use crate::registry::operations::{HttpBlobStore, HttpManifestStore};
use crate::registry::transport::{HttpTransport, build_client, error_text, header_value};
use crate::registry::{BlobStore, ManifestStore, Repository, RepositoryConnector};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use url::Url;

/// Base URLs to try for `remote`, in order.
///
/// A remote that already names a scheme is used as given; otherwise plain
/// HTTP is tried before HTTPS.
pub fn candidate_base_urls(remote: &str) -> Result<Vec<String>> {
    let remote = remote.trim().trim_end_matches('/');
    if remote.is_empty() {
        return Err(PusherError::Validation("Registry remote is empty".to_string()));
    }

    let candidates = if remote.starts_with("http") {
        vec![remote.to_string()]
    } else {
        vec![format!("http://{}", remote), format!("https://{}", remote)]
    };

    for candidate in &candidates {
        Url::parse(candidate).map_err(|e| {
            PusherError::Validation(format!("Invalid registry address '{}': {}", candidate, e))
        })?;
    }

    Ok(candidates)
}

/// Opens repositories against the first candidate base URL that answers
pub struct RegistryClient {
    connector: Arc<dyn RepositoryConnector>,
    logger: Logger,
}

impl RegistryClient {
    pub fn new(connector: Arc<dyn RepositoryConnector>, logger: Logger) -> Self {
        Self { connector, logger }
    }

    pub async fn open(&self, repository: &str, remote: &str) -> Result<Box<dyn Repository>> {
        let candidates = candidate_base_urls(remote)?;
        let mut failures = Vec::with_capacity(candidates.len());

        for base_url in &candidates {
            self.logger.verbose(&format!("Trying {}", base_url));
            match self.connector.open(repository, base_url).await {
                Ok(session) => {
                    self.logger
                        .info(&format!("Using registry endpoint {}", base_url));
                    return Ok(session);
                }
                Err(e) if e.is_timeout() => return Err(e),
                Err(e) => {
                    self.logger
                        .verbose(&format!("{} unavailable: {}", base_url, e));
                    failures.push(format!("{}: {}", base_url, e));
                }
            }
        }

        Err(PusherError::RepositoryOpen {
            repository: repository.to_string(),
            reason: failures.join("; "),
        })
    }
}

/// Registry v2 connector over reqwest
pub struct HttpConnector {
    client: Client,
    auth: AuthConfig,
    logger: Logger,
}

impl HttpConnector {
    pub fn new(config: &PushConfig, logger: Logger) -> Result<Self> {
        Ok(Self {
            client: build_client(config.skip_tls)?,
            auth: config.auth.clone(),
            logger,
        })
    }
}

#[async_trait]
impl RepositoryConnector for HttpConnector {
    async fn open(&self, name: &str, base_url: &str) -> Result<Box<dyn Repository>> {
        let probe = HttpTransport::new(self.client.clone(), base_url, None, self.logger.clone())?;
        let url = probe.endpoint("/v2/")?;
        let response = probe.send(self.client.get(url), "registry probe").await?;

        let credential = match response.status() {
            StatusCode::OK => None,
            StatusCode::UNAUTHORIZED => {
                let header = header_value(&response, "WWW-Authenticate").ok_or_else(|| {
                    PusherError::Authentication(
                        "Registry answered 401 without an authentication challenge".to_string(),
                    )
                })?;
                let challenge = AuthChallenge::parse(&header).ok_or_else(|| {
                    PusherError::Authentication(format!(
                        "Unsupported authentication challenge: {}",
                        header
                    ))
                })?;
                self.logger.detail(&format!("Auth challenge: {:?}", challenge));

                Auth::new(self.client.clone(), self.logger.clone())
                    .authorize(&challenge, name, &self.auth)
                    .await?
            }
            status => {
                return Err(HttpErrorHandler::handle_registry_error(
                    status,
                    &error_text(response).await,
                    "registry probe",
                ));
            }
        };

        let transport =
            HttpTransport::new(self.client.clone(), base_url, credential, self.logger.clone())?;

        Ok(Box::new(HttpRepository {
            name: name.to_string(),
            base_url: base_url.to_string(),
            blobs: HttpBlobStore::new(transport.clone(), name),
            manifests: HttpManifestStore::new(transport, name),
        }))
    }
}

pub struct HttpRepository {
    name: String,
    base_url: String,
    blobs: HttpBlobStore,
    manifests: HttpManifestStore,
}

impl Repository for HttpRepository {
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
