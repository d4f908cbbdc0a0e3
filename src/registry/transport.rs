//! HTTP transport shared by the blob and manifest stores of one session
//!
//! Holds the reqwest client, the registry base URL and the credential the
//! session negotiated, and turns registry-relative locations into absolute
//! URLs.

use crate::error::handlers::NetworkErrorHandler;
use crate::error::{PusherError, Result};
use crate::logging::Logger;
use crate::registry::auth::Credential;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the reqwest client used for every registry call
pub fn build_client(skip_tls: bool) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("docker-papa/", env!("CARGO_PKG_VERSION")));

    if skip_tls {
        builder = builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    builder
        .build()
        .map_err(|e| PusherError::Network(format!("Failed to build HTTP client: {}", e)))
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    credential: Option<Credential>,
    logger: Logger,
}

impl HttpTransport {
    pub fn new(
        client: Client,
        base_url: &str,
        credential: Option<Credential>,
        logger: Logger,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PusherError::Validation(format!("Invalid registry URL '{}': {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            credential,
            logger,
        })
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Absolute URL for a `/v2/...` path
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Resolve a `Location` header, which registries may send relative
    pub fn resolve_location(&self, location: &str) -> Result<Url> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(Url::parse(location)?)
        } else {
            Ok(self.base_url.join(location)?)
        }
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.credential {
            Some(Credential::Bearer(token)) => request.bearer_auth(token),
            Some(Credential::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            None => request,
        }
    }

    pub async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))
    }
}

/// Body of a failed response, for error messages
pub async fn error_text(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string())
}

pub fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(Client::new(), base, None, Logger::new_quiet()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_v2_paths() {
        let transport = transport("http://localhost:5000");
        assert_eq!(
            transport.endpoint("/v2/team/app/blobs/uploads/").unwrap().as_str(),
            "http://localhost:5000/v2/team/app/blobs/uploads/"
        );
    }

    #[test]
    fn test_resolve_location() {
        let transport = transport("https://registry.example.com");
        assert_eq!(
            transport
                .resolve_location("/v2/app/blobs/uploads/abc?_state=x")
                .unwrap()
                .as_str(),
            "https://registry.example.com/v2/app/blobs/uploads/abc?_state=x"
        );
        assert_eq!(
            transport
                .resolve_location("https://storage.example.com/upload/1")
                .unwrap()
                .as_str(),
            "https://storage.example.com/upload/1"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpTransport::new(Client::new(), "not a url", None, Logger::new_quiet()).is_err());
    }
}
