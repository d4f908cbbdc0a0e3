//! Authentication for Docker registry access
//!
//! Registries announce their scheme in the `WWW-Authenticate` header of a
//! 401 answer to `GET /v2/`. Bearer challenges are exchanged for a token
//! scoped to the repository being pushed; basic challenges reuse the
//! configured credentials on every request.

use crate::config::AuthConfig;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{PusherError, Result};
use crate::logging::Logger;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Bearer {
        realm: String,
        service: Option<String>,
    },
    Basic,
}

impl AuthChallenge {
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(AuthChallenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut values = HashMap::new();
        for param in split_params(params) {
            if let Some((key, value)) = param.split_once('=') {
                values.insert(
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        let realm = values.remove("realm")?;
        Some(AuthChallenge::Bearer {
            realm,
            service: values.remove("service"),
        })
    }
}

// Commas inside quoted values (e.g. multiple scopes) do not separate params
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (i, c) in params.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&params[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Credential attached to every request of a repository session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

pub struct Auth {
    client: Client,
    logger: Logger,
}

impl Auth {
    pub fn new(client: Client, logger: Logger) -> Self {
        Self { client, logger }
    }

    /// Satisfy `challenge` for push access to `repository`
    pub async fn authorize(
        &self,
        challenge: &AuthChallenge,
        repository: &str,
        auth: &AuthConfig,
    ) -> Result<Option<Credential>> {
        match challenge {
            AuthChallenge::Basic => match (&auth.username, &auth.password) {
                (Some(username), Some(password)) => Ok(Some(Credential::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })),
                _ => Err(PusherError::Authentication(
                    "Registry requires basic authentication but no credentials are configured"
                        .to_string(),
                )),
            },
            AuthChallenge::Bearer { realm, service } => {
                let scope = format!("repository:{}:pull,push", repository);
                let token = self.fetch_token(realm, service.as_deref(), &scope, auth).await?;
                Ok(Some(Credential::Bearer(token)))
            }
        }
    }

    async fn fetch_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: &str,
        auth: &AuthConfig,
    ) -> Result<String> {
        let mut url = Url::parse(realm).map_err(|e| {
            PusherError::Authentication(format!("Invalid token realm '{}': {}", realm, e))
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = service {
                query.append_pair("service", service);
            }
            query.append_pair("scope", scope);
        }

        self.logger.detail(&format!("Requesting token for {}", scope));

        let mut request = self.client.get(url);
        if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PusherError::Parse(format!("Failed to parse token response: {}", e)))?;

        let token = body.token.or(body.access_token).ok_or_else(|| {
            PusherError::Authentication("Token response carried no token".to_string())
        })?;
        self.logger
            .detail(&format!("Token obtained (length: {} chars)", token.len()));
        Ok(token)
    }
}
