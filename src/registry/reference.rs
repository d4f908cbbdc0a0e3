//! Image reference parsing
//!
//! Turns names such as `nginx`, `registry.context/team/app:v1` or
//! `localhost:5000/app@sha256:...` into the canonical repository path used
//! in Registry v2 URLs, following Docker's defaulting rules.

use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use std::fmt;

pub const DEFAULT_DOMAIN: &str = "docker.io";
pub const DEFAULT_TAG: &str = "latest";
const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";
const OFFICIAL_NAMESPACE: &str = "library";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub domain: String,
    pub path: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PusherError::Validation("Image name is required".to_string()));
        }

        let (name_and_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(DigestUtils::normalize_digest(digest)?)),
            None => (reference, None),
        };

        let last_slash = name_and_tag.rfind('/').map(|pos| pos + 1).unwrap_or(0);
        let (name, tag) = match name_and_tag[last_slash..].rfind(':') {
            Some(pos) => {
                let split = last_slash + pos;
                (&name_and_tag[..split], Some(name_and_tag[split + 1..].to_string()))
            }
            None => (name_and_tag, None),
        };

        if let Some(tag) = &tag {
            validate_tag(tag)?;
        }

        let (domain, remainder) = match name.split_once('/') {
            Some((first, rest)) if is_domain(first) => (first.to_string(), rest.to_string()),
            _ => (DEFAULT_DOMAIN.to_string(), name.to_string()),
        };

        let domain = if domain == LEGACY_DEFAULT_DOMAIN {
            DEFAULT_DOMAIN.to_string()
        } else {
            domain
        };

        let path = if domain == DEFAULT_DOMAIN && !remainder.contains('/') {
            format!("{}/{}", OFFICIAL_NAMESPACE, remainder)
        } else {
            remainder
        };

        for component in path.split('/') {
            validate_path_component(component, reference)?;
        }

        Ok(Self {
            domain,
            path,
            tag,
            digest,
        })
    }

    /// Repository path relative to the registry, e.g. `library/nginx`
    pub fn repository(&self) -> &str {
        &self.path
    }

    /// Tag the manifest is published under
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.path)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

fn is_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn validate_tag(tag: &str) -> Result<()> {
    let valid = !tag.is_empty()
        && tag.len() <= 128
        && !tag.starts_with(['.', '-'])
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(())
    } else {
        Err(PusherError::Validation(format!("Invalid tag '{}'", tag)))
    }
}

fn validate_path_component(component: &str, reference: &str) -> Result<()> {
    let valid = !component.is_empty()
        && component
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        && component.starts_with(|c: char| c.is_ascii_alphanumeric())
        && component.ends_with(|c: char| c.is_ascii_alphanumeric());

    if valid {
        Ok(())
    } else {
        Err(PusherError::Validation(format!(
            "Invalid repository name in '{}': component '{}' must be lowercase alphanumerics separated by '.', '_' or '-'",
            reference, component
        )))
    }
}
