//! Docker image reference parsing.
//!
//! `ubuntu` → `docker:///library/ubuntu#latest`,
//! `jimbo/app:test` → `docker:///jimbo/app#test`,
//! `registry.example.com:5000/app` → `docker://registry.example.com:5000/app#latest`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{LtcError, Result};

/// Scheme of rootfs URLs understood by the cluster.
pub const DOCKER_SCHEME: &str = "docker";

/// Host name of the public Docker index.
pub const DOCKER_INDEX_SERVER: &str = "docker.io";

const DEFAULT_TAG: &str = "latest";

static NAMESPACE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]*$").unwrap_or_else(|_| unreachable!()));
static REPOSITORY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_.-]+$").unwrap_or_else(|_| unreachable!()));
static IMAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").unwrap_or_else(|_| unreachable!()));

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host; empty for the public index.
    pub index_name: String,
    /// `namespace/name` on the registry.
    pub remote_name: String,
    /// Tag, `latest` when unspecified.
    pub tag: String,
}

impl ImageReference {
    /// Parses a user-typed image reference.
    ///
    /// # Errors
    ///
    /// Returns [`LtcError::InvalidUserInput`] naming the offending
    /// segment when the namespace or repository name is invalid.
    pub fn parse(reference: &str) -> Result<Self> {
        let (first, rest) = match reference.split_once('/') {
            Some((first, rest)) => (first, Some(rest)),
            None => (reference, None),
        };

        let (index_name, mut remote_name) = match rest {
            Some(rest) if !is_official_index(first) => (first.to_string(), rest.to_string()),
            Some(rest) if first == DOCKER_INDEX_SERVER => {
                (DOCKER_INDEX_SERVER.to_string(), rest.to_string())
            }
            _ => (String::new(), reference.to_string()),
        };

        let official = index_name.is_empty() || index_name == DOCKER_INDEX_SERVER;
        if official && !remote_name.contains('/') {
            remote_name = format!("library/{remote_name}");
        }

        let (remote_name, tag) = split_tag(&remote_name);
        validate_remote_name(&remote_name)?;

        Ok(Self {
            index_name,
            remote_name,
            tag,
        })
    }

    /// Namespace part of the remote name.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.remote_name
            .split_once('/')
            .map_or("library", |(namespace, _)| namespace)
    }

    /// Repository part of the remote name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.remote_name
            .split_once('/')
            .map_or(self.remote_name.as_str(), |(_, name)| name)
    }

    /// The rootfs URL the cluster pulls, e.g. `docker:///library/redis#latest`.
    #[must_use]
    pub fn rootfs(&self) -> String {
        format!(
            "{DOCKER_SCHEME}://{}/{}#{}",
            self.index_name, self.remote_name, self.tag
        )
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rootfs())
    }
}

/// Converts a user-typed image reference into a rootfs URL.
///
/// # Errors
///
/// Fails for references that already carry a scheme and for invalid names.
pub fn format_for_receptor(reference: &str) -> Result<String> {
    if reference.contains("://") {
        return Err(LtcError::InvalidUserInput(format!(
            "docker URI [{reference}] should not contain scheme"
        )));
    }
    Ok(ImageReference::parse(reference)?.rootfs())
}

fn is_official_index(first: &str) -> bool {
    first == DOCKER_INDEX_SERVER
        || (!first.contains('.') && !first.contains(':') && first != "localhost")
}

fn split_tag(remote_name: &str) -> (String, String) {
    match remote_name.rfind(':') {
        None => (remote_name.to_string(), DEFAULT_TAG.to_string()),
        Some(n) if !remote_name[n + 1..].contains('/') => {
            let tag = &remote_name[n + 1..];
            let tag = if tag.is_empty() { DEFAULT_TAG } else { tag };
            (remote_name[..n].to_string(), tag.to_string())
        }
        Some(_) => (remote_name.to_string(), DEFAULT_TAG.to_string()),
    }
}

fn validate_remote_name(remote_name: &str) -> Result<()> {
    let (namespace, name) = match remote_name.split_once('/') {
        Some((namespace, name)) => (namespace, name),
        None => {
            if IMAGE_ID.is_match(remote_name) {
                return Err(invalid(format!(
                    "Invalid repository name ({remote_name}), cannot specify 64-byte hexadecimal strings"
                )));
            }
            ("library", remote_name)
        }
    };

    if !NAMESPACE_CHARS.is_match(namespace) {
        return Err(invalid(format!(
            "Invalid namespace name ({namespace}). Only [a-z0-9-_] are allowed."
        )));
    }
    if namespace.len() < 2 || namespace.len() > 255 {
        return Err(invalid(format!(
            "Invalid namespace name ({namespace}). Cannot be fewer than 2 or more than 255 characters."
        )));
    }
    if namespace.starts_with('-') || namespace.ends_with('-') {
        return Err(invalid(format!(
            "Invalid namespace name ({namespace}). Cannot begin or end with a hyphen."
        )));
    }
    if namespace.contains("--") {
        return Err(invalid(format!(
            "Invalid namespace name ({namespace}). Cannot contain consecutive hyphens."
        )));
    }
    if !REPOSITORY_CHARS.is_match(name) {
        return Err(invalid(format!(
            "Invalid repository name ({name}), only [a-z0-9-_.] are allowed"
        )));
    }
    Ok(())
}

fn invalid(message: String) -> LtcError {
    LtcError::InvalidUserInput(message)
}
