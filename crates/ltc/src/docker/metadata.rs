//! Image metadata resolution.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;

use serde::Deserialize;
use tracing::{debug, warn};

use super::repository_name::ImageReference;
use crate::error::{LtcError, Result};

/// Registry endpoints and access tokens for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryData {
    /// Registry hosts serving the repository, in preference order.
    pub endpoints: Vec<String>,
    /// Tokens authorizing reads from the endpoints.
    pub tokens: Vec<String>,
}

/// A conversation with one Docker registry index.
pub trait RegistrySession: Send + Sync {
    /// Looks up where `remote_name` is served.
    fn repository_data(&self, remote_name: &str) -> impl Future<Output = Result<RepositoryData>> + Send;

    /// Tag to image id mapping of `remote_name`.
    fn remote_tags(
        &self,
        endpoints: &[String],
        remote_name: &str,
        tokens: &[String],
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send;

    /// Raw image JSON of `image_id` from one endpoint.
    fn remote_image_json(
        &self,
        image_id: &str,
        endpoint: &str,
        tokens: &[String],
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Opens registry sessions.
pub trait RegistrySessionFactory: Send + Sync {
    /// Session type produced.
    type Session: RegistrySession;

    /// Opens a session with the index serving `index_name` (empty for
    /// the public index).
    ///
    /// # Errors
    ///
    /// Returns an error if the index address is unusable.
    fn make_session(&self, index_name: &str) -> Result<Self::Session>;
}

/// Port policy derived from an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortConfig {
    /// Port checked for liveness; 0 when nothing is exposed.
    pub monitored: u16,
    /// Exposed TCP ports, ascending.
    pub exposed: Vec<u16>,
}

impl PortConfig {
    /// Builds a policy from exposed ports: sorted, deduplicated, and
    /// monitoring the smallest.
    #[must_use]
    pub fn from_exposed(ports: impl IntoIterator<Item = u16>) -> Self {
        let exposed: Vec<u16> = ports.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        Self {
            monitored: exposed.first().copied().unwrap_or(0),
            exposed,
        }
    }

    /// Whether the policy exposes `port`.
    #[must_use]
    pub fn is_exposed(&self, port: u16) -> bool {
        self.exposed.contains(&port)
    }
}

/// Fields needed to run an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Default working directory.
    pub working_dir: String,
    /// `Entrypoint` followed by `Cmd`.
    pub start_command: Vec<String>,
    /// Port policy from `ExposedPorts`.
    pub ports: PortConfig,
    /// `NAME=VALUE` pairs the image sets for its processes.
    pub env: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Cmd", default)]
    cmd: Option<Vec<String>>,
    #[serde(rename = "Entrypoint", default)]
    entrypoint: Option<Vec<String>>,
    #[serde(rename = "WorkingDir", default)]
    working_dir: String,
    #[serde(rename = "ExposedPorts", default)]
    exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(rename = "Env", default)]
    env: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ImageJson {
    #[serde(default)]
    config: Option<ContainerConfig>,
    #[serde(default)]
    container_config: Option<ContainerConfig>,
}

/// Parses TCP ports out of an `ExposedPorts` map such as
/// `{"80/tcp": {}, "53/udp": {}}`. Unparseable keys are skipped.
#[must_use]
pub fn tcp_ports(exposed: &BTreeMap<String, serde_json::Value>) -> Vec<u16> {
    exposed
        .keys()
        .filter_map(|key| key.strip_suffix("/tcp"))
        .filter_map(|port| match port.parse::<u16>() {
            Ok(port) => Some(port),
            Err(e) => {
                warn!(port, error = %e, "skipping unparseable exposed port");
                None
            }
        })
        .collect()
}

/// Converts raw image JSON into [`ImageMetadata`].
///
/// # Errors
///
/// Fails when the document does not parse or has no `config`.
pub fn parse_image_json(raw: &[u8]) -> Result<ImageMetadata> {
    let image: ImageJson = serde_json::from_slice(raw)
        .map_err(|e| LtcError::Docker(format!("Error parsing remote image json: {e}")))?;

    let config = image
        .config
        .ok_or_else(|| LtcError::Docker("Parsing start command failed".into()))?;

    let exposed = config
        .exposed_ports
        .as_ref()
        .filter(|ports| !ports.is_empty())
        .or_else(|| {
            image
                .container_config
                .as_ref()
                .and_then(|c| c.exposed_ports.as_ref())
        })
        .map(tcp_ports)
        .unwrap_or_default();

    let mut start_command = config.entrypoint.unwrap_or_default();
    start_command.extend(config.cmd.unwrap_or_default());

    Ok(ImageMetadata {
        working_dir: config.working_dir,
        start_command,
        ports: PortConfig::from_exposed(exposed),
        env: config.env.unwrap_or_default(),
    })
}

/// Resolves image references into [`ImageMetadata`] through a registry.
#[derive(Debug, Clone)]
pub struct DockerMetadataFetcher<F> {
    session_factory: F,
}

impl<F: RegistrySessionFactory> DockerMetadataFetcher<F> {
    /// Creates a fetcher.
    #[must_use]
    pub const fn new(session_factory: F) -> Self {
        Self { session_factory }
    }

    /// Fetches metadata of the image named by `reference`.
    ///
    /// # Errors
    ///
    /// Fails on invalid references, registry errors, unknown tags, and
    /// malformed image documents.
    pub async fn fetch_metadata(&self, reference: &str) -> Result<ImageMetadata> {
        let image = ImageReference::parse(reference)?;
        let session = self.session_factory.make_session(&image.index_name)?;

        let repo = session.repository_data(&image.remote_name).await?;
        debug!(repo = %image.remote_name, endpoints = ?repo.endpoints, "repository data");

        let tags = session
            .remote_tags(&repo.endpoints, &image.remote_name, &repo.tokens)
            .await?;
        let image_id = tags.get(&image.tag).ok_or_else(|| {
            LtcError::Docker(format!("Unknown tag: {}:{}", image.remote_name, image.tag))
        })?;

        let mut last_error = None;
        for endpoint in &repo.endpoints {
            match session
                .remote_image_json(image_id, endpoint, &repo.tokens)
                .await
            {
                Ok(raw) => return parse_image_json(&raw),
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "image json fetch failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LtcError::Docker(format!("No registry endpoint serves {}", image.remote_name))
        }))
    }
}
