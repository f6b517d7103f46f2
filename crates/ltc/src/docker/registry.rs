//! Docker registry v1 client over reqwest.

use std::collections::HashMap;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use tracing::{debug, trace};

use super::metadata::{RegistrySession, RegistrySessionFactory, RepositoryData};
use super::repository_name::DOCKER_INDEX_SERVER;
use crate::error::{LtcError, Result};

const PUBLIC_INDEX: &str = "https://index.docker.io";
const TOKEN_HEADER: &str = "x-docker-token";
const ENDPOINTS_HEADER: &str = "x-docker-endpoints";

/// Opens [`HttpRegistrySession`]s.
#[derive(Debug, Clone, Default)]
pub struct HttpRegistrySessionFactory {
    http: reqwest::Client,
}

impl HttpRegistrySessionFactory {
    /// Creates a factory sharing one HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrySessionFactory for HttpRegistrySessionFactory {
    type Session = HttpRegistrySession;

    fn make_session(&self, index_name: &str) -> Result<HttpRegistrySession> {
        let index_url = if index_name.is_empty() || index_name == DOCKER_INDEX_SERVER {
            PUBLIC_INDEX.to_string()
        } else {
            format!("https://{index_name}")
        };
        url::Url::parse(&index_url)
            .map_err(|e| LtcError::Docker(format!("invalid registry {index_name}: {e}")))?;

        Ok(HttpRegistrySession {
            http: self.http.clone(),
            index_url,
        })
    }
}

/// Session with one registry index.
#[derive(Debug, Clone)]
pub struct HttpRegistrySession {
    http: reqwest::Client,
    index_url: String,
}

fn header_list(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn endpoint_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

fn token_header(tokens: &[String]) -> String {
    format!("Token {}", tokens.join(","))
}

impl HttpRegistrySession {
    async fn get(&self, url: &str, tokens: &[String]) -> Result<reqwest::Response> {
        trace!(%url, "registry request");
        let mut request = self.http.get(url);
        if !tokens.is_empty() {
            request = request.header(AUTHORIZATION, token_header(tokens));
        }
        let response = request
            .send()
            .await
            .map_err(|e| LtcError::Docker(e.to_string()))?;
        debug!(%url, status = %response.status(), "registry response");
        Ok(response)
    }
}

impl RegistrySession for HttpRegistrySession {
    async fn repository_data(&self, remote_name: &str) -> Result<RepositoryData> {
        let url = format!("{}/v1/repositories/{remote_name}/images", self.index_url);
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, "true")
            .send()
            .await
            .map_err(|e| LtcError::Docker(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(LtcError::Docker("Authentication is required.".into()));
            }
            StatusCode::NOT_FOUND => {
                return Err(LtcError::Docker(format!("Repository not found: {remote_name}")));
            }
            status if !status.is_success() => {
                return Err(LtcError::Docker(format!(
                    "Error: Status {} trying to pull repository {remote_name}",
                    status.as_u16()
                )));
            }
            _ => {}
        }

        let mut endpoints = header_list(response.headers(), ENDPOINTS_HEADER);
        if endpoints.is_empty() {
            endpoints.push(self.index_url.clone());
        }
        Ok(RepositoryData {
            endpoints,
            tokens: header_list(response.headers(), TOKEN_HEADER),
        })
    }

    async fn remote_tags(
        &self,
        endpoints: &[String],
        remote_name: &str,
        tokens: &[String],
    ) -> Result<HashMap<String, String>> {
        for endpoint in endpoints {
            let url = format!("{}/v1/repositories/{remote_name}/tags", endpoint_url(endpoint));
            let response = match self.get(&url, tokens).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(%endpoint, error = %e, "tag lookup failed");
                    continue;
                }
            };
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            if !response.status().is_success() {
                return Err(LtcError::Docker(format!(
                    "Server error: {} trying to fetch remote tags for {remote_name}",
                    response.status().as_u16()
                )));
            }
            return response
                .json::<HashMap<String, String>>()
                .await
                .map_err(|e| LtcError::Docker(format!("Error decoding tags of {remote_name}: {e}")));
        }
        Err(LtcError::Docker(format!(
            "Could not reach any registry endpoint for {remote_name}"
        )))
    }

    async fn remote_image_json(
        &self,
        image_id: &str,
        endpoint: &str,
        tokens: &[String],
    ) -> Result<Vec<u8>> {
        let url = format!("{}/v1/images/{image_id}/json", endpoint_url(endpoint));
        let response = self.get(&url, tokens).await?;
        if !response.status().is_success() {
            return Err(LtcError::Docker(format!(
                "HTTP code {} while fetching image json of {image_id}",
                response.status().as_u16()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| LtcError::Docker(e.to_string()))?;
        Ok(body.to_vec())
    }
}
