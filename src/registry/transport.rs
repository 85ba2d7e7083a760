//! Transport layer for the Docker Registry HTTP API v2
//!
//! The client only ever issues read-only `GET`s that return JSON, so the transport
//! surface is a single call returning the decoded body plus the pagination cursor
//! advertised in the `Link` header.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK};
use serde_json::Value;
use std::time::Duration;

/// One decoded JSON response
#[derive(Debug, Clone)]
pub struct JsonPage {
    pub body: Value,
    /// Absolute URL of the next page, from `Link: <...>; rel="next"`
    pub next: Option<String>,
}

impl JsonPage {
    pub fn single(body: Value) -> Self {
        Self { body, next: None }
    }
}

/// Read-only registry transport
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// `GET` a URL and decode the JSON body.
    ///
    /// Connection failures map to `RegistryUnreachable`, non-2xx statuses to
    /// `RegistryProtocol`, undecodable bodies to `MalformedResponse`.
    async fn get_json(&self, url: &str, accept: Option<&str>) -> Result<JsonPage>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn get_json(&self, url: &str, accept: Option<&str>) -> Result<JsonPage> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, url))?;

        HttpErrorHandler::check_status(url, response.status())?;

        let next = response
            .headers()
            .get(LINK)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_next_link)
            .map(|link| resolve_link(url, &link))
            .transpose()?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, url))?;

        // Schema 1 manifests are served as JWS-signed JSON; the payload is still plain JSON
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::MalformedResponse {
                url: url.to_string(),
                reason: format!("body is not JSON: {}", e),
            }
        })?;

        Ok(JsonPage { body, next })
    }
}

/// Extract the target of the `rel="next"` entry of a `Link` header
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=\"next\"" || param == "rel=next"
        });

        if is_next && target.starts_with('<') && target.ends_with('>') {
            Some(target[1..target.len() - 1].to_string())
        } else {
            None
        }
    })
}

/// Registries return the next-page link relative to the host
fn resolve_link(base: &str, link: &str) -> Result<String> {
    let base = url::Url::parse(base)?;
    Ok(base.join(link)?.to_string())
}
