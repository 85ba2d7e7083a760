// RegistryClient talks to one registry's `/v2` endpoint: catalog listing, tag listing,
// manifest fetch and fingerprint extraction. It holds no state between calls, so one
// client can be shared by any number of concurrent fetch workers.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use crate::registry::manifest::{Fingerprint, ManifestParser, SchemaV1Parser};
use crate::registry::transport::{HttpTransport, RegistryTransport};
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Media types carrying `history[].v1Compatibility`
pub const SCHEMA_V1_ACCEPT: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws, application/vnd.docker.distribution.manifest.v1+json";

pub struct RegistryClientBuilder {
    endpoint: String,
    scheme: String,
    timeout: Duration,
    transport: Option<Arc<dyn RegistryTransport>>,
    parser: Option<Arc<dyn ManifestParser>>,
}

impl RegistryClientBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            scheme: "http".to_string(),
            timeout: Duration::from_secs(30),
            transport: None,
            parser: None,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ManifestParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        ValidationErrorHandler::validate_endpoint(&self.endpoint)?;

        if self.scheme != "http" && self.scheme != "https" {
            return Err(RegistryError::Validation(format!(
                "Unsupported scheme `{}`: expected http or https",
                self.scheme
            )));
        }

        let base_url = format!("{}://{}/v2", self.scheme, self.endpoint);
        url::Url::parse(&base_url)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.timeout)?),
        };

        Ok(RegistryClient {
            endpoint: self.endpoint,
            base_url,
            transport,
            parser: self.parser.unwrap_or_else(|| Arc::new(SchemaV1Parser)),
        })
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    endpoint: String,
    base_url: String,
    transport: Arc<dyn RegistryTransport>,
    parser: Arc<dyn ManifestParser>,
}

impl RegistryClient {
    pub fn builder(endpoint: impl Into<String>) -> RegistryClientBuilder {
        RegistryClientBuilder::new(endpoint)
    }

    /// `host:port` this client is bound to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /v2/` to confirm the endpoint speaks the v2 API
    pub async fn check_api(&self) -> Result<()> {
        let url = format!("{}/", self.base_url);
        self.transport.get_json(&url, None).await?;
        Ok(())
    }

    /// All repository names, in registry order, following pagination
    pub async fn list_repositories(&self) -> Result<Vec<String>> {
        let url = format!("{}/_catalog", self.base_url);
        let repositories = self.collect_paged(&url, "repositories").await?;
        debug!("{}: {} repositories", self.endpoint, repositories.len());
        Ok(repositories)
    }

    /// All tag names of `repo`, in registry order, following pagination
    pub async fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}/tags/list", self.base_url, repo);
        let tags = self.collect_paged(&url, "tags").await?;
        debug!("{}: {} has {} tags", self.endpoint, repo, tags.len());
        Ok(tags)
    }

    /// Raw manifest document of `repo:tag`
    pub async fn fetch_manifest(&self, repo: &str, tag: &str) -> Result<Value> {
        let url = format!("{}/{}/manifests/{}", self.base_url, repo, tag);
        let page = self.transport.get_json(&url, Some(SCHEMA_V1_ACCEPT)).await?;

        if !page.body.is_object() {
            return Err(RegistryError::MalformedResponse {
                url,
                reason: "manifest is not a JSON object".to_string(),
            });
        }

        Ok(page.body)
    }

    /// Fingerprint of `repo:tag` from its newest history entry
    pub async fn extract_fingerprint(&self, repo: &str, tag: &str) -> Result<Fingerprint> {
        let manifest = self.fetch_manifest(repo, tag).await?;

        self.parser
            .parse(&manifest)
            .map_err(|source| RegistryError::ManifestParse {
                repo: repo.to_string(),
                tag: tag.to_string(),
                source,
            })
    }

    async fn collect_paged(&self, first_url: &str, field: &str) -> Result<Vec<String>> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first_url.to_string());

        while let Some(url) = next.take() {
            visited.insert(url.clone());
            let page = self.transport.get_json(&url, None).await?;
            items.extend(string_array(&page.body, field, &url)?);

            if let Some(link) = page.next {
                if visited.contains(&link) {
                    return Err(RegistryError::MalformedResponse {
                        url,
                        reason: format!("pagination loops back to {}", link),
                    });
                }
                next = Some(link);
            }
        }

        Ok(items)
    }
}

/// Read `body[field]` as a list of strings; `null` counts as empty
fn string_array(body: &Value, field: &str, url: &str) -> Result<Vec<String>> {
    let malformed = |reason: String| RegistryError::MalformedResponse {
        url: url.to_string(),
        reason,
    };

    match body.get(field) {
        None => Err(malformed(format!("missing `{}` field", field))),
        Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed(format!("non-string entry in `{}`", field)))
            })
            .collect(),
        Some(_) => Err(malformed(format!("`{}` is not an array", field))),
    }
}
