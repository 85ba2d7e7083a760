//! In-memory registry and container engine shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use registry_sync::error::{RegistryError, Result};
use registry_sync::registry::{JsonPage, RegistryClient, RegistryTransport};
use registry_sync::sync::{ContainerEngine, StepOutcome, SyncAction, SyncStep};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Answers the v2 read endpoints from a fixed repo → tag → manifest table
pub struct FakeRegistry {
    endpoint: String,
    base_url: String,
    repos: BTreeMap<String, BTreeMap<String, Value>>,
    broken_tag_lists: HashSet<String>,
    broken_manifests: HashSet<(String, String)>,
    broken_catalog: bool,
    page_size: Option<usize>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            base_url: format!("http://{}/v2", endpoint),
            repos: BTreeMap::new(),
            broken_tag_lists: HashSet::new(),
            broken_manifests: HashSet::new(),
            broken_catalog: false,
            page_size: None,
            delay: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add `repo:tag` with a schema 1 manifest for `id` created at `created`
    pub fn image(self, repo: &str, tag: &str, id: &str, created: &str) -> Self {
        self.manifest(repo, tag, schema_v1(repo, tag, id, created))
    }

    pub fn manifest(mut self, repo: &str, tag: &str, manifest: Value) -> Self {
        self.repos
            .entry(repo.to_string())
            .or_default()
            .insert(tag.to_string(), manifest);
        self
    }

    /// Repository listed in the catalog but without tags
    pub fn empty_repo(mut self, repo: &str) -> Self {
        self.repos.entry(repo.to_string()).or_default();
        self
    }

    pub fn broken_tag_list(mut self, repo: &str) -> Self {
        self.repos.entry(repo.to_string()).or_default();
        self.broken_tag_lists.insert(repo.to_string());
        self
    }

    /// The tag is listed but its manifest answers 500
    pub fn broken_manifest(mut self, repo: &str, tag: &str) -> Self {
        self.repos
            .entry(repo.to_string())
            .or_default()
            .insert(tag.to_string(), Value::Null);
        self.broken_manifests.insert((repo.to_string(), tag.to_string()));
        self
    }

    pub fn broken_catalog(mut self) -> Self {
        self.broken_catalog = true;
        self
    }

    pub fn paged(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn into_client(self) -> (Arc<FakeRegistry>, RegistryClient) {
        let registry = Arc::new(self);
        let client = RegistryClient::builder(registry.endpoint.clone())
            .with_transport(registry.clone())
            .build()
            .unwrap();
        (registry, client)
    }

    /// Highest number of requests seen in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<JsonPage> {
        let protocol = |status: u16| RegistryError::RegistryProtocol {
            url: url.to_string(),
            status,
        };
        let path = url.strip_prefix(&self.base_url).ok_or_else(|| protocol(404))?;
        let (path, query) = path.split_once('?').unwrap_or((path, ""));

        if path == "/" {
            return Ok(JsonPage::single(json!({})));
        }

        if path == "/_catalog" {
            if self.broken_catalog {
                return Err(protocol(500));
            }
            let repos: Vec<&String> = self.repos.keys().collect();
            return Ok(self.page(&repos, query, "/_catalog", "repositories"));
        }

        if let Some(repo) = path.strip_prefix('/').and_then(|p| p.strip_suffix("/tags/list")) {
            if self.broken_tag_lists.contains(repo) {
                return Err(protocol(500));
            }
            let tags = self.repos.get(repo).ok_or_else(|| protocol(404))?;
            if tags.is_empty() {
                return Ok(JsonPage::single(json!({ "name": repo, "tags": null })));
            }
            let tags: Vec<&String> = tags.keys().collect();
            let page_path = format!("/{}/tags/list", repo);
            let mut page = self.page(&tags, query, &page_path, "tags");
            page.body["name"] = json!(repo);
            return Ok(page);
        }

        if let Some((repo, tag)) = path
            .strip_prefix('/')
            .and_then(|p| p.rsplit_once("/manifests/"))
        {
            if self.broken_manifests.contains(&(repo.to_string(), tag.to_string())) {
                return Err(protocol(500));
            }
            let manifest = self
                .repos
                .get(repo)
                .and_then(|tags| tags.get(tag))
                .ok_or_else(|| protocol(404))?;
            return Ok(JsonPage::single(manifest.clone()));
        }

        Err(protocol(404))
    }

    fn page(&self, items: &[&String], query: &str, path: &str, field: &str) -> JsonPage {
        let Some(size) = self.page_size else {
            return JsonPage::single(json!({ field: items }));
        };

        let index: usize = query
            .strip_prefix("page=")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let chunk: Vec<&String> = items.iter().skip(index * size).take(size).copied().collect();
        let next = ((index + 1) * size < items.len())
            .then(|| format!("{}{}?page={}", self.base_url, path, index + 1));

        JsonPage {
            body: json!({ field: chunk }),
            next,
        }
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    async fn get_json(&self, url: &str, _accept: Option<&str>) -> Result<JsonPage> {
        self.requests.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.respond(url)
    }
}

pub fn schema_v1(repo: &str, tag: &str, id: &str, created: &str) -> Value {
    let newest = json!({ "id": id, "created": created }).to_string();
    let parent = json!({ "id": format!("{}-parent", id), "created": "2015-01-01T00:00:00Z" })
        .to_string();

    json!({
        "schemaVersion": 1,
        "name": repo,
        "tag": tag,
        "architecture": "amd64",
        "history": [
            { "v1Compatibility": newest },
            { "v1Compatibility": parent }
        ]
    })
}

/// Records every step and fails the ones it is told to
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Vec<String>>>,
    failing: HashSet<(String, SyncAction)>,
}

impl RecordingEngine {
    pub fn failing(mut self, tag: &str, action: SyncAction) -> Self {
        self.failing.insert((tag.to_string(), action));
        self
    }

    /// Engine argument vectors in invocation order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for RecordingEngine {
    async fn execute(&self, step: &SyncStep) -> StepOutcome {
        self.calls.lock().unwrap().push(step.engine_args());
        if self.failing.contains(&(step.tag.clone(), step.action)) {
            StepOutcome::Failed(format!("{} denied", step.action))
        } else {
            StepOutcome::Succeeded
        }
    }

    fn name(&self) -> &str {
        "docker"
    }
}
