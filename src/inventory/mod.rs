//! Inventory building
//!
//! [`InventoryBuilder`] drives a [`RegistryClient`] over every repository and tag of a
//! registry and materializes a [`Catalog`]. Tag listing and fingerprint fetches run
//! concurrently, bounded by a semaphore; the catalog is only assembled once every
//! fetch has finished, so a diff never sees a partially built inventory.

pub mod catalog;

pub use catalog::{Catalog, FetchFailure, TagMap};

use crate::error::{RegistryError, Result};
use crate::registry::{Fingerprint, RegistryClient};
use futures::future::try_join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// What a failed repository or tag fetch does to the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Abort the whole build on the first error
    #[default]
    FailFast,
    /// Record the failure, keep going, flag the catalog as incomplete
    FailSoft,
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPolicy::FailFast => write!(f, "fail-fast"),
            FetchPolicy::FailSoft => write!(f, "fail-soft"),
        }
    }
}

impl FromStr for FetchPolicy {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail-fast" => Ok(FetchPolicy::FailFast),
            "fail-soft" => Ok(FetchPolicy::FailSoft),
            other => Err(RegistryError::Validation(format!(
                "Fetch policy must be fail-fast or fail-soft, got `{}`",
                other
            ))),
        }
    }
}

struct RepoInventory {
    repo: String,
    tags: TagMap,
    failures: Vec<FetchFailure>,
}

enum RepoFetch {
    Fetched(RepoInventory),
    Skipped(FetchFailure),
}

pub struct InventoryBuilder {
    client: RegistryClient,
    policy: FetchPolicy,
    concurrency: usize,
    cancel: CancellationToken,
}

impl InventoryBuilder {
    pub fn new(client: RegistryClient) -> Self {
        Self {
            client,
            policy: FetchPolicy::default(),
            concurrency: 4,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Maximum number of registry requests in flight
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// List every repository, every tag and every fingerprint.
    ///
    /// Failing to list the catalog itself is always fatal. Cancellation is always
    /// fatal, whatever the policy.
    pub async fn build(&self) -> Result<Catalog> {
        let endpoint = self.client.endpoint();
        info!("Building inventory of {} ({})", endpoint, self.policy);

        let repos = self.guarded(self.client.list_repositories()).await?;
        let semaphore = Semaphore::new(self.concurrency);

        let fetches = repos.iter().map(|repo| self.fetch_repository_or_skip(repo, &semaphore));
        let fetched = try_join_all(fetches).await?;

        let mut repositories = BTreeMap::new();
        let mut failures = Vec::new();
        for fetch in fetched {
            match fetch {
                RepoFetch::Fetched(inventory) => {
                    failures.extend(inventory.failures);
                    repositories.insert(inventory.repo, inventory.tags);
                }
                RepoFetch::Skipped(failure) => failures.push(failure),
            }
        }

        let catalog = Catalog::new(endpoint, repositories).with_failures(failures);
        info!(
            "Inventory of {}: {} repositories, {} tags{}",
            endpoint,
            catalog.repo_count(),
            catalog.tag_count(),
            if catalog.is_complete() { "" } else { " (incomplete)" }
        );

        Ok(catalog)
    }

    async fn fetch_repository_or_skip(&self, repo: &str, semaphore: &Semaphore) -> Result<RepoFetch> {
        match self.fetch_repository(repo, semaphore).await {
            Ok(inventory) => Ok(RepoFetch::Fetched(inventory)),
            Err(e) if self.tolerates(&e) => {
                warn!("{}: skipping repository {}: {}", self.client.endpoint(), repo, e);
                Ok(RepoFetch::Skipped(FetchFailure {
                    repo: repo.to_string(),
                    tag: None,
                    error: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_repository(&self, repo: &str, semaphore: &Semaphore) -> Result<RepoInventory> {
        let tags = {
            let _permit = acquire(semaphore).await?;
            self.guarded(self.client.list_tags(repo)).await?
        };

        let lookups = tags.iter().map(|tag| async move {
            let _permit = acquire(semaphore).await?;
            let result = self.guarded(self.client.extract_fingerprint(repo, tag)).await;
            self.absorb(repo, tag, result)
        });
        let results = try_join_all(lookups).await?;

        let mut inventory = RepoInventory {
            repo: repo.to_string(),
            tags: TagMap::new(),
            failures: Vec::new(),
        };
        for (tag, outcome) in tags.into_iter().zip(results) {
            match outcome {
                Ok(fingerprint) => {
                    inventory.tags.insert(tag, Some(fingerprint));
                }
                Err(failure) => {
                    inventory.tags.insert(tag, None);
                    inventory.failures.push(failure);
                }
            }
        }

        debug!(
            "{}: {} fetched with {} tags",
            self.client.endpoint(),
            repo,
            inventory.tags.len()
        );
        Ok(inventory)
    }

    /// Under fail-soft, turn a tolerable error into a recorded failure
    fn absorb(
        &self,
        repo: &str,
        tag: &str,
        result: Result<Fingerprint>,
    ) -> Result<std::result::Result<Fingerprint, FetchFailure>> {
        match result {
            Ok(fingerprint) => Ok(Ok(fingerprint)),
            Err(e) if self.tolerates(&e) => {
                warn!("{}: no fingerprint for {}:{}: {}", self.client.endpoint(), repo, tag, e);
                Ok(Err(FetchFailure {
                    repo: repo.to_string(),
                    tag: Some(tag.to_string()),
                    error: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    fn tolerates(&self, error: &RegistryError) -> bool {
        self.policy == FetchPolicy::FailSoft && !matches!(error, RegistryError::Cancelled(_))
    }

    async fn guarded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RegistryError::Cancelled(format!(
                "inventory of {}",
                self.client.endpoint()
            ))),
            result = operation => result,
        }
    }
}

async fn acquire(semaphore: &Semaphore) -> Result<tokio::sync::SemaphorePermit<'_>> {
    semaphore
        .acquire()
        .await
        .map_err(|e| RegistryError::Cancelled(format!("fetch pool closed: {}", e)))
}

/// Build both inventories concurrently; returns only once both are complete
pub async fn build_pair(local: &InventoryBuilder, remote: &InventoryBuilder) -> Result<(Catalog, Catalog)> {
    tokio::try_join!(local.build(), remote.build())
}
