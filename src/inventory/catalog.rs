//! Immutable repo → tag → fingerprint snapshot of one registry

use crate::registry::Fingerprint;
use serde::Serialize;
use std::collections::BTreeMap;

/// Tags of one repository. `None` marks a tag whose fingerprint could not be
/// derived (only produced under the fail-soft policy).
pub type TagMap = BTreeMap<String, Option<Fingerprint>>;

/// A fetch that did not make it into the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub repo: String,
    /// `None` when the repository's tag listing itself failed
    pub tag: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    registry: String,
    repositories: BTreeMap<String, TagMap>,
    failures: Vec<FetchFailure>,
}

impl Catalog {
    pub fn new(registry: impl Into<String>, repositories: BTreeMap<String, TagMap>) -> Self {
        Self {
            registry: registry.into(),
            repositories,
            failures: Vec::new(),
        }
    }

    /// Catalog with every listed tag fingerprinted
    pub fn from_fingerprints<I, R, T>(registry: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (R, T, Fingerprint)>,
        R: Into<String>,
        T: Into<String>,
    {
        let mut repositories: BTreeMap<String, TagMap> = BTreeMap::new();
        for (repo, tag, fingerprint) in entries {
            repositories
                .entry(repo.into())
                .or_default()
                .insert(tag.into(), Some(fingerprint));
        }
        Self::new(registry, repositories)
    }

    pub(crate) fn with_failures(mut self, failures: Vec<FetchFailure>) -> Self {
        self.failures = failures;
        self
    }

    /// Endpoint the snapshot was taken from
    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repositories(&self) -> &BTreeMap<String, TagMap> {
        &self.repositories
    }

    pub fn tags(&self, repo: &str) -> Option<&TagMap> {
        self.repositories.get(repo)
    }

    pub fn contains_repo(&self, repo: &str) -> bool {
        self.repositories.contains_key(repo)
    }

    /// `None` if the tag is absent or its fingerprint is undefined
    pub fn fingerprint(&self, repo: &str, tag: &str) -> Option<&Fingerprint> {
        self.repositories.get(repo)?.get(tag)?.as_ref()
    }

    pub fn repo_count(&self) -> usize {
        self.repositories.len()
    }

    pub fn tag_count(&self) -> usize {
        self.repositories.values().map(BTreeMap::len).sum()
    }

    /// True when a fail-soft build could not list the tags of `repo`
    pub fn is_unlisted(&self, repo: &str) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.repo == repo && failure.tag.is_none())
    }

    pub fn failures(&self) -> &[FetchFailure] {
        &self.failures
    }

    /// False when a fail-soft build skipped or could not fingerprint something
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
