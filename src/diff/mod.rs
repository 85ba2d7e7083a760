//! Inventory diff
//!
//! [`diff`] answers, relative to a `local` catalog, which tags local holds the newer
//! (or only) copy of and which it lacks. The comparison is asymmetric:
//! on equal creation timestamps local wins, so `diff(a, b).wins` and
//! `diff(b, a).wins` can overlap.

use crate::inventory::{Catalog, TagMap};
use crate::registry::Fingerprint;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub type TagSets = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// Tags where local is newer, tied, or the only holder
    pub wins: TagSets,
    /// Tags where remote is newer or the only holder
    pub loses: TagSets,
    /// Tags with an undefined fingerprint on either side, or in a repository the
    /// other side could not list; never compared
    pub unresolved: TagSets,
}

impl DiffResult {
    pub fn win_count(&self) -> usize {
        count(&self.wins)
    }

    pub fn lose_count(&self) -> usize {
        count(&self.loses)
    }

    pub fn unresolved_count(&self) -> usize {
        count(&self.unresolved)
    }

    pub fn is_win(&self, repo: &str, tag: &str) -> bool {
        contains(&self.wins, repo, tag)
    }

    pub fn is_loss(&self, repo: &str, tag: &str) -> bool {
        contains(&self.loses, repo, tag)
    }

    /// Winning `(repo, tag)` pairs in repo then tag order
    pub fn winning_tags(&self) -> impl Iterator<Item = (&str, &str)> {
        flatten(&self.wins)
    }

    pub fn losing_tags(&self) -> impl Iterator<Item = (&str, &str)> {
        flatten(&self.loses)
    }
}

#[derive(Clone, Copy)]
enum Verdict {
    Win,
    Lose,
    Unresolved,
}

/// Compare `local` against `remote`. Pure; never fails.
pub fn diff(local: &Catalog, remote: &Catalog) -> DiffResult {
    let mut result = DiffResult::default();

    for (repo, local_tags) in local.repositories() {
        // A repository the other side failed to list is unknown there, not absent
        if remote.is_unlisted(repo) {
            claim_all(&mut result, repo, local_tags, Verdict::Unresolved);
            continue;
        }

        match remote.tags(repo) {
            None => claim_all(&mut result, repo, local_tags, Verdict::Win),
            Some(remote_tags) => {
                for (tag, fingerprint) in local_tags {
                    result.record(repo, tag, compare_tag(fingerprint.as_ref(), remote_tags.get(tag)));
                }
                // Tags only remote has, within a repo both sides know
                for (tag, fingerprint) in remote_tags {
                    if !local_tags.contains_key(tag) {
                        let verdict = if fingerprint.is_some() { Verdict::Lose } else { Verdict::Unresolved };
                        result.record(repo, tag, verdict);
                    }
                }
            }
        }
    }

    for (repo, remote_tags) in remote.repositories() {
        if local.is_unlisted(repo) {
            claim_all(&mut result, repo, remote_tags, Verdict::Unresolved);
        } else if !local.contains_repo(repo) {
            claim_all(&mut result, repo, remote_tags, Verdict::Lose);
        }
    }

    result
}

fn compare_tag(local: Option<&Fingerprint>, remote: Option<&Option<Fingerprint>>) -> Verdict {
    match (local, remote) {
        (None, _) => Verdict::Unresolved,
        (Some(_), None) => Verdict::Win,
        (Some(_), Some(None)) => Verdict::Unresolved,
        (Some(ours), Some(Some(theirs))) => {
            if ours.created_at >= theirs.created_at {
                Verdict::Win
            } else {
                Verdict::Lose
            }
        }
    }
}

/// The only side with data takes every tag it can vouch for
fn claim_all(result: &mut DiffResult, repo: &str, tags: &TagMap, verdict: Verdict) {
    for (tag, fingerprint) in tags {
        let verdict = if fingerprint.is_some() { verdict } else { Verdict::Unresolved };
        result.record(repo, tag, verdict);
    }
}

impl DiffResult {
    fn record(&mut self, repo: &str, tag: &str, verdict: Verdict) {
        let sets = match verdict {
            Verdict::Win => &mut self.wins,
            Verdict::Lose => &mut self.loses,
            Verdict::Unresolved => &mut self.unresolved,
        };
        sets.entry(repo.to_string()).or_default().insert(tag.to_string());
    }
}

fn count(sets: &TagSets) -> usize {
    sets.values().map(BTreeSet::len).sum()
}

fn contains(sets: &TagSets, repo: &str, tag: &str) -> bool {
    sets.get(repo).is_some_and(|tags| tags.contains(tag))
}

fn flatten(sets: &TagSets) -> impl Iterator<Item = (&str, &str)> {
    sets.iter()
        .flat_map(|(repo, tags)| tags.iter().map(move |tag| (repo.as_str(), tag.as_str())))
}
