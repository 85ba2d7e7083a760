//! Sync planning: winning tags → ordered transfer steps

use crate::diff::TagSets;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Pull,
    Tag,
    Push,
    Remove,
    /// Cleanup after a failed retag: only the pulled source reference exists
    #[serde(rename = "remove-source")]
    RemoveSource,
}

impl SyncAction {
    /// Per-tag execution order
    pub const ORDER: [SyncAction; 4] = [
        SyncAction::Pull,
        SyncAction::Tag,
        SyncAction::Push,
        SyncAction::Remove,
    ];

    /// Cleanup steps may fail without failing the tag
    pub fn is_cleanup(self) -> bool {
        matches!(self, SyncAction::Remove | SyncAction::RemoveSource)
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncAction::Pull => "pull",
            SyncAction::Tag => "tag",
            SyncAction::Push => "push",
            SyncAction::Remove => "remove",
            SyncAction::RemoveSource => "remove-source",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStep {
    pub repo: String,
    pub tag: String,
    pub action: SyncAction,
    pub source_registry: String,
    pub dest_registry: String,
}

impl SyncStep {
    /// `source/repo:tag`
    pub fn source_ref(&self) -> String {
        image_ref(&self.source_registry, &self.repo, &self.tag)
    }

    /// `dest/repo:tag`
    pub fn dest_ref(&self) -> String {
        image_ref(&self.dest_registry, &self.repo, &self.tag)
    }

    /// Container engine arguments for this step.
    ///
    /// Dry runs render exactly these, so a rendered plan matches what gets executed.
    pub fn engine_args(&self) -> Vec<String> {
        match self.action {
            SyncAction::Pull => vec!["pull".to_string(), self.source_ref()],
            SyncAction::Tag => vec!["tag".to_string(), self.source_ref(), self.dest_ref()],
            SyncAction::Push => vec!["push".to_string(), self.dest_ref()],
            // The retag left a second local reference behind; drop both
            SyncAction::Remove => vec!["rmi".to_string(), self.source_ref(), self.dest_ref()],
            SyncAction::RemoveSource => vec!["rmi".to_string(), self.source_ref()],
        }
    }

    /// The cleanup to run when the retag never happened
    pub fn source_only(&self) -> SyncStep {
        let action = match self.action {
            SyncAction::Remove => SyncAction::RemoveSource,
            other => other,
        };
        SyncStep {
            action,
            ..self.clone()
        }
    }

    pub fn command_line(&self, engine: &str) -> String {
        let mut parts = vec![engine.to_string()];
        parts.extend(self.engine_args());
        parts.join(" ")
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.engine_args()[1..].join(" "))
    }
}

pub fn image_ref(registry: &str, repo: &str, tag: &str) -> String {
    format!("{}/{}:{}", registry, repo, tag)
}

/// Steps for one winning tag, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagPlan {
    pub repo: String,
    pub tag: String,
    pub steps: Vec<SyncStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub source_registry: String,
    pub dest_registry: String,
    pub tags: Vec<TagPlan>,
}

impl SyncPlan {
    /// Every step of every tag, tag by tag
    pub fn steps(&self) -> impl Iterator<Item = &SyncStep> {
        self.tags.iter().flat_map(|plan| plan.steps.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Render the plan as engine command lines
    pub fn render(&self, engine: &str) -> Vec<String> {
        self.steps().map(|step| step.command_line(engine)).collect()
    }
}

/// Plan the transfer of each winning tag from `source` to `dest`
pub fn plan(wins: &TagSets, source: &str, dest: &str) -> SyncPlan {
    let tags = wins
        .iter()
        .flat_map(|(repo, tags)| tags.iter().map(move |tag| (repo, tag)))
        .map(|(repo, tag)| plan_tag(repo, tag, source, dest))
        .collect();

    SyncPlan {
        source_registry: source.to_string(),
        dest_registry: dest.to_string(),
        tags,
    }
}

pub fn plan_tag(repo: &str, tag: &str, source: &str, dest: &str) -> TagPlan {
    let steps = SyncAction::ORDER
        .iter()
        .map(|action| SyncStep {
            repo: repo.to_string(),
            tag: tag.to_string(),
            action: *action,
            source_registry: source.to_string(),
            dest_registry: dest.to_string(),
        })
        .collect();

    TagPlan {
        repo: repo.to_string(),
        tag: tag.to_string(),
        steps,
    }
}
