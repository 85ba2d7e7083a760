//! Sync execution
//!
//! Each winning tag is one unit of work: pull → tag → push run strictly in order and
//! the chain stops at the first failure. The trailing remove is best effort and only
//! runs once something was pulled. Distinct tags run concurrently up to the
//! configured limit and never affect each other.

use crate::error::RegistryError;
use crate::sync::engine::{ContainerEngine, StepOutcome};
use crate::sync::plan::{SyncAction, SyncPlan, SyncStep, TagPlan};
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TagStatus {
    Synced,
    SyncFailed { action: SyncAction, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagOutcome {
    pub repo: String,
    pub tag: String,
    #[serde(flatten)]
    pub status: TagStatus,
    /// Failed cleanup; does not affect `status`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

impl TagOutcome {
    pub fn is_synced(&self) -> bool {
        self.status == TagStatus::Synced
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<TagOutcome>,
}

impl SyncReport {
    pub fn synced_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_synced()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.synced_count()
    }

    pub fn cleanup_warnings(&self) -> impl Iterator<Item = &TagOutcome> {
        self.outcomes.iter().filter(|o| o.cleanup_error.is_some())
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

pub struct SyncExecutor {
    engine: Arc<dyn ContainerEngine>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl SyncExecutor {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }

    /// Number of tags transferred at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every tag of the plan; outcomes come back in plan order
    pub async fn execute(&self, plan: &SyncPlan) -> SyncReport {
        let semaphore = Semaphore::new(self.concurrency);

        let runs = plan.tags.iter().map(|tag_plan| async {
            // The semaphore is never closed, so a failed acquire only means shutdown
            let _permit = semaphore.acquire().await.ok();
            self.run_tag(tag_plan).await
        });

        SyncReport {
            outcomes: join_all(runs).await,
        }
    }

    async fn run_tag(&self, tag_plan: &TagPlan) -> TagOutcome {
        let mut outcome = TagOutcome {
            repo: tag_plan.repo.clone(),
            tag: tag_plan.tag.clone(),
            status: TagStatus::Synced,
            cleanup_error: None,
        };
        let mut pulled = false;
        let mut tagged = false;

        for step in tag_plan.steps.iter().filter(|s| !s.action.is_cleanup()) {
            match self.run_step(step).await {
                StepOutcome::Succeeded => {
                    pulled |= step.action == SyncAction::Pull;
                    tagged |= step.action == SyncAction::Tag;
                }
                StepOutcome::Failed(reason) => {
                    let error = RegistryError::SyncStep {
                        step: step.command_line(self.engine.name()),
                        reason: reason.clone(),
                    };
                    warn!("{}:{}: {}", tag_plan.repo, tag_plan.tag, error);
                    outcome.status = TagStatus::SyncFailed {
                        action: step.action,
                        reason,
                    };
                    break;
                }
            }
        }

        if pulled {
            for step in tag_plan.steps.iter().filter(|s| s.action.is_cleanup()) {
                let step = if tagged { step.clone() } else { step.source_only() };
                if let StepOutcome::Failed(reason) = self.run_step(&step).await {
                    warn!(
                        "{}:{}: cleanup `{}` failed: {}",
                        tag_plan.repo,
                        tag_plan.tag,
                        step.command_line(self.engine.name()),
                        reason
                    );
                    outcome.cleanup_error = Some(reason);
                }
            }
        }

        if outcome.is_synced() {
            info!("{}:{} synced", tag_plan.repo, tag_plan.tag);
        }
        outcome
    }

    async fn run_step(&self, step: &SyncStep) -> StepOutcome {
        if self.cancel.is_cancelled() {
            return StepOutcome::Failed("cancelled".to_string());
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => StepOutcome::Failed("cancelled".to_string()),
            outcome = self.engine.execute(step) => outcome,
        }
    }
}
