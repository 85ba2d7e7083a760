//! Sync of winning tags to the other registry
//!
//! [`plan`] turns the `wins` of a diff into per-tag pull/tag/push/remove steps;
//! [`SyncExecutor`] runs them against a [`ContainerEngine`].

pub mod engine;
pub mod executor;
pub mod plan;

pub use engine::{ContainerEngine, DockerCliEngine, StepOutcome};
pub use executor::{SyncExecutor, SyncReport, TagOutcome, TagStatus};
pub use plan::{SyncAction, SyncPlan, SyncStep, TagPlan, plan, plan_tag};
