//! Container engine capability
//!
//! Image transfer is delegated to an external engine. The executor only needs one
//! call, so the engine is a single-method trait; the docker CLI is the default.

use crate::sync::plan::SyncStep;
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn execute(&self, step: &SyncStep) -> StepOutcome;

    /// Binary name used when rendering commands
    fn name(&self) -> &str;
}

/// Runs `<binary> <args>` (docker, podman, nerdctl ...) as a subprocess
#[derive(Debug, Clone)]
pub struct DockerCliEngine {
    binary: String,
}

impl DockerCliEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerCliEngine {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerEngine for DockerCliEngine {
    async fn execute(&self, step: &SyncStep) -> StepOutcome {
        debug!("Running {}", step.command_line(&self.binary));

        let output = Command::new(&self.binary)
            .args(step.engine_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => StepOutcome::Succeeded,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    StepOutcome::Failed(format!("{} exited with {}", self.binary, output.status))
                } else {
                    StepOutcome::Failed(stderr.to_string())
                }
            }
            Err(e) => StepOutcome::Failed(format!("failed to run {}: {}", self.binary, e)),
        }
    }

    fn name(&self) -> &str {
        &self.binary
    }
}
