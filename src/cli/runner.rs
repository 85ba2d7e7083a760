//! Run orchestration: inventory both registries, diff, plan, sync, report

use crate::config::{OutputFormat, SyncConfig};
use crate::diff::{DiffResult, diff};
use crate::error::{RegistryError, Result};
use crate::inventory::{Catalog, FetchFailure, InventoryBuilder, build_pair};
use crate::logging::Logger;
use crate::registry::RegistryClient;
use crate::sync::{ContainerEngine, DockerCliEngine, SyncExecutor, SyncReport, plan};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a run produced, serialized as-is for `--output json`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub local: String,
    pub remote: String,
    pub dry_run: bool,
    pub diff: DiffResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub local_failures: Vec<FetchFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remote_failures: Vec<FetchFailure>,
    /// Engine command lines; dry run only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
}

impl RunReport {
    /// 0 when every attempted tag synced, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match &self.sync {
            Some(report) if !report.is_success() => 1,
            _ => 0,
        }
    }
}

pub struct Runner {
    config: SyncConfig,
    logger: Logger,
    local: RegistryClient,
    remote: RegistryClient,
    engine: Arc<dyn ContainerEngine>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        // JSON output owns stdout
        let logger = if config.quiet || config.output == OutputFormat::Json {
            Logger::new_quiet()
        } else {
            Logger::new(config.verbose)
        };

        let local = Self::create_client(&config, config.local_endpoint()?)?;
        let remote = Self::create_client(&config, config.remote_endpoint()?)?;
        let engine = Arc::new(DockerCliEngine::new(config.engine.clone()));

        Ok(Self {
            config,
            logger,
            local,
            remote,
            engine,
            cancel: CancellationToken::new(),
        })
    }

    fn create_client(config: &SyncConfig, endpoint: &str) -> Result<RegistryClient> {
        RegistryClient::builder(endpoint)
            .with_scheme(config.scheme.clone())
            .with_timeout(config.timeout())
            .build()
    }

    /// Replace the HTTP clients, e.g. with ones over a different transport
    pub fn with_clients(mut self, local: RegistryClient, remote: RegistryClient) -> Self {
        self.local = local;
        self.remote = remote;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn ContainerEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Cancelling this token stops in-flight fetches and sync steps
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.logger.section("Registry Sync");
        self.logger.info(&format!(
            "Local: {}  Remote: {}",
            self.local.base_url(),
            self.remote.base_url()
        ));

        self.check_registries().await?;

        let (local, remote) = self.build_inventories().await?;
        let result = diff(&local, &remote);
        self.report_diff(&result);

        let sync_plan = plan(&result.wins, self.local.endpoint(), self.remote.endpoint());
        let mut report = RunReport {
            local: self.local.endpoint().to_string(),
            remote: self.remote.endpoint().to_string(),
            dry_run: self.config.dry_run,
            diff: result,
            local_failures: local.failures().to_vec(),
            remote_failures: remote.failures().to_vec(),
            planned: None,
            sync: None,
        };

        if self.config.dry_run {
            let commands = sync_plan.render(self.engine.name());
            self.logger.list("Sync plan (dry run)", &commands);
            report.planned = Some(commands);
        } else if sync_plan.is_empty() {
            self.logger.success("Remote registry is up to date");
        } else {
            self.logger.subsection(&format!(
                "Syncing {} tag(s) with {}",
                sync_plan.tags.len(),
                self.engine.name()
            ));
            let executor = SyncExecutor::new(self.engine.clone())
                .with_concurrency(self.config.sync_concurrency)
                .with_cancellation(self.cancel.clone());
            let sync_report = executor.execute(&sync_plan).await;
            self.report_sync(&sync_report);
            report.sync = Some(sync_report);
        }

        self.report_skipped(&report);

        if self.config.output == OutputFormat::Json {
            let json = serde_json::to_string_pretty(&report).map_err(|e| {
                RegistryError::Validation(format!("Cannot serialize run report: {}", e))
            })?;
            println!("{}", json);
        }

        Ok(report)
    }

    async fn check_registries(&self) -> Result<()> {
        self.logger.step("Checking registry API");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(RegistryError::Cancelled("registry API check".to_string()));
            }
            result = async { tokio::try_join!(self.local.check_api(), self.remote.check_api()) } => {
                result?;
            }
        }
        self.logger.detail("Both registries answer on /v2/");
        Ok(())
    }

    async fn build_inventories(&self) -> Result<(Catalog, Catalog)> {
        self.logger.step("Building inventories");

        let builder = |client: &RegistryClient| {
            InventoryBuilder::new(client.clone())
                .with_policy(self.config.fetch_policy)
                .with_concurrency(self.config.fetch_concurrency)
                .with_cancellation(self.cancel.clone())
        };
        let (local, remote) = build_pair(&builder(&self.local), &builder(&self.remote)).await?;

        for catalog in [&local, &remote] {
            self.logger.detail(&format!(
                "{}: {} repositories, {} tags",
                catalog.registry(),
                catalog.repo_count(),
                catalog.tag_count()
            ));
            if !catalog.is_complete() {
                self.logger.warning(&format!(
                    "{}: {} fetch(es) failed, affected tags are reported as unresolved",
                    catalog.registry(),
                    catalog.failures().len()
                ));
                for failure in catalog.failures() {
                    let target = match &failure.tag {
                        Some(tag) => format!("{}:{}", failure.repo, tag),
                        None => failure.repo.clone(),
                    };
                    self.logger.detail(&format!("{}: {}", target, failure.error));
                }
            }
        }

        Ok((local, remote))
    }

    fn report_diff(&self, result: &DiffResult) {
        self.logger.summary_kv(
            "Comparison",
            &[
                ("Newer or only on local", result.win_count().to_string()),
                ("Newer or only on remote", result.lose_count().to_string()),
                ("Unresolved", result.unresolved_count().to_string()),
            ],
        );
    }

    fn report_sync(&self, report: &SyncReport) {
        for outcome in &report.outcomes {
            self.logger.tag_outcome(outcome);
        }

        if report.is_success() {
            self.logger.success(&format!(
                "{} tag(s) synced in {}",
                report.synced_count(),
                self.logger.elapsed()
            ));
        } else {
            self.logger.error(&format!(
                "{} of {} tag(s) failed to sync",
                report.failed_count(),
                report.outcomes.len()
            ));
        }
    }

    fn report_skipped(&self, report: &RunReport) {
        let skipped = report.diff.lose_count();
        if skipped > 0 {
            self.logger.warning(&format!(
                "The remote registry holds {} tag(s) newer than or missing from local; they were not synced",
                skipped
            ));
            for (repo, tag) in report.diff.losing_tags() {
                self.logger.detail(&format!("skipped {}:{}", repo, tag));
            }
        }

        let unresolved = report.diff.unresolved_count();
        if unresolved > 0 {
            self.logger.warning(&format!(
                "{} tag(s) could not be compared and were left alone",
                unresolved
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sync: Option<SyncReport>) -> RunReport {
        RunReport {
            local: "a:5000".to_string(),
            remote: "b:5000".to_string(),
            dry_run: sync.is_none(),
            diff: DiffResult::default(),
            local_failures: Vec::new(),
            remote_failures: Vec::new(),
            planned: None,
            sync,
        }
    }

    #[test]
    fn test_exit_code() {
        use crate::sync::{SyncAction, TagOutcome, TagStatus};

        assert_eq!(report(None).exit_code(), 0);
        assert_eq!(report(Some(SyncReport::default())).exit_code(), 0);

        let failed = SyncReport {
            outcomes: vec![TagOutcome {
                repo: "app".to_string(),
                tag: "v1".to_string(),
                status: TagStatus::SyncFailed {
                    action: SyncAction::Push,
                    reason: "denied".to_string(),
                },
                cleanup_error: None,
            }],
        };
        assert_eq!(report(Some(failed)).exit_code(), 1);
    }

    #[test]
    fn test_runner_rejects_invalid_config() {
        let config = SyncConfig {
            local: Some("a:5000".to_string()),
            ..SyncConfig::default()
        };
        assert!(Runner::new(config).is_err());
    }

    #[test]
    fn test_json_report_shape() {
        let json = serde_json::to_value(report(None)).unwrap();
        assert_eq!(json["local"], "a:5000");
        assert!(json.get("sync").is_none());
        assert!(json.get("local_failures").is_none());
        assert!(json["diff"]["wins"].as_object().unwrap().is_empty());
    }
}
