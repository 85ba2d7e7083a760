//! Configuration management module
//!
//! Settings come from, lowest precedence first: built-in defaults, an optional JSON
//! config file, `REGISTRY_SYNC_*` environment variables, command-line arguments.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use crate::inventory::FetchPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REGISTRY_PORT: u16 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(RegistryError::Validation(format!(
                "Output format must be one of: text, json (got `{}`)",
                other
            ))),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// `host:port` of the registry whose wins get pushed
    pub local: Option<String>,
    /// `host:port` of the registry receiving the pushes
    pub remote: Option<String>,
    pub scheme: String,
    /// Per HTTP call
    pub timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub sync_concurrency: usize,
    pub fetch_policy: FetchPolicy,
    /// Container engine binary
    pub engine: String,
    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub output: OutputFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local: None,
            remote: None,
            scheme: "http".to_string(),
            timeout_secs: 30,
            fetch_concurrency: 4,
            sync_concurrency: 1,
            fetch_policy: FetchPolicy::FailFast,
            engine: "docker".to_string(),
            dry_run: false,
            verbose: false,
            quiet: false,
            output: OutputFormat::Text,
        }
    }
}

impl SyncConfig {
    /// Load a JSON config file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            RegistryError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("REGISTRY_SYNC_LOCAL") {
            self.local = Some(val);
        }
        if let Some(val) = lookup("REGISTRY_SYNC_REMOTE") {
            self.remote = Some(val);
        }
        if let Some(timeout) = lookup("REGISTRY_SYNC_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.timeout_secs = timeout;
        }
        if let Some(n) = lookup("REGISTRY_SYNC_FETCH_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.fetch_concurrency = n;
        }
        if let Some(n) = lookup("REGISTRY_SYNC_SYNC_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.sync_concurrency = n;
        }
        if let Some(engine) = lookup("REGISTRY_SYNC_ENGINE") {
            self.engine = engine;
        }
        if let Some(val) = lookup("REGISTRY_SYNC_FAIL_SOFT") {
            if is_truthy(&val) {
                self.fetch_policy = FetchPolicy::FailSoft;
            }
        }
        if let Some(val) = lookup("REGISTRY_SYNC_VERBOSE") {
            self.verbose = is_truthy(&val);
        }

        // Local registry defaults to the docker daemon's host
        if self.local.is_none() {
            if let Some(docker_host) = lookup("DOCKER_HOST") {
                self.local = endpoint_from_docker_host(&docker_host, DEFAULT_REGISTRY_PORT);
            }
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        let local = self.local_endpoint()?;
        let remote = self.remote_endpoint()?;

        ValidationErrorHandler::validate_endpoint(local)?;
        ValidationErrorHandler::validate_endpoint(remote)?;

        if local == remote {
            return Err(RegistryError::Validation(format!(
                "Local and remote registry are the same endpoint: {}",
                local
            )));
        }

        if self.scheme != "http" && self.scheme != "https" {
            return Err(RegistryError::Validation(format!(
                "Scheme must be http or https, got `{}`",
                self.scheme
            )));
        }

        ValidationErrorHandler::validate_timeout(self.timeout_secs)?;

        if self.fetch_concurrency == 0 {
            return Err(RegistryError::Validation(
                "fetch_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.sync_concurrency == 0 {
            return Err(RegistryError::Validation(
                "sync_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.engine.trim().is_empty() {
            return Err(RegistryError::Validation(
                "Container engine binary cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn local_endpoint(&self) -> Result<&str> {
        self.local.as_deref().ok_or_else(|| {
            RegistryError::Config(
                "No local registry: pass --local-url or set DOCKER_HOST".to_string(),
            )
        })
    }

    pub fn remote_endpoint(&self) -> Result<&str> {
        self.remote
            .as_deref()
            .ok_or_else(|| RegistryError::Config("Please specify --remote-url".to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `tcp://10.0.0.5:2376` → `10.0.0.5:<port>`
pub fn endpoint_from_docker_host(docker_host: &str, port: u16) -> Option<String> {
    let address = docker_host
        .strip_prefix("tcp://")
        .or_else(|| docker_host.strip_prefix("http://"))
        .or_else(|| docker_host.strip_prefix("https://"))?;

    let host = address
        .split('/')
        .next()
        .map(|hostport| hostport.rsplit_once(':').map_or(hostport, |(host, _)| host))
        .filter(|host| !host.is_empty())?;

    Some(format!("{}:{}", host, port))
}

/// `host[:port]` → `host:port`. An explicit `port` replaces the one in `host`;
/// without either the default registry port is used.
pub fn endpoint(host: &str, port: Option<u16>) -> String {
    let (host, own_port) = match host.rsplit_once(':') {
        Some((name, p)) => match p.parse::<u16>() {
            Ok(p) => (name, Some(p)),
            Err(_) => (host, None),
        },
        None => (host, None),
    };

    format!(
        "{}:{}",
        host,
        port.or(own_port).unwrap_or(DEFAULT_REGISTRY_PORT)
    )
}

fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "yes")
}
