//! Command-line argument parsing

use crate::config::{OutputFormat, SyncConfig, endpoint};
use crate::error::Result;
use crate::inventory::FetchPolicy;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "registry-sync")]
#[command(about = "Compare two Docker registries tag by tag and push the newer images across")]
#[command(version)]
pub struct Args {
    /// Local registry host
    #[arg(
        long = "local-url",
        help = "Host of the local registry (default: host of $DOCKER_HOST)"
    )]
    pub local_url: Option<String>,

    #[arg(long = "local-port", help = "Port of the local registry [default: 5000]")]
    pub local_port: Option<u16>,

    /// Remote registry host
    #[arg(long = "remote-url", help = "Host of the remote registry")]
    pub remote_url: Option<String>,

    #[arg(long = "remote-port", help = "Port of the remote registry [default: 5000]")]
    pub remote_port: Option<u16>,

    /// Dry run mode (print the plan without touching the container engine)
    #[arg(
        long = "dry-run",
        short = 'n',
        help = "Print the sync commands instead of running them"
    )]
    pub dry_run: bool,

    #[arg(
        long = "fail-soft",
        help = "Skip tags whose metadata cannot be fetched instead of aborting"
    )]
    pub fail_soft: bool,

    #[arg(
        long = "fetch-concurrency",
        short = 'j',
        help = "Concurrent registry requests per registry [default: 4]"
    )]
    pub fetch_concurrency: Option<usize>,

    #[arg(
        long = "sync-concurrency",
        help = "Tags transferred concurrently [default: 1]"
    )]
    pub sync_concurrency: Option<usize>,

    #[arg(
        long = "timeout",
        short = 't',
        help = "Timeout per registry request in seconds [default: 30]"
    )]
    pub timeout: Option<u64>,

    #[arg(long = "engine", help = "Container engine binary [default: docker]")]
    pub engine: Option<String>,

    #[arg(long = "https", help = "Talk to both registries over HTTPS")]
    pub https: bool,

    #[arg(long = "output", short = 'o', help = "Output format: text, json")]
    pub output: Option<String>,

    #[arg(long = "config", short = 'c', help = "Path to a JSON configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long = "quiet", short = 'q', help = "Only print errors")]
    pub quiet: bool,

    #[arg(
        long = "loglevel",
        short = 'L',
        default_value = "warn",
        help = "Diagnostic log level: error, warn, info, debug, trace"
    )]
    pub log_level: String,

    #[arg(
        long = "logfile",
        short = 'f',
        help = "Write diagnostic logs to this file instead of stderr"
    )]
    pub logfile: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Defaults, then config file, then environment, then these arguments
    pub fn resolve_config(&self) -> Result<SyncConfig> {
        let base = match &self.config {
            Some(path) => SyncConfig::from_file(path)?,
            None => SyncConfig::default(),
        };

        self.apply(base.with_env())
    }

    /// Overlay the explicitly given arguments on `config`
    pub fn apply(&self, mut config: SyncConfig) -> Result<SyncConfig> {
        config.local = overlay_endpoint(
            self.local_url.as_deref(),
            self.local_port,
            config.local.take(),
        );
        config.remote = overlay_endpoint(
            self.remote_url.as_deref(),
            self.remote_port,
            config.remote.take(),
        );

        if self.dry_run {
            config.dry_run = true;
        }
        if self.fail_soft {
            config.fetch_policy = FetchPolicy::FailSoft;
        }
        if let Some(n) = self.fetch_concurrency {
            config.fetch_concurrency = n;
        }
        if let Some(n) = self.sync_concurrency {
            config.sync_concurrency = n;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(engine) = &self.engine {
            config.engine = engine.clone();
        }
        if self.https {
            config.scheme = "https".to_string();
        }
        if let Some(output) = &self.output {
            config.output = output.parse::<OutputFormat>()?;
        }
        if self.verbose {
            config.verbose = true;
        }
        if self.quiet {
            config.quiet = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Filter for env_logger when RUST_LOG is unset
    pub fn log_filter(&self) -> String {
        if self.verbose && self.log_level == "warn" {
            "debug".to_string()
        } else {
            self.log_level.to_lowercase()
        }
    }

    /// Print usage examples
    pub fn print_examples() {
        println!("Examples:");
        println!("  # Compare and sync the local registry into a mirror");
        println!("  registry-sync --local-url localhost --remote-url mirror.internal");
        println!();
        println!("  # Only print the docker commands that would run");
        println!("  registry-sync --local-url localhost --remote-url mirror.internal --dry-run");
        println!();
        println!("  # Local registry taken from $DOCKER_HOST, custom ports, JSON report");
        println!("  export DOCKER_HOST=tcp://10.0.0.5:2376");
        println!("  registry-sync --local-port 5001 --remote-url mirror --remote-port 443 --https -o json");
    }
}

/// A given host replaces the configured one; a port alone re-targets the
/// configured host (from the config file, the environment or `$DOCKER_HOST`)
fn overlay_endpoint(
    host: Option<&str>,
    port: Option<u16>,
    configured: Option<String>,
) -> Option<String> {
    match (host, configured) {
        (Some(host), _) => Some(endpoint(host, port)),
        (None, Some(configured)) if port.is_some() => Some(endpoint(&configured, port)),
        (None, configured) => configured,
    }
}
