//! Error types for registry inventory and sync operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Connection refused, DNS failure or timeout
    #[error("Registry unreachable at {url}: {reason}")]
    RegistryUnreachable { url: String, reason: String },

    /// Registry answered with a non-success status
    #[error(
        "Registry protocol error: {url} returned HTTP {status} ({})",
        handlers::HttpErrorHandler::describe_status(*.status)
    )]
    RegistryProtocol { url: String, status: u16 },

    /// Success status but the body is not what the API promises
    #[error("Malformed registry response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Cannot derive fingerprint for {repo}:{tag}: {source}")]
    ManifestParse {
        repo: String,
        tag: String,
        #[source]
        source: ManifestError,
    },

    /// External container engine invocation failed
    #[error("Sync step `{step}` failed: {reason}")]
    SyncStep { step: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Transport and protocol failures, as opposed to data or local errors
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            RegistryError::RegistryUnreachable { .. } | RegistryError::RegistryProtocol { .. }
        )
    }
}

/// Reasons a manifest cannot yield a fingerprint
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest has no `history` array")]
    MissingHistory,
    #[error("manifest `history` is empty")]
    EmptyHistory,
    #[error("history entry has no `v1Compatibility` string")]
    MissingCompatibility,
    #[error("`v1Compatibility` is not valid JSON: {0}")]
    MalformedCompatibility(#[from] serde_json::Error),
    #[error("compatibility blob is missing `{0}`")]
    MissingField(&'static str),
    #[error("unparsable `created` timestamp `{0}`")]
    InvalidTimestamp(String),
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Config(err.to_string())
    }
}
