//! Standardized mapping of HTTP and network failures onto `RegistryError`

use crate::error::{RegistryError, Result};
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Any non-2xx status is a protocol error carrying the URL and status
    pub fn check_status(url: &str, status: StatusCode) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(RegistryError::RegistryProtocol {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    /// Short hint for the statuses a registry commonly returns
    pub fn describe_status(status: u16) -> &'static str {
        match status {
            401 => "authentication required (not supported)",
            403 => "access denied",
            404 => "repository or tag not found",
            429 => "rate limited",
            500 => "registry server error",
            502 | 503 => "registry unavailable",
            _ => "unexpected status",
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize a reqwest failure that happened before a status was received
    pub fn handle_network_error(error: &reqwest::Error, url: &str) -> RegistryError {
        let reason = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else if error.to_string().contains("dns") {
            format!("DNS resolution failed: {}", error)
        } else {
            format!("network error: {}", error)
        };

        RegistryError::RegistryUnreachable {
            url: url.to_string(),
            reason,
        }
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// Endpoints are `host:port` (or bare `host`), never a full URL or path
    pub fn validate_endpoint(endpoint: &str) -> Result<()> {
        if endpoint.is_empty() {
            return Err(RegistryError::Validation(
                "Registry endpoint cannot be empty".to_string(),
            ));
        }

        if endpoint.contains("://") || endpoint.contains('/') {
            return Err(RegistryError::Validation(format!(
                "Registry endpoint must be host:port without scheme or path: {}",
                endpoint
            )));
        }

        if let Some((host, port)) = endpoint.rsplit_once(':') {
            if host.is_empty() {
                return Err(RegistryError::Validation(format!(
                    "Registry endpoint has no host: {}",
                    endpoint
                )));
            }
            if port.parse::<u16>().is_err() {
                return Err(RegistryError::Validation(format!(
                    "Invalid port in registry endpoint: {}",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    pub fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(RegistryError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if timeout > 86400 {
            return Err(RegistryError::Validation(
                "Timeout cannot exceed 24 hours (86400 seconds)".to_string(),
            ));
        }

        Ok(())
    }
}
