//! Manifest fingerprint extraction
//!
//! Registries describe an image version with a manifest. Schema 1 manifests carry a
//! `history` array whose entries embed the legacy image config as a JSON string
//! (`v1Compatibility`). Entry 0 is the most recently created layer, so its `id` and
//! `created` identify the image and its age.

use crate::error::ManifestError;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image identity and creation time of the newest history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub image_id: String,
    /// Unix seconds
    pub created_at: i64,
}

impl Fingerprint {
    pub fn new(image_id: impl Into<String>, created_at: i64) -> Self {
        Self {
            image_id: image_id.into(),
            created_at,
        }
    }
}

/// Turns a raw manifest document into a fingerprint.
///
/// The manifest layout is registry-version specific, so the client takes the parser
/// as a pluggable component.
pub trait ManifestParser: Send + Sync {
    fn parse(&self, manifest: &Value) -> Result<Fingerprint, ManifestError>;
}

/// Docker image manifest schema 1 (`history[0].v1Compatibility`)
#[derive(Debug, Default, Clone)]
pub struct SchemaV1Parser;

#[derive(Deserialize)]
struct CompatibilityBlob {
    id: Option<String>,
    created: Option<String>,
}

impl ManifestParser for SchemaV1Parser {
    fn parse(&self, manifest: &Value) -> Result<Fingerprint, ManifestError> {
        let history = manifest
            .get("history")
            .and_then(Value::as_array)
            .ok_or(ManifestError::MissingHistory)?;

        let newest = history.first().ok_or(ManifestError::EmptyHistory)?;

        let raw = newest
            .get("v1Compatibility")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingCompatibility)?;

        // Only `id` and `created` are read
        let blob: CompatibilityBlob = serde_json::from_str(raw)?;

        let image_id = blob
            .id
            .filter(|id| !id.is_empty())
            .ok_or(ManifestError::MissingField("id"))?;
        let created = blob.created.ok_or(ManifestError::MissingField("created"))?;

        Ok(Fingerprint {
            image_id,
            created_at: parse_created(&created)?,
        })
    }
}

/// Parse a `created` timestamp into Unix seconds.
///
/// Docker writes RFC 3339 with nanoseconds (`2016-01-18T14:23:51.123456789Z`); some
/// builders omit the offset, in which case UTC is assumed.
pub fn parse_created(created: &str) -> Result<i64, ManifestError> {
    let trimmed = created.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.timestamp());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc().timestamp());
        }
    }

    Err(ManifestError::InvalidTimestamp(created.to_string()))
}
