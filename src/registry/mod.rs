//! Registry module for Docker Registry HTTP API v2 interactions
//!
//! This module provides the read-only client used to inventory a registry: catalog and
//! tag listing, manifest fetch and fingerprint extraction. Authentication is not
//! supported; registries are addressed as plain `host:port` endpoints.

pub mod client;
pub mod manifest;
pub mod transport;

pub use client::{RegistryClient, RegistryClientBuilder};
pub use manifest::{Fingerprint, ManifestParser, SchemaV1Parser};
pub use transport::{HttpTransport, JsonPage, RegistryTransport};
