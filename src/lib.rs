//! Registry Sync Library
//!
//! Compares the inventories of two Docker registries tag by tag and copies the tags
//! the local registry holds the newer copy of over to the remote one.

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod registry;
pub mod sync;

pub use config::SyncConfig;
pub use diff::{DiffResult, diff};
pub use error::{RegistryError, Result};
pub use inventory::{Catalog, FetchPolicy, InventoryBuilder};
pub use logging::Logger;
pub use registry::{Fingerprint, RegistryClient};
pub use sync::{SyncExecutor, SyncPlan, plan};
