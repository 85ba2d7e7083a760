//! Command line interface module
//!
//! Argument parsing, layering of the arguments over the file and environment
//! configuration, and the runner that drives a whole sync.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::{RunReport, Runner};
