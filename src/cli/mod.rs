//! Command line interface module
//!
//! Argument parsing, credential/registry flag parsing and the runner that
//! prints manifests to stdout and progress to stderr.

pub mod args;
pub mod config;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
