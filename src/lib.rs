//! Docker Manifest Client Library
//!
//! Fetches image manifests and their content digests from Docker Hub, GHCR and
//! any other registry speaking the Docker Registry HTTP API v2. Registries are
//! described by a shared [`registry::RegistryDirectory`]; credentials live per
//! client. Batches of images are grouped per registry so each group can share a
//! single multi-scope bearer token.

pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;

pub use config::{BatchOptions, ClientConfig};
pub use error::{ErrorKind, RegistryError, Result};
pub use image::ImageSpec;
pub use logging::Logger;
pub use registry::{ManifestResult, RegistryClient, RegistryClientBuilder};
