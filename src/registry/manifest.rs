//! Manifest retrieval results

use crate::error::{RegistryError, Result};
use crate::image::ImageSpec;

/// Raw manifest body plus the digest the registry reported for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedManifest {
    /// Response body exactly as served
    pub manifest: String,
    /// `Docker-Content-Digest` header; empty when the registry omitted it
    pub digest: String,
}

/// Outcome for one image of a batch, stored at the image's input position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResult {
    pub image: String,
    pub tag: String,
    pub result: Result<FetchedManifest>,
}

impl ManifestResult {
    pub fn new(spec: &ImageSpec, result: Result<FetchedManifest>) -> Self {
        Self {
            image: spec.image.clone(),
            tag: spec.tag.clone(),
            result,
        }
    }

    pub fn failed(spec: &ImageSpec, error: RegistryError) -> Self {
        Self::new(spec, Err(error))
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn manifest(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|m| m.manifest.as_str())
    }

    pub fn digest(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|m| m.digest.as_str())
    }

    pub fn error(&self) -> Option<&RegistryError> {
        self.result.as_ref().err()
    }
}
