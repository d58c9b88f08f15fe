//! Directory of known registry endpoints
//!
//! Holds the built-in Docker Hub and GitHub Container Registry entries plus any
//! custom registries registered at runtime. Built-in keys can be neither
//! overwritten nor removed.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

pub const DOCKER_HUB_KEY: &str = "dockerhub";
pub const GHCR_KEY: &str = "ghcr";

/// Connection details for one registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEndpoint {
    pub key: String,
    pub name: String,
    /// Base URL of the Distribution API, e.g. `https://registry-1.docker.io`
    pub registry_url: String,
    /// Base URL of the token service; `/token` is appended
    pub auth_url: String,
    /// Value of the `service` query parameter; empty means omitted
    pub service: String,
}

impl RegistryEndpoint {
    pub fn new(
        name: impl Into<String>,
        registry_url: impl Into<String>,
        auth_url: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            key: String::new(),
            name: name.into(),
            registry_url: trim_url(registry_url.into()),
            auth_url: trim_url(auth_url.into()),
            service: service.into(),
        }
    }

    pub fn docker_hub() -> Self {
        Self {
            key: DOCKER_HUB_KEY.to_string(),
            name: "Docker Hub".to_string(),
            registry_url: "https://registry-1.docker.io".to_string(),
            auth_url: "https://auth.docker.io".to_string(),
            service: "registry.docker.io".to_string(),
        }
    }

    pub fn ghcr() -> Self {
        Self {
            key: GHCR_KEY.to_string(),
            name: "GitHub Container Registry".to_string(),
            registry_url: "https://ghcr.io".to_string(),
            auth_url: "https://ghcr.io".to_string(),
            service: String::new(),
        }
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

pub fn is_builtin(key: &str) -> bool {
    key == DOCKER_HUB_KEY || key == GHCR_KEY
}

/// Thread-safe registry table guarded by a single read-write lock
#[derive(Debug)]
pub struct RegistryDirectory {
    entries: RwLock<BTreeMap<String, RegistryEndpoint>>,
}

impl Default for RegistryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryDirectory {
    /// A fresh directory containing only the built-in registries
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(DOCKER_HUB_KEY.to_string(), RegistryEndpoint::docker_hub());
        entries.insert(GHCR_KEY.to_string(), RegistryEndpoint::ghcr());
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// The process-wide directory shared by clients that do not inject their own
    pub fn global() -> Arc<RegistryDirectory> {
        static GLOBAL: OnceLock<Arc<RegistryDirectory>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(RegistryDirectory::new()))
            .clone()
    }

    /// Add a custom registry under `key`.
    ///
    /// The endpoint's `key` is overwritten with `key`; an empty display name
    /// defaults to the key.
    pub fn register(&self, key: &str, mut endpoint: RegistryEndpoint) -> Result<()> {
        if key.is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if is_builtin(key) {
            return Err(RegistryError::ReservedKey(key.to_string()));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(key) {
            return Err(RegistryError::AlreadyExists(key.to_string()));
        }

        endpoint.key = key.to_string();
        if endpoint.name.is_empty() {
            endpoint.name = key.to_string();
        }
        entries.insert(key.to_string(), endpoint);
        Ok(())
    }

    pub fn unregister(&self, key: &str) -> Result<()> {
        if is_builtin(key) {
            return Err(RegistryError::ReservedKey(key.to_string()));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    pub fn lookup(&self, key: &str) -> Result<RegistryEndpoint> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Snapshot of every entry, ordered by key
    pub fn list(&self) -> Vec<RegistryEndpoint> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// First entry accepted by `predicate`, scanning in key order under one read lock
    pub fn find(&self, mut predicate: impl FnMut(&RegistryEndpoint) -> bool) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|endpoint| predicate(endpoint))
            .map(|endpoint| endpoint.key.clone())
    }
}
