//! Per-client credential storage keyed by registry key (or bare domain)

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Username/token pair presented to a token service via HTTP Basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub token: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Empty usernames or tokens are treated as no credential at all
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && !self.token.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(credentials: HashMap<String, Credential>) -> Self {
        Self {
            credentials: RwLock::new(credentials),
        }
    }

    /// Add or replace the credential for `key`
    pub fn set(&self, key: &str, username: &str, token: &str) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Credential::new(username, token));
    }

    pub fn get(&self, key: &str) -> Option<Credential> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Credential for `key` only if it can actually be sent
    pub fn usable(&self, key: &str) -> Option<Credential> {
        self.get(key).filter(Credential::is_usable)
    }

    pub fn remove(&self, key: &str) -> Option<Credential> {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn len(&self) -> usize {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let store = CredentialStore::new();
        store.set("dockerhub", "first", "token-1");
        store.set("dockerhub", "second", "token-2");
        assert_eq!(store.get("dockerhub"), Some(Credential::new("second", "token-2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = CredentialStore::new();
        store.set("ghcr", "octocat", "ghp_x");
        assert!(store.remove("ghcr").is_some());
        assert!(store.get("ghcr").is_none());
        assert!(store.remove("ghcr").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_parts_are_not_usable() {
        let store = CredentialStore::new();
        store.set("dockerhub", "", "token");
        store.set("quay.io", "robot", "");
        assert!(store.get("dockerhub").is_some());
        assert!(store.usable("dockerhub").is_none());
        assert!(store.usable("quay.io").is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", Credential::new("user", "super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("user"));
    }
}
