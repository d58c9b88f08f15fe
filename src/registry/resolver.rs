//! Registry detection and image-name normalization
//!
//! Detection is a best-effort heuristic over string prefixes rather than a
//! strict reference parser: the first path segment of an image is treated as a
//! registry domain when it contains a dot, and is matched against each
//! directory entry's registry URL through a [`DomainMatcher`].

use crate::registry::directory::{DOCKER_HUB_KEY, GHCR_KEY, RegistryDirectory, RegistryEndpoint};
use std::fmt;
use std::sync::Arc;

/// Host prefix of GitHub Container Registry image references
pub const GHCR_PREFIX: &str = "ghcr.io/";

/// Decides whether a directory entry serves a domain taken from an image name
pub trait DomainMatcher: Send + Sync + fmt::Debug {
    fn matches(&self, endpoint: &RegistryEndpoint, domain: &str) -> bool;
}

/// Substring test against the registry URL.
///
/// Loose: `example.com` also matches `https://registry.example.com.cn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainsMatcher;

impl DomainMatcher for ContainsMatcher {
    fn matches(&self, endpoint: &RegistryEndpoint, domain: &str) -> bool {
        endpoint.registry_url.contains(domain)
    }
}

/// Exact comparison of the registry URL's host (and port) with the domain
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactHostMatcher;

impl DomainMatcher for ExactHostMatcher {
    fn matches(&self, endpoint: &RegistryEndpoint, domain: &str) -> bool {
        extract_domain(&endpoint.registry_url).eq_ignore_ascii_case(domain)
    }
}

/// Where an image's manifest should be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryTarget {
    /// A directory entry
    Registered(String),
    /// A domain-qualified image with no directory entry; reached through challenge discovery
    Unregistered { domain: String },
}

impl RegistryTarget {
    /// Key used to partition images into sub-groups
    pub fn group_key(&self) -> String {
        match self {
            RegistryTarget::Registered(key) => key.clone(),
            RegistryTarget::Unregistered { domain } => format!("custom:{}", domain),
        }
    }

    pub fn registry_key(&self) -> Option<&str> {
        match self {
            RegistryTarget::Registered(key) => Some(key),
            RegistryTarget::Unregistered { .. } => None,
        }
    }
}

/// Resolves image references against a [`RegistryDirectory`]
#[derive(Debug, Clone)]
pub struct Resolver {
    directory: Arc<RegistryDirectory>,
    matcher: Arc<dyn DomainMatcher>,
}

impl Resolver {
    pub fn new(directory: Arc<RegistryDirectory>) -> Self {
        Self::with_matcher(directory, Arc::new(ContainsMatcher))
    }

    pub fn with_matcher(directory: Arc<RegistryDirectory>, matcher: Arc<dyn DomainMatcher>) -> Self {
        Self { directory, matcher }
    }

    pub fn directory(&self) -> &Arc<RegistryDirectory> {
        &self.directory
    }

    /// Registry key for `image`, defaulting to Docker Hub when nothing matches
    pub fn detect_registry(&self, image: &str) -> String {
        match self.resolve(image) {
            RegistryTarget::Registered(key) => key,
            RegistryTarget::Unregistered { .. } => DOCKER_HUB_KEY.to_string(),
        }
    }

    /// Like [`Resolver::detect_registry`], but keeps domain-qualified images
    /// that match no entry apart from Docker Hub.
    pub fn resolve(&self, image: &str) -> RegistryTarget {
        if image.starts_with(GHCR_PREFIX) {
            return RegistryTarget::Registered(GHCR_KEY.to_string());
        }

        let Some(domain) = domain_prefix(image) else {
            return RegistryTarget::Registered(DOCKER_HUB_KEY.to_string());
        };

        match self
            .directory
            .find(|endpoint| self.matcher.matches(endpoint, domain))
        {
            Some(key) => RegistryTarget::Registered(key),
            None => RegistryTarget::Unregistered {
                domain: domain.to_string(),
            },
        }
    }
}

/// Repository path for `image` in the URL scheme of registry `registry_key`
pub fn normalize_image_name(image: &str, registry_key: &str) -> String {
    match registry_key {
        DOCKER_HUB_KEY => {
            if image.contains('/') {
                image.to_string()
            } else {
                format!("library/{}", image)
            }
        }
        GHCR_KEY => image.strip_prefix(GHCR_PREFIX).unwrap_or(image).to_string(),
        _ => strip_domain(image).to_string(),
    }
}

/// Drop a leading `domain/` segment when the first segment looks like a host
pub fn strip_domain(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, rest)) if first.contains('.') => rest,
        _ => image,
    }
}

/// First path segment of `image` when it contains a dot
pub fn domain_prefix(image: &str) -> Option<&str> {
    image
        .split_once('/')
        .map(|(first, _)| first)
        .filter(|first| first.contains('.'))
}

/// Host (and port) of a URL string, without scheme or path
pub fn extract_domain(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(RegistryDirectory::new()))
    }

    #[test]
    fn test_normalize_docker_hub() {
        assert_eq!(normalize_image_name("nginx", DOCKER_HUB_KEY), "library/nginx");
        assert_eq!(normalize_image_name("library/nginx", DOCKER_HUB_KEY), "library/nginx");
        assert_eq!(normalize_image_name("bitnami/redis", DOCKER_HUB_KEY), "bitnami/redis");
    }

    #[test]
    fn test_normalize_ghcr_and_custom() {
        assert_eq!(normalize_image_name("ghcr.io/o/r", GHCR_KEY), "o/r");
        assert_eq!(normalize_image_name("myhost.example.com/a/b", "custom"), "a/b");
        assert_eq!(normalize_image_name("team/app", "custom"), "team/app");
    }

    #[test]
    fn test_normalize_is_idempotent_for_same_input() {
        for (image, key) in [("nginx", DOCKER_HUB_KEY), ("ghcr.io/o/r", GHCR_KEY)] {
            assert_eq!(normalize_image_name(image, key), normalize_image_name(image, key));
        }
    }

    #[test]
    fn test_detect_builtins() {
        let resolver = resolver();
        assert_eq!(resolver.detect_registry("ghcr.io/o/r"), GHCR_KEY);
        assert_eq!(resolver.detect_registry("nginx"), DOCKER_HUB_KEY);
        assert_eq!(resolver.detect_registry("bitnami/redis"), DOCKER_HUB_KEY);
        assert_eq!(resolver.detect_registry("docker.io/library/nginx"), DOCKER_HUB_KEY);
    }

    #[test]
    fn test_detect_custom_registry() {
        let resolver = resolver();
        resolver
            .directory()
            .register(
                "corp",
                RegistryEndpoint::new(
                    "Corp",
                    "https://registry.corp.example.com",
                    "https://auth.corp.example.com",
                    "corp",
                ),
            )
            .unwrap();

        assert_eq!(resolver.detect_registry("registry.corp.example.com/team/app"), "corp");
        assert_eq!(
            resolver.resolve("registry.corp.example.com/team/app"),
            RegistryTarget::Registered("corp".to_string())
        );
    }

    #[test]
    fn test_unknown_domain_is_unregistered_but_detects_as_docker_hub() {
        let resolver = resolver();
        assert_eq!(resolver.detect_registry("quay.io/prometheus/prometheus"), DOCKER_HUB_KEY);
        assert_eq!(
            resolver.resolve("quay.io/prometheus/prometheus"),
            RegistryTarget::Unregistered {
                domain: "quay.io".to_string()
            }
        );
        assert_eq!(
            resolver.resolve("quay.io/prometheus/prometheus").group_key(),
            "custom:quay.io"
        );
    }

    #[test]
    fn test_contains_matcher_is_looser_than_exact() {
        let endpoint = RegistryEndpoint::new(
            "Mirror",
            "https://registry.example.com.cn",
            "https://registry.example.com.cn",
            "",
        );
        assert!(ContainsMatcher.matches(&endpoint, "example.com"));
        assert!(!ExactHostMatcher.matches(&endpoint, "example.com"));
        assert!(ExactHostMatcher.matches(&endpoint, "registry.example.com.cn"));
    }

    #[test]
    fn test_exact_matcher_can_be_substituted() {
        let directory = Arc::new(RegistryDirectory::new());
        directory
            .register(
                "mirror",
                RegistryEndpoint::new("Mirror", "https://registry.example.com.cn", "https://registry.example.com.cn", ""),
            )
            .unwrap();

        let loose = Resolver::new(directory.clone());
        let strict = Resolver::with_matcher(directory, Arc::new(ExactHostMatcher));
        assert_eq!(loose.detect_registry("example.com/a/b"), "mirror");
        assert_eq!(
            strict.resolve("example.com/a/b"),
            RegistryTarget::Unregistered {
                domain: "example.com".to_string()
            }
        );
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://ghcr.io"), "ghcr.io");
        assert_eq!(extract_domain("http://localhost:5000/v2/"), "localhost:5000");
        assert_eq!(extract_domain("quay.io"), "quay.io");
    }
}
