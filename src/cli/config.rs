//! Parsing of credential and registry flags into typed values

use crate::error::{RegistryError, Result};
use crate::registry::credentials::Credential;
use crate::registry::directory::RegistryEndpoint;

/// Parse `registry:username:token`.
///
/// Only the first two colons separate fields, so tokens may contain `:`.
pub fn parse_credential_flag(value: &str) -> Result<(String, Credential)> {
    let mut parts = value.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(username), Some(token)) if !key.is_empty() => {
            Ok((key.to_string(), Credential::new(username, token)))
        }
        _ => Err(RegistryError::Configuration(format!(
            "Invalid credentials '{}', expected registry:username:token",
            redact(value)
        ))),
    }
}

/// Parse `key=REGISTRY_URL[,AUTH_URL[,SERVICE]]`.
///
/// The auth URL defaults to the registry URL and the service to none. URLs
/// without a scheme are assumed to be https.
pub fn parse_registry_flag(value: &str) -> Result<(String, RegistryEndpoint)> {
    let invalid = |reason: &str| {
        RegistryError::Configuration(format!("Invalid registry '{}': {}", value, reason))
    };

    let (key, spec) = value
        .split_once('=')
        .ok_or_else(|| invalid("expected key=REGISTRY_URL[,AUTH_URL[,SERVICE]]"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid("registry key must not be empty"));
    }

    let mut fields = spec.split(',').map(str::trim);
    let registry_url = match fields.next() {
        Some(url) if !url.is_empty() => with_scheme(url),
        _ => return Err(invalid("registry URL must not be empty")),
    };
    let auth_url = match fields.next() {
        Some(url) if !url.is_empty() => with_scheme(url),
        _ => registry_url.clone(),
    };
    let service = fields.next().unwrap_or_default().to_string();
    if fields.next().is_some() {
        return Err(invalid("too many fields"));
    }

    for url in [&registry_url, &auth_url] {
        url::Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    }

    Ok((
        key.to_string(),
        RegistryEndpoint::new(key, registry_url, auth_url, service),
    ))
}

fn with_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

// Keep the token out of error messages.
fn redact(value: &str) -> String {
    match value.rsplit_once(':') {
        Some((head, _)) if head.contains(':') => format!("{}:***", head),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_flag() {
        let (key, credential) = parse_credential_flag("dockerhub:alice:dckr_pat_abc").unwrap();
        assert_eq!(key, "dockerhub");
        assert_eq!(credential.username, "alice");
        assert_eq!(credential.token, "dckr_pat_abc");
    }

    #[test]
    fn test_credential_token_may_contain_colons() {
        let (_, credential) = parse_credential_flag("quay.io:bob:a:b:c").unwrap();
        assert_eq!(credential.token, "a:b:c");
    }

    #[test]
    fn test_malformed_credential_flag() {
        assert!(parse_credential_flag("dockerhub:alice").is_err());
        assert!(parse_credential_flag(":alice:token").is_err());
        assert!(parse_credential_flag("").is_err());
    }

    #[test]
    fn test_registry_flag_defaults() {
        let (key, endpoint) = parse_registry_flag("harbor=harbor.example.com/").unwrap();
        assert_eq!(key, "harbor");
        assert_eq!(endpoint.registry_url, "https://harbor.example.com");
        assert_eq!(endpoint.auth_url, "https://harbor.example.com");
        assert_eq!(endpoint.service, "");
    }

    #[test]
    fn test_registry_flag_all_fields() {
        let (_, endpoint) = parse_registry_flag(
            "corp=https://registry.corp.example.com,https://auth.corp.example.com,corp-registry",
        )
        .unwrap();
        assert_eq!(endpoint.registry_url, "https://registry.corp.example.com");
        assert_eq!(endpoint.auth_url, "https://auth.corp.example.com");
        assert_eq!(endpoint.service, "corp-registry");
    }

    #[test]
    fn test_malformed_registry_flag() {
        assert!(parse_registry_flag("no-equals-sign").is_err());
        assert!(parse_registry_flag("=https://x.example.com").is_err());
        assert!(parse_registry_flag("k=").is_err());
        assert!(parse_registry_flag("k=a.example.com,b.example.com,svc,extra").is_err());
    }
}
