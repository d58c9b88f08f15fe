//! Bearer token acquisition for Docker registry access
//!
//! Two flows are supported:
//! - registered registries: the token URL is composed from the directory entry
//!   (`{auth_url}/token?service=..&scope=..`), with one or many pull scopes;
//! - unregistered hosts: an anonymous manifest probe harvests the
//!   `WWW-Authenticate` challenge, whose realm/service/scope drive the token request.
//!
//! Tokens are fetched fresh for every call; `expires_in` is reported but not acted on.

use crate::error::handlers::HttpErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::credentials::{Credential, CredentialStore};
use crate::registry::directory::{RegistryDirectory, RegistryEndpoint};
use crate::registry::resolver::{extract_domain, normalize_image_name};
use crate::registry::transport::{HttpRequest, MANIFEST_ACCEPT_TYPES, RegistryTransport};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use url::form_urlencoded;

/// Conservative proxy-compatible limit on composed auth URLs
pub const MAX_AUTH_URL_LENGTH: usize = 2048;
/// Above this many scopes in one request a warning is logged
pub const MAX_RECOMMENDED_BATCH: usize = 50;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token returned by a registry token service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub token: String,
    /// Advertised lifetime in seconds
    pub expires_in: Option<u64>,
}

/// Parsed `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."`; realm is mandatory
    pub fn parse(header: &str) -> Result<Self> {
        let params_str = header.trim().strip_prefix("Bearer ").ok_or_else(|| {
            RegistryError::InvalidChallenge(format!("unsupported authentication scheme: {}", header))
        })?;

        let mut params = HashMap::new();
        for param in split_params(params_str) {
            if let Some((key, value)) = param.split_once('=') {
                params.insert(key.trim(), value.trim().trim_matches('"'));
            }
        }

        let realm = params
            .get("realm")
            .filter(|realm| !realm.is_empty())
            .ok_or_else(|| RegistryError::InvalidChallenge("missing realm parameter".to_string()))?;

        let optional = |name: &str| {
            params
                .get(name)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
        };

        Ok(Self {
            realm: realm.to_string(),
            service: optional("service"),
            scope: optional("scope"),
        })
    }

    /// Token endpoint URL with the challenge's service and scope attached
    pub fn token_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.realm)?;
        if self.service.is_some() || self.scope.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &self.service {
                query.append_pair("service", service);
            }
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
        }
        Ok(url.to_string())
    }
}

/// Split challenge parameters on commas that are outside quotes
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// `repository:<path>:pull`
pub fn pull_scope(repository: &str) -> String {
    format!("repository:{}:pull", repository)
}

fn encoded_len(value: &str) -> usize {
    form_urlencoded::byte_serialize(value.as_bytes())
        .map(str::len)
        .sum()
}

/// Compose `{auth_url}/token?service=..&scope=..&scope=..`, rejecting URLs over the length budget
pub fn build_auth_url(endpoint: &RegistryEndpoint, scopes: &[String]) -> Result<String> {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if !endpoint.service.is_empty() {
        query.append_pair("service", &endpoint.service);
    }
    for scope in scopes {
        query.append_pair("scope", scope);
    }
    let query = query.finish();

    let mut auth_url = format!("{}/token", endpoint.auth_url);
    if !query.is_empty() {
        auth_url.push('?');
        auth_url.push_str(&query);
    }

    if auth_url.len() > MAX_AUTH_URL_LENGTH {
        return Err(RegistryError::RequestTooLarge {
            length: auth_url.len(),
            limit: MAX_AUTH_URL_LENGTH,
        });
    }

    url::Url::parse(&auth_url)?;
    Ok(auth_url)
}

/// Extract the bearer token from a 200 token response, preferring `token` over `access_token`
pub fn parse_token_response(body: &str) -> Result<BearerToken> {
    let response: TokenResponse = serde_json::from_str(body)?;
    let token = response
        .token
        .filter(|token| !token.is_empty())
        .or(response.access_token.filter(|token| !token.is_empty()))
        .ok_or(RegistryError::NoTokenInResponse)?;

    Ok(BearerToken {
        token,
        expires_in: response.expires_in,
    })
}

/// Token acquirer shared by single and batch manifest retrieval
#[derive(Clone)]
pub struct Auth {
    transport: Arc<dyn RegistryTransport>,
    directory: Arc<RegistryDirectory>,
    credentials: Arc<CredentialStore>,
    output: Logger,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("directory", &self.directory)
            .field("credentials", &self.credentials.len())
            .finish()
    }
}

impl Auth {
    pub fn new(
        transport: Arc<dyn RegistryTransport>,
        directory: Arc<RegistryDirectory>,
        credentials: Arc<CredentialStore>,
        output: Logger,
    ) -> Self {
        Self {
            transport,
            directory,
            credentials,
            output,
        }
    }

    /// Pull token for a single image on a registered registry
    pub async fn token_for_image(&self, image: &str, registry_key: &str) -> Result<BearerToken> {
        let scope = pull_scope(&normalize_image_name(image, registry_key));
        self.token_with_scopes(&[scope], registry_key).await
    }

    /// One token whose scopes cover every image in `images`
    pub async fn token_for_images<S: AsRef<str>>(
        &self,
        images: &[S],
        registry_key: &str,
    ) -> Result<BearerToken> {
        if images.is_empty() {
            return Err(RegistryError::Configuration(
                "Image list must not be empty".to_string(),
            ));
        }

        if images.len() > MAX_RECOMMENDED_BATCH {
            self.output.warning(&format!(
                "Requesting a token for {} images (recommended maximum {}); the registry may reject the request",
                images.len(),
                MAX_RECOMMENDED_BATCH
            ));
        }

        let scopes: Vec<String> = images
            .iter()
            .map(|image| pull_scope(&normalize_image_name(image.as_ref(), registry_key)))
            .collect();

        self.token_with_scopes(&scopes, registry_key).await
    }

    /// Token for explicit scope strings on a registered registry
    pub async fn token_with_scopes(&self, scopes: &[String], registry_key: &str) -> Result<BearerToken> {
        let endpoint = self.directory.lookup(registry_key)?;
        let auth_url = build_auth_url(&endpoint, scopes)?;

        self.output.debug(&format!(
            "Requesting token from {} for {} scope(s)",
            endpoint.name,
            scopes.len()
        ));

        let credential = self.credentials.usable(registry_key);
        self.request_token(&auth_url, credential).await
    }

    /// Token for an unregistered host, discovered through the `WWW-Authenticate` challenge.
    ///
    /// The probe always targets the `latest` tag; only its 401 challenge is used.
    pub async fn discover_token(&self, registry_url: &str, repository: &str) -> Result<BearerToken> {
        let probe_url = format!("{}/v2/{}/manifests/latest", registry_url, repository);
        self.output
            .debug(&format!("Probing {} for an auth challenge", probe_url));

        let response = self
            .transport
            .get(HttpRequest::get(&probe_url).with_accept([MANIFEST_ACCEPT_TYPES[0]]))
            .await?;

        if response.status != 401 {
            return Err(RegistryError::UnexpectedProbeStatus(response.status));
        }

        let header = response.header("www-authenticate").ok_or_else(|| {
            RegistryError::InvalidChallenge("missing WWW-Authenticate header".to_string())
        })?;
        let challenge = AuthChallenge::parse(header)?;

        self.output.debug(&format!(
            "Challenge realm={} service={} scope={}",
            challenge.realm,
            challenge.service.as_deref().unwrap_or(""),
            challenge.scope.as_deref().unwrap_or("")
        ));

        let token_url = challenge.token_url()?;
        let credential = self.credentials.usable(extract_domain(registry_url));
        self.request_token(&token_url, credential).await
    }

    async fn request_token(&self, url: &str, credential: Option<Credential>) -> Result<BearerToken> {
        let mut request = HttpRequest::get(url);
        if let Some(credential) = &credential {
            self.output
                .detail(&format!("Using basic auth for user {}", credential.username));
            request = request.with_basic_auth(&credential.username, &credential.token);
        }

        let response = self.transport.get(request).await?;

        if !response.is_ok() {
            self.output.warning(&format!(
                "Token request failed with status {} ({})",
                response.status,
                HttpErrorHandler::describe_status(response.status)
            ));
            return Err(HttpErrorHandler::handle_token_error(
                response.status,
                &response.body,
            ));
        }

        let token = parse_token_response(&response.body)?;
        if let Some(expires_in) = token.expires_in {
            self.output
                .detail(&format!("Token expires in {} seconds", expires_in));
        }
        Ok(token)
    }

    /// Advisory estimate of how many images fit in one multi-scope token request.
    ///
    /// Uses the sample's average encoded scope length against the URL budget,
    /// minus a 10% margin, floored at 1. An empty sample yields 0.
    pub fn estimate_max_images_for_batch<S: AsRef<str>>(
        &self,
        sample_images: &[S],
        registry_key: &str,
    ) -> Result<usize> {
        let endpoint = self.directory.lookup(registry_key)?;
        Ok(estimate_batch_size(&endpoint, sample_images))
    }
}

pub(crate) fn estimate_batch_size<S: AsRef<str>>(
    endpoint: &RegistryEndpoint,
    sample_images: &[S],
) -> usize {
    if sample_images.is_empty() {
        return 0;
    }

    let total: usize = sample_images
        .iter()
        .map(|image| {
            let scope = pull_scope(&normalize_image_name(image.as_ref(), &endpoint.key));
            encoded_len(&scope) + "&scope=".len()
        })
        .sum();
    let avg_scope_len = (total / sample_images.len()).max(1);

    let base_len = format!("{}/token?service={}", endpoint.auth_url, endpoint.service).len();
    let available = MAX_AUTH_URL_LENGTH.saturating_sub(base_len);
    let max_images = available / avg_scope_len;

    ((max_images as f64 * 0.9) as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_challenge() {
        let challenge = AuthChallenge::parse(
            r#"Bearer realm="https://auth.example.com/token",service="svc",scope="repository:a/b:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.example.com/token");
        assert_eq!(challenge.service.as_deref(), Some("svc"));
        assert_eq!(challenge.scope.as_deref(), Some("repository:a/b:pull"));
    }

    #[test]
    fn test_parse_challenge_realm_only() {
        let challenge = AuthChallenge::parse(r#"Bearer realm="https://quay.io/v2/auth""#).unwrap();
        assert_eq!(challenge.service, None);
        assert_eq!(challenge.scope, None);
        assert_eq!(challenge.token_url().unwrap(), "https://quay.io/v2/auth");
    }

    #[test]
    fn test_parse_challenge_keeps_commas_inside_quotes() {
        let challenge = AuthChallenge::parse(
            r#"Bearer realm="https://auth.example.com/token",scope="repository:a/b:pull,push""#,
        )
        .unwrap();
        assert_eq!(challenge.scope.as_deref(), Some("repository:a/b:pull,push"));
    }

    #[test]
    fn test_parse_challenge_rejects_bad_headers() {
        assert!(matches!(
            AuthChallenge::parse(r#"Basic realm="Registry""#),
            Err(RegistryError::InvalidChallenge(_))
        ));
        assert!(matches!(
            AuthChallenge::parse(r#"Bearer service="svc",scope="x""#),
            Err(RegistryError::InvalidChallenge(_))
        ));
        for header in [r#"Basic realm="Registry""#, r#"Bearer service="svc""#] {
            assert_eq!(
                AuthChallenge::parse(header).unwrap_err().kind(),
                crate::error::ErrorKind::Authentication
            );
        }
    }

    #[test]
    fn test_challenge_token_url_encodes_params() {
        let challenge = AuthChallenge {
            realm: "https://auth.example.com/token".to_string(),
            service: Some("svc".to_string()),
            scope: Some("repository:a/b:pull".to_string()),
        };
        assert_eq!(
            challenge.token_url().unwrap(),
            "https://auth.example.com/token?service=svc&scope=repository%3Aa%2Fb%3Apull"
        );
    }

    #[test]
    fn test_build_auth_url_docker_hub() {
        let url = build_auth_url(
            &RegistryEndpoint::docker_hub(),
            &[pull_scope("library/nginx"), pull_scope("library/redis")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://auth.docker.io/token?service=registry.docker.io\
             &scope=repository%3Alibrary%2Fnginx%3Apull\
             &scope=repository%3Alibrary%2Fredis%3Apull"
        );
    }

    #[test]
    fn test_build_auth_url_omits_empty_service() {
        let url = build_auth_url(&RegistryEndpoint::ghcr(), &[pull_scope("o/r")]).unwrap();
        assert_eq!(url, "https://ghcr.io/token?scope=repository%3Ao%2Fr%3Apull");
    }

    #[test]
    fn test_build_auth_url_rejects_oversized() {
        let scopes: Vec<String> = (0..100)
            .map(|i| pull_scope(&format!("some-organization/some-long-repository-name-{}", i)))
            .collect();
        match build_auth_url(&RegistryEndpoint::docker_hub(), &scopes) {
            Err(RegistryError::RequestTooLarge { length, limit }) => {
                assert!(length > limit);
                assert_eq!(limit, MAX_AUTH_URL_LENGTH);
            }
            other => panic!("expected RequestTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_build_auth_url_rejects_malformed_base() {
        let endpoint = RegistryEndpoint::new("Broken", "registry", "not a url", "");
        assert!(matches!(
            build_auth_url(&endpoint, &[pull_scope("a/b")]),
            Err(RegistryError::RequestConstruction(_))
        ));
    }

    #[test]
    fn test_parse_token_response_prefers_token() {
        let token = parse_token_response(r#"{"token":"t1","access_token":"t2","expires_in":300}"#).unwrap();
        assert_eq!(token.token, "t1");
        assert_eq!(token.expires_in, Some(300));

        let token = parse_token_response(r#"{"token":"","access_token":"t2"}"#).unwrap();
        assert_eq!(token.token, "t2");
    }

    #[test]
    fn test_parse_token_response_without_token() {
        assert_eq!(
            parse_token_response(r#"{"expires_in":300}"#),
            Err(RegistryError::NoTokenInResponse)
        );
        assert!(matches!(
            parse_token_response("<html>"),
            Err(RegistryError::Auth(_))
        ));
    }

    #[test]
    fn test_estimate_batch_size() {
        let hub = RegistryEndpoint::docker_hub();
        assert_eq!(estimate_batch_size(&hub, &["nginx"]), 42);
        assert_eq!(estimate_batch_size::<&str>(&hub, &[]), 0);

        let very_long = "x".repeat(4000);
        assert_eq!(estimate_batch_size(&hub, &[very_long.as_str()]), 1);
    }

    #[test]
    fn test_estimated_batch_fits_under_budget() {
        let hub = RegistryEndpoint::docker_hub();
        let samples = ["nginx", "bitnami/postgresql", "grafana/grafana-oss"];
        let estimate = estimate_batch_size(&hub, &samples);
        let scopes: Vec<String> = (0..estimate)
            .map(|i| pull_scope(&normalize_image_name(samples[i % samples.len()], "dockerhub")))
            .collect();
        assert!(build_auth_url(&hub, &scopes).is_ok());
    }
}
