//! Registry client: credential management, token acquisition and manifest retrieval
//!
//! [`RegistryClient`] is the entry point for callers. It resolves which registry
//! hosts an image, authenticates against that registry's token service and
//! fetches the manifest together with its `Docker-Content-Digest`. Clones share
//! all state.

use crate::config::{BatchOptions, ClientConfig};
use crate::error::handlers::HttpErrorHandler;
use crate::error::Result;
use crate::image::ImageSpec;
use crate::logging::Logger;
use crate::registry::auth::{Auth, BearerToken};
use crate::registry::batch::BatchPlanner;
use crate::registry::credentials::{Credential, CredentialStore};
use crate::registry::directory::{RegistryDirectory, RegistryEndpoint};
use crate::registry::dispatch::FetchDispatcher;
use crate::registry::manifest::{FetchedManifest, ManifestResult};
use crate::registry::resolver::{
    DomainMatcher, RegistryTarget, Resolver, normalize_image_name, strip_domain,
};
use crate::registry::transport::{
    HttpRequest, MANIFEST_ACCEPT_TYPES, RegistryTransport, StandardRegistryTransport,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct RegistryClientBuilder {
    config: ClientConfig,
    directory: Option<Arc<RegistryDirectory>>,
    matcher: Option<Arc<dyn DomainMatcher>>,
    credentials: HashMap<String, Credential>,
    transport: Option<Arc<dyn RegistryTransport>>,
    output: Logger,
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            directory: None,
            matcher: None,
            credentials: HashMap::new(),
            transport: None,
            output: Logger::default(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config = self.config.with_proxy(Some(proxy.into()));
        self
    }

    /// Use `directory` instead of the process-wide one
    pub fn with_directory(mut self, directory: Arc<RegistryDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_domain_matcher(mut self, matcher: Arc<dyn DomainMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Seed the credential store
    pub fn with_credentials(mut self, credentials: HashMap<String, Credential>) -> Self {
        self.credentials.extend(credentials);
        self
    }

    pub fn with_credential(mut self, key: &str, username: &str, token: &str) -> Self {
        self.credentials
            .insert(key.to_string(), Credential::new(username, token));
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let transport: Arc<dyn RegistryTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(StandardRegistryTransport::new(
                &self.config,
                self.output.clone(),
            )?),
        };

        let directory = self.directory.unwrap_or_else(RegistryDirectory::global);
        let resolver = match self.matcher {
            Some(matcher) => Resolver::with_matcher(directory.clone(), matcher),
            None => Resolver::new(directory.clone()),
        };
        let credentials = Arc::new(CredentialStore::from_map(self.credentials));
        let auth = Auth::new(
            transport.clone(),
            directory,
            credentials.clone(),
            self.output.clone(),
        );

        Ok(RegistryClient {
            transport,
            resolver,
            credentials,
            auth,
            output: self.output,
        })
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn RegistryTransport>,
    resolver: Resolver,
    credentials: Arc<CredentialStore>,
    auth: Auth,
    output: Logger,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("resolver", &self.resolver)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl RegistryClient {
    /// Client with default settings and the process-wide registry directory
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    // Credentials

    pub fn add_credential(&self, registry_key: &str, username: &str, token: &str) {
        self.credentials.set(registry_key, username, token);
    }

    pub fn remove_credential(&self, registry_key: &str) -> Option<Credential> {
        self.credentials.remove(registry_key)
    }

    pub fn get_credential(&self, registry_key: &str) -> Option<Credential> {
        self.credentials.get(registry_key)
    }

    // Registry directory

    pub fn directory(&self) -> &Arc<RegistryDirectory> {
        self.resolver.directory()
    }

    pub fn register_registry(&self, key: &str, endpoint: RegistryEndpoint) -> Result<()> {
        self.directory().register(key, endpoint)?;
        self.output.debug(&format!("Registered registry '{}'", key));
        Ok(())
    }

    pub fn unregister_registry(&self, key: &str) -> Result<()> {
        self.directory().unregister(key)
    }

    pub fn get_registry(&self, key: &str) -> Result<RegistryEndpoint> {
        self.directory().lookup(key)
    }

    pub fn list_registries(&self) -> Vec<RegistryEndpoint> {
        self.directory().list()
    }

    // Resolution

    pub fn detect_registry(&self, image: &str) -> String {
        self.resolver.detect_registry(image)
    }

    pub fn resolve(&self, image: &str) -> RegistryTarget {
        self.resolver.resolve(image)
    }

    pub fn normalize_image_name(image: &str, registry_key: &str) -> String {
        normalize_image_name(image, registry_key)
    }

    // Tokens

    /// Single-scope pull token for `image` on its detected registry
    pub async fn get_auth_token(&self, image: &str) -> Result<BearerToken> {
        let registry_key = self.detect_registry(image);
        self.auth.token_for_image(image, &registry_key).await
    }

    /// One token covering every image in `images` on `registry_key`
    pub async fn get_auth_token_for_images<S: AsRef<str>>(
        &self,
        images: &[S],
        registry_key: &str,
    ) -> Result<BearerToken> {
        self.auth.token_for_images(images, registry_key).await
    }

    pub async fn get_auth_token_with_scopes(
        &self,
        scopes: &[String],
        registry_key: &str,
    ) -> Result<BearerToken> {
        self.auth.token_with_scopes(scopes, registry_key).await
    }

    pub fn estimate_max_images_for_batch<S: AsRef<str>>(
        &self,
        sample_images: &[S],
        registry_key: &str,
    ) -> Result<usize> {
        self.auth
            .estimate_max_images_for_batch(sample_images, registry_key)
    }

    // Manifests

    /// Fetch one manifest and its digest, authenticating for this image alone
    pub async fn get_manifest_with_digest(&self, image: &str, tag: &str) -> Result<FetchedManifest> {
        match self.resolve(image) {
            RegistryTarget::Registered(registry_key) => {
                let endpoint = self.directory().lookup(&registry_key)?;
                let repository = normalize_image_name(image, &registry_key);
                let token = self.auth.token_for_image(image, &registry_key).await?;
                self.fetch_manifest(&endpoint.registry_url, &repository, tag, &token.token)
                    .await
            }
            RegistryTarget::Unregistered { domain } => {
                self.output.debug(&format!(
                    "'{}' is not a registered registry, discovering auth via challenge",
                    domain
                ));
                let registry_url = format!("https://{}", domain);
                let repository = strip_domain(image);
                let token = self.auth.discover_token(&registry_url, repository).await?;
                self.fetch_manifest(&registry_url, repository, tag, &token.token)
                    .await
            }
        }
    }

    /// Fetch manifests for many images, grouped per registry with optional batch tokens.
    ///
    /// Always returns one result per input, in input order; individual failures
    /// never abort the batch.
    pub async fn get_manifests_with_digest(
        &self,
        specs: &[ImageSpec],
        options: &BatchOptions,
    ) -> Vec<ManifestResult> {
        if specs.is_empty() {
            return Vec::new();
        }

        let planner = BatchPlanner::new(self.resolver.clone(), self.output.clone());
        let mut groups = planner.plan(specs, options.group_size());

        if options.batch_auth {
            planner.acquire_batch_tokens(&mut groups, &self.auth).await;
        }

        FetchDispatcher::new(self.clone())
            .dispatch(specs, groups, options.concurrency)
            .await
    }

    /// Fetch one member of a planned group, reusing the group token when present
    pub(crate) async fn fetch_in_group(
        &self,
        target: &RegistryTarget,
        batch_token: Option<&BearerToken>,
        spec: &ImageSpec,
    ) -> ManifestResult {
        let result = match (target, batch_token) {
            (RegistryTarget::Registered(registry_key), Some(token)) => {
                self.fetch_with_token(&spec.image, &spec.tag, registry_key, &token.token)
                    .await
            }
            _ => self.get_manifest_with_digest(&spec.image, &spec.tag).await,
        };

        if let Err(e) = &result {
            self.output
                .warning(&format!("Failed to fetch manifest for {}: {}", spec, e));
        }
        ManifestResult::new(spec, result)
    }

    async fn fetch_with_token(
        &self,
        image: &str,
        tag: &str,
        registry_key: &str,
        token: &str,
    ) -> Result<FetchedManifest> {
        let endpoint = self.directory().lookup(registry_key)?;
        let repository = normalize_image_name(image, registry_key);
        self.fetch_manifest(&endpoint.registry_url, &repository, tag, token)
            .await
    }

    async fn fetch_manifest(
        &self,
        registry_url: &str,
        repository: &str,
        reference: &str,
        token: &str,
    ) -> Result<FetchedManifest> {
        let url = format!("{}/v2/{}/manifests/{}", registry_url, repository, reference);
        self.output.debug(&format!("Fetching manifest {}", url));

        let request = HttpRequest::get(&url)
            .with_accept(MANIFEST_ACCEPT_TYPES)
            .with_bearer(token);
        let response = self.transport.get(request).await?;

        if !response.is_ok() {
            return Err(HttpErrorHandler::handle_manifest_error(
                response.status,
                &response.body,
            ));
        }

        let digest = response
            .header("docker-content-digest")
            .unwrap_or_default()
            .to_string();

        Ok(FetchedManifest {
            manifest: response.body,
            digest,
        })
    }
}
