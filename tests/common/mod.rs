#![allow(dead_code)]

use async_trait::async_trait;
use docker_manifest_client::registry::directory::RegistryEndpoint;
use docker_manifest_client::registry::transport::{HttpRequest, HttpResponse, RegistryTransport};
use docker_manifest_client::registry::{RegistryClient, RegistryDirectory};
use docker_manifest_client::{Logger, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

/// Scripted transport: answers from a closure and records every request
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
    jitter: bool,
}

impl MockTransport {
    pub fn new(responder: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            jitter: false,
        }
    }

    /// Delay responses by a URL-dependent amount so concurrent tasks finish out of order
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl RegistryTransport for MockTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.jitter {
            let delay = request.url.bytes().map(u64::from).sum::<u64>() % 7;
            tokio::time::sleep(Duration::from_millis(delay * 3)).await;
        }
        Ok((self.responder)(&request))
    }
}

pub const DOCKER_HUB_TOKEN_URL: &str = "https://auth.docker.io/token";
pub const DOCKER_HUB_MANIFESTS: &str = "https://registry-1.docker.io/v2/";
pub const GHCR_TOKEN_URL: &str = "https://ghcr.io/token";

pub fn token_body(token: &str) -> String {
    format!(r#"{{"token":"{}","expires_in":300}}"#, token)
}

pub fn manifest_body(repository: &str, tag: &str) -> String {
    format!(
        r#"{{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","annotations":{{"ref":"{}:{}"}}}}"#,
        repository, tag
    )
}

/// `https://host/v2/<repo>/manifests/<tag>` -> (`<repo>`, `<tag>`)
pub fn manifest_path(url: &str) -> Option<(String, String)> {
    let (_, path) = url.split_once("/v2/")?;
    let (repository, tag) = path.rsplit_once("/manifests/")?;
    Some((repository.to_string(), tag.to_string()))
}

/// Registry that hands out tokens and serves a manifest for every repository
pub fn healthy_registry(request: &HttpRequest) -> HttpResponse {
    if request.url.contains("/token") {
        return HttpResponse::new(200, token_body("batch-token"));
    }
    match manifest_path(&request.url) {
        Some((repository, tag)) => HttpResponse::new(200, manifest_body(&repository, &tag))
            .with_header("Docker-Content-Digest", &format!("sha256:{}-{}", repository.replace('/', "-"), tag)),
        None => HttpResponse::new(404, "not found"),
    }
}

pub fn corp_endpoint() -> RegistryEndpoint {
    RegistryEndpoint::new(
        "Corp Registry",
        "https://registry.corp.example.com",
        "https://auth.corp.example.com",
        "corp-registry",
    )
}

/// Client over `transport` with a private directory that also knows `corp`
pub fn client_with(transport: Arc<MockTransport>) -> RegistryClient {
    let directory = Arc::new(RegistryDirectory::new());
    directory.register("corp", corp_endpoint()).unwrap();

    RegistryClient::builder()
        .with_directory(directory)
        .with_transport(transport)
        .with_logger(Logger::new_quiet())
        .build()
        .unwrap()
}
