//! HTTP transport for Docker Registry API v2 / OCI Distribution requests
//!
//! Every network exchange in this crate is a plain `GET`, so the transport
//! surface is one method. [`StandardRegistryTransport`] backs it with
//! `reqwest`; tests substitute scripted implementations.

use crate::config::ClientConfig;
use crate::error::handlers::NetworkErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap};
use std::collections::HashMap;

/// Manifest media types offered to the registry, most preferred first
pub const MANIFEST_ACCEPT_TYPES: [&str; 4] = [
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.oci.image.index.v1+json",
];

/// Authorization attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAuth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

/// Registry GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub accept: Vec<String>,
    pub auth: RequestAuth,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: Vec::new(),
            auth: RequestAuth::None,
        }
    }

    pub fn with_accept<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = RequestAuth::Basic {
            username: username.to_string(),
            password: password.to_string(),
        };
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.auth = RequestAuth::Bearer(token.to_string());
        self
    }
}

/// Registry response with lower-cased header names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// OCI/Docker Registry transport operations
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Issue a GET; any HTTP status is a successful exchange
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Standard registry transport implementation
#[derive(Debug, Clone)]
pub struct StandardRegistryTransport {
    client: reqwest::Client,
    logger: Logger,
}

impl StandardRegistryTransport {
    pub fn new(config: &ClientConfig, logger: Logger) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone());

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
                RegistryError::Configuration(format!("Invalid proxy '{}': {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }

        if config.skip_tls {
            logger.warning("TLS certificate verification is disabled");
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let client = builder
            .build()
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "HTTP client setup"))?;

        Ok(Self { client, logger })
    }

    /// Lower-cased header map; the first value of a repeated header wins
    fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
        let mut collected = HashMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                collected
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_insert_with(|| value.to_string());
            }
        }
        collected
    }
}

#[async_trait]
impl RegistryTransport for StandardRegistryTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = url::Url::parse(&request.url)?;
        self.logger.detail(&format!("GET {}", url));

        let mut req = self.client.get(url);
        if !request.accept.is_empty() {
            req = req.header(ACCEPT, request.accept.join(", "));
        }
        req = match &request.auth {
            RequestAuth::None => req,
            RequestAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            RequestAuth::Bearer(token) => req.bearer_auth(token),
        };

        let response = req
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "registry request"))?;

        let status = response.status().as_u16();
        let headers = Self::collect_headers(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "reading response body"))?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|e| {
            RegistryError::Network(format!("Response body is not valid UTF-8: {}", e))
        })?;

        self.logger
            .detail(&format!("Response status {} ({} bytes)", status, body.len()));

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
