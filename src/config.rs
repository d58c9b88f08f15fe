//! Configuration for the registry client and batch manifest retrieval

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request network timeout used when nothing else is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default worker count for batch retrieval
pub const DEFAULT_CONCURRENCY: usize = 5;
/// Upper bound (and default) for the number of images sharing one batch token
pub const MAX_GROUP_SIZE: usize = 30;

/// Transport-level settings for [`crate::registry::RegistryClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    /// Explicit proxy URL. When unset, `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` apply.
    pub proxy: Option<String>,
    pub skip_tls: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy: None,
            skip_tls: false,
            user_agent: format!("docker-manifest-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.is_empty());
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_timeout(self.timeout_secs)?;

        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy).map_err(|e| {
                RegistryError::Configuration(format!("Invalid proxy URL '{}': {}", proxy, e))
            })?;
        }

        Ok(())
    }
}

/// Knobs for [`crate::registry::RegistryClient::get_manifests_with_digest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// 0 fetches sequentially; any other value bounds the number of in-flight requests
    pub concurrency: usize,
    /// Acquire one multi-scope token per sub-group before fetching
    pub batch_auth: bool,
    /// Largest sub-group; `None` or out-of-range values fall back to [`MAX_GROUP_SIZE`]
    pub max_group_size: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_auth: true,
            max_group_size: None,
        }
    }
}

impl BatchOptions {
    pub fn sequential() -> Self {
        Self {
            concurrency: 0,
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_auth(mut self, batch_auth: bool) -> Self {
        self.batch_auth = batch_auth;
        self
    }

    pub fn with_max_group_size(mut self, max_group_size: Option<usize>) -> Self {
        self.max_group_size = max_group_size;
        self
    }

    /// Effective sub-group size
    pub fn group_size(&self) -> usize {
        match self.max_group_size {
            Some(size) if (1..=MAX_GROUP_SIZE).contains(&size) => size,
            _ => MAX_GROUP_SIZE,
        }
    }
}
