//! Command-line argument parsing

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS, MAX_GROUP_SIZE};
use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use crate::image::DEFAULT_TAG;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "docker-manifest")]
#[command(about = "Fetch Docker/OCI image manifests and digests from one or more registries")]
#[command(version, author)]
pub struct Args {
    /// Image references, comma separated
    #[arg(
        long = "image",
        short = 'i',
        help = "Image name(s), comma separated: nginx, ghcr.io/owner/repo, nginx:1.25,redis:alpine"
    )]
    pub image: String,

    /// Tag used when a reference carries none
    #[arg(
        long = "tag",
        short = 't',
        default_value = DEFAULT_TAG,
        help = "Tag for references without one (ignored when the reference has a tag)"
    )]
    pub tag: String,

    #[arg(
        long = "dockerhub-username",
        env = "DOCKERHUB_USERNAME",
        help = "Docker Hub username"
    )]
    pub dockerhub_username: Option<String>,

    #[arg(
        long = "dockerhub-token",
        env = "DOCKERHUB_TOKEN",
        hide_env_values = true,
        help = "Docker Hub access token (dckr_pat_...)"
    )]
    pub dockerhub_token: Option<String>,

    #[arg(long = "ghcr-username", env = "GHCR_USERNAME", help = "GitHub username")]
    pub ghcr_username: Option<String>,

    #[arg(
        long = "ghcr-token",
        env = "GHCR_TOKEN",
        hide_env_values = true,
        help = "GitHub token (ghp_... or github_pat_...)"
    )]
    pub ghcr_token: Option<String>,

    /// Generic credentials, repeatable
    #[arg(
        long = "credentials",
        value_name = "REGISTRY:USERNAME:TOKEN",
        help = "Credentials for a registry key or bare domain; may be repeated"
    )]
    pub credentials: Vec<String>,

    /// Additional registries, repeatable
    #[arg(
        long = "registry",
        value_name = "KEY=REGISTRY_URL[,AUTH_URL[,SERVICE]]",
        help = "Register a custom registry endpoint; may be repeated"
    )]
    pub registries: Vec<String>,

    #[arg(
        long = "concurrency",
        short = 'j',
        default_value_t = DEFAULT_CONCURRENCY,
        help = "Concurrent manifest fetches in batch mode (0 = sequential)"
    )]
    pub concurrency: usize,

    #[arg(
        long = "no-batch-auth",
        help = "Authenticate every image individually instead of per registry batch"
    )]
    pub no_batch_auth: bool,

    #[arg(
        long = "batch-size",
        value_name = "N",
        help = "Maximum images sharing one batch token (1-30, default 30)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "estimate",
        help = "Print the estimated safe batch size per registry and exit"
    )]
    pub estimate: bool,

    #[arg(long = "pretty", help = "Pretty-print manifest JSON")]
    pub pretty: bool,

    #[arg(long = "digest", help = "Show the manifest digest on stderr")]
    pub digest: bool,

    #[arg(
        long = "timeout",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Timeout for each network request in seconds"
    )]
    pub timeout: u64,

    #[arg(long = "proxy", help = "Proxy URL for all registry requests")]
    pub proxy: Option<String>,

    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print manifests and errors"
    )]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "An image name is required".to_string(),
            ));
        }

        if self.tag.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "Tag must not be empty".to_string(),
            ));
        }

        ValidationErrorHandler::validate_timeout(self.timeout)?;

        if let Some(size) = self.batch_size {
            if size == 0 || size > MAX_GROUP_SIZE {
                return Err(RegistryError::Configuration(format!(
                    "Batch size must be between 1 and {}",
                    MAX_GROUP_SIZE
                )));
            }
        }

        Ok(())
    }
}
