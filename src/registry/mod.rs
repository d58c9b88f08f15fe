//! Registry module for Docker registry interactions
//!
//! This module resolves image references to registry endpoints, acquires
//! bearer tokens (single, multi-scope, or discovered through a
//! `WWW-Authenticate` challenge) and fetches manifests from the Docker Registry
//! HTTP API v2, one at a time or in planned batches.

pub mod auth;
pub mod batch;
pub mod client;
pub mod credentials;
pub mod directory;
pub mod dispatch;
pub mod manifest;
pub mod resolver;
pub mod transport;

pub use auth::{Auth, AuthChallenge, BearerToken};
pub use batch::{BatchPlanner, GroupMember, SubGroup};
pub use client::{RegistryClient, RegistryClientBuilder};
pub use credentials::{Credential, CredentialStore};
pub use directory::{DOCKER_HUB_KEY, GHCR_KEY, RegistryDirectory, RegistryEndpoint};
pub use manifest::{FetchedManifest, ManifestResult};
pub use resolver::{ContainsMatcher, DomainMatcher, ExactHostMatcher, RegistryTarget, Resolver};
pub use transport::{HttpRequest, HttpResponse, RegistryTransport, RequestAuth, StandardRegistryTransport};
