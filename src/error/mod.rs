//! Error types for registry resolution, authentication and manifest retrieval

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Coarse classification of a [`RegistryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown registry key, reserved-key conflict, duplicate registration
    Configuration,
    /// Token endpoint or challenge discovery failed
    Authentication,
    /// Malformed URL inputs
    RequestConstruction,
    /// Auth URL exceeds the length budget
    RequestTooLarge,
    /// Network-level failure
    Transport,
    /// Non-200 from the manifest endpoint
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Configuration error: registry key must not be empty")]
    EmptyKey,

    #[error("Configuration error: registry key '{0}' is reserved by a built-in registry")]
    ReservedKey(String),

    #[error("Configuration error: registry key '{0}' is already registered")]
    AlreadyExists(String),

    #[error("Configuration error: registry '{0}' is not registered")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: token request failed (status {status}): {body}")]
    TokenRequestFailed { status: u16, body: String },

    #[error("Authentication error: no token found in authentication response")]
    NoTokenInResponse,

    #[error("Authentication error: invalid WWW-Authenticate challenge: {0}")]
    InvalidChallenge(String),

    #[error("Authentication error: unexpected status {0} from challenge probe")]
    UnexpectedProbeStatus(u16),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    RequestConstruction(String),

    #[error(
        "Auth URL too long ({length} > {limit} characters); reduce the number of images per batch"
    )]
    RequestTooLarge { length: usize, limit: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Manifest request failed (status {status}): {body}")]
    Upstream { status: u16, body: String },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::EmptyKey
            | RegistryError::ReservedKey(_)
            | RegistryError::AlreadyExists(_)
            | RegistryError::NotFound(_)
            | RegistryError::Configuration(_) => ErrorKind::Configuration,
            RegistryError::TokenRequestFailed { .. }
            | RegistryError::NoTokenInResponse
            | RegistryError::InvalidChallenge(_)
            | RegistryError::UnexpectedProbeStatus(_)
            | RegistryError::Auth(_) => ErrorKind::Authentication,
            RegistryError::RequestConstruction(_) => ErrorKind::RequestConstruction,
            RegistryError::RequestTooLarge { .. } => ErrorKind::RequestTooLarge,
            RegistryError::Network(_) => ErrorKind::Transport,
            RegistryError::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::TokenRequestFailed { status, .. }
            | RegistryError::Upstream { status, .. }
            | RegistryError::UnexpectedProbeStatus(status) => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            RegistryError::RequestConstruction(err.to_string())
        } else {
            RegistryError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::RequestConstruction(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Auth(format!("failed to parse token response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_covers_taxonomy() {
        assert_eq!(
            RegistryError::ReservedKey("ghcr".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(RegistryError::NoTokenInResponse.kind(), ErrorKind::Authentication);
        assert_eq!(
            RegistryError::RequestTooLarge { length: 3000, limit: 2048 }.kind(),
            ErrorKind::RequestTooLarge
        );
        assert_eq!(RegistryError::Network("reset".into()).kind(), ErrorKind::Transport);
        assert_eq!(
            RegistryError::Upstream { status: 404, body: String::new() }.kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn test_status_is_exposed() {
        let err = RegistryError::Upstream {
            status: 404,
            body: "MANIFEST_UNKNOWN".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("MANIFEST_UNKNOWN"));
        assert_eq!(RegistryError::EmptyKey.status(), None);
    }
}
