//! Standardized error handling patterns for registry HTTP exchanges

use crate::error::{RegistryError, Result};

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Non-200 from a token endpoint
    pub fn handle_token_error(status: u16, error_text: &str) -> RegistryError {
        RegistryError::TokenRequestFailed {
            status,
            body: error_text.to_string(),
        }
    }

    /// Non-200 from a manifest endpoint
    pub fn handle_manifest_error(status: u16, error_text: &str) -> RegistryError {
        RegistryError::Upstream {
            status,
            body: error_text.to_string(),
        }
    }

    /// Short human hint for common registry statuses, used in log lines
    pub fn describe_status(status: u16) -> &'static str {
        match status {
            400 => "bad request",
            401 => "unauthorized",
            403 => "forbidden",
            404 => "not found",
            429 => "rate limited",
            500 => "registry server error",
            502 | 503 => "registry unavailable",
            _ => "unexpected status",
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        if error.is_builder() {
            RegistryError::RequestConstruction(format!("{}: {}", context, error))
        } else if error.is_timeout() {
            RegistryError::Network(format!("{} timed out: {}", context, error))
        } else if error.is_connect() {
            RegistryError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            RegistryError::Network(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            RegistryError::Network(format!("{} network error: {}", context, error))
        }
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// Both halves of a credential must be present together
    pub fn validate_credentials(
        registry: &str,
        username: &Option<String>,
        token: &Option<String>,
    ) -> Result<()> {
        match (username, token) {
            (Some(_), None) => Err(RegistryError::Configuration(format!(
                "A token is required when a {} username is provided",
                registry
            ))),
            (None, Some(_)) => Err(RegistryError::Configuration(format!(
                "A username is required when a {} token is provided",
                registry
            ))),
            _ => Ok(()),
        }
    }

    pub fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(RegistryError::Configuration(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if timeout > 3600 {
            return Err(RegistryError::Configuration(
                "Timeout cannot exceed one hour (3600 seconds)".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_keeps_status_and_body() {
        let err = HttpErrorHandler::handle_token_error(401, "{\"details\":\"incorrect username or password\"}\n");
        assert_eq!(
            err,
            RegistryError::TokenRequestFailed {
                status: 401,
                body: "{\"details\":\"incorrect username or password\"}\n".to_string(),
            }
        );
    }

    #[test]
    fn test_long_bodies_are_kept_whole() {
        let body = "x".repeat(10_000);
        match HttpErrorHandler::handle_manifest_error(500, &body) {
            RegistryError::Upstream { status, body: carried } => {
                assert_eq!(status, 500);
                assert_eq!(carried, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_credential_pairs() {
        assert!(ValidationErrorHandler::validate_credentials("Docker Hub", &None, &None).is_ok());
        assert!(
            ValidationErrorHandler::validate_credentials(
                "Docker Hub",
                &Some("user".into()),
                &Some("pat".into())
            )
            .is_ok()
        );
        assert!(
            ValidationErrorHandler::validate_credentials("GHCR", &Some("user".into()), &None)
                .is_err()
        );
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(ValidationErrorHandler::validate_timeout(0).is_err());
        assert!(ValidationErrorHandler::validate_timeout(30).is_ok());
        assert!(ValidationErrorHandler::validate_timeout(7200).is_err());
    }
}
