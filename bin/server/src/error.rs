//! Domain error types for server operations.

use std::fmt;

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration is missing or invalid.
    Configuration { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// The identity provider could not be set up.
    IdentityProvider { details: String },
    /// The listen address could not be bound or serving failed.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "invalid configuration: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::IdentityProvider { details } => {
                write!(f, "identity provider setup failed: {details}")
            }
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Errors from talking to the identity provider.
#[derive(Debug)]
pub enum OidcError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
    /// Token exchange failed.
    TokenExchange(String),
    /// Token validation failed.
    TokenValidation(String),
}

impl fmt::Display for OidcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OIDC configuration error: {msg}"),
            Self::Discovery(msg) => write!(f, "OIDC discovery error: {msg}"),
            Self::TokenExchange(msg) => write!(f, "OIDC token exchange error: {msg}"),
            Self::TokenValidation(msg) => write!(f, "OIDC token validation error: {msg}"),
        }
    }
}

impl std::error::Error for OidcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_error_display() {
        let err = StartupError::Database {
            details: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "database error: connection refused");
    }

    #[test]
    fn oidc_error_display() {
        let err = OidcError::Discovery("timeout".to_string());
        assert_eq!(err.to_string(), "OIDC discovery error: timeout");
    }
}
