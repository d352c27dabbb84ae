//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: sign-in failures (identity, account linking)
//! - `AuthorizationError`: guard denials for an established session
//! - `StorageError`: user store failures, always treated as fail-closed
//! - `TokenError`: session token encoding and verification failures

use crate::role::{Role, RoleSet};
use std::fmt;

/// Errors from the sign-in chain.
///
/// Any of these returns the user to the sign-in page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The identity provider did not supply an email address.
    MissingEmail { provider: String },
    /// The identity provider supplied an email it has not verified.
    EmailNotVerified { email: String },
    /// The identity provider rejected or failed the exchange.
    ProviderError { provider: String, reason: String },
    /// A user with this email exists but is not linked to the provider
    /// account, and email-based linking is disabled.
    AccountNotLinked { email: String, provider: String },
    /// The provider account is already linked to a different user.
    AccountConflict {
        provider: String,
        provider_account_id: String,
    },
    /// The user store failed while linking the account.
    StorageFailed,
    /// The session token could not be issued.
    SessionNotIssued,
}

impl AuthenticationError {
    /// Error code placed on the sign-in page's `error` query parameter.
    #[must_use]
    pub fn sign_in_code(&self) -> &'static str {
        match self {
            Self::MissingEmail { .. } | Self::EmailNotVerified { .. } => "AccessDenied",
            Self::AccountNotLinked { .. } | Self::AccountConflict { .. } => {
                "OAuthAccountNotLinked"
            }
            Self::ProviderError { .. } | Self::StorageFailed | Self::SessionNotIssued => {
                "Callback"
            }
        }
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEmail { provider } => {
                write!(f, "identity from '{provider}' carries no email address")
            }
            Self::EmailNotVerified { email } => {
                write!(f, "email '{email}' is not verified by the identity provider")
            }
            Self::ProviderError { provider, reason } => {
                write!(f, "identity provider '{provider}' error: {reason}")
            }
            Self::AccountNotLinked { email, provider } => {
                write!(f, "user '{email}' has no linked '{provider}' account")
            }
            Self::AccountConflict {
                provider,
                provider_account_id,
            } => {
                write!(
                    f,
                    "'{provider}' account {provider_account_id} belongs to another user"
                )
            }
            Self::StorageFailed => write!(f, "user store failed during sign-in"),
            Self::SessionNotIssued => write!(f, "session token could not be issued"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from route authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No session accompanies the request.
    NotAuthenticated,
    /// The session's role is outside the route's required set.
    Forbidden { role: Role, required: RoleSet },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "user is not authenticated"),
            Self::Forbidden { role, required } => {
                write!(f, "role {role} is not one of [{required}]")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Errors from the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store could not be reached.
    Unavailable { details: String },
    /// A query failed.
    QueryFailed { details: String },
    /// A stored role is outside the closed role set.
    InvalidRole { value: String },
    /// A stored row could not be decoded.
    InvalidRecord { details: String },
    /// The write would violate a uniqueness constraint.
    Conflict { details: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "user store unavailable: {details}"),
            Self::QueryFailed { details } => write!(f, "user store query failed: {details}"),
            Self::InvalidRole { value } => write!(f, "stored role '{value}' is not recognised"),
            Self::InvalidRecord { details } => write!(f, "invalid user record: {details}"),
            Self::Conflict { details } => write!(f, "user store conflict: {details}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from session token handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token's lifetime has passed.
    Expired,
    /// The token is malformed or its signature does not verify.
    Invalid { reason: String },
    /// The token could not be signed.
    Encoding { reason: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "session token has expired"),
            Self::Invalid { reason } => write!(f, "invalid session token: {reason}"),
            Self::Encoding { reason } => write!(f, "failed to sign session token: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}
