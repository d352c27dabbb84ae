//! Identities handed over by the identity provider.

use serde::{Deserialize, Serialize};
use tkj_learning_core::UserId;

use crate::error::AuthenticationError;

/// Provider name used for Google sign-in.
pub const GOOGLE_PROVIDER: &str = "google";

/// Profile returned by the identity provider after a successful exchange.
///
/// Nothing here is trusted until `verified_email` accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Provider name, e.g. `google`.
    pub provider: String,
    /// The provider's stable identifier for the account (OIDC `sub`).
    pub provider_account_id: String,
    /// Email address claim.
    pub email: Option<String>,
    /// Whether the provider has verified the email address.
    pub email_verified: bool,
    /// Display name claim.
    pub name: Option<String>,
    /// Profile picture claim.
    pub image: Option<String>,
}

impl VerifiedIdentity {
    /// Creates an identity with only the account reference set.
    #[must_use]
    pub fn new(provider: impl Into<String>, provider_account_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
            email: None,
            email_verified: false,
            name: None,
            image: None,
        }
    }

    /// Sets the email claim and its verification flag.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>, verified: bool) -> Self {
        self.email = email;
        self.email_verified = verified;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Sets the profile image.
    #[must_use]
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// Returns the email address, if the provider supplied and verified one.
    ///
    /// # Errors
    ///
    /// `MissingEmail` when the claim is absent or blank, `EmailNotVerified`
    /// when the provider does not vouch for it.
    pub fn verified_email(&self) -> Result<&str, AuthenticationError> {
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthenticationError::MissingEmail {
                provider: self.provider.clone(),
            })?;

        if !self.email_verified {
            return Err(AuthenticationError::EmailNotVerified {
                email: email.to_string(),
            });
        }

        Ok(email)
    }
}

/// A provider account attached to a local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub provider: String,
    pub provider_account_id: String,
    pub user_id: UserId,
}

impl LinkedAccount {
    /// Links the identity's provider account to a user.
    #[must_use]
    pub fn for_identity(identity: &VerifiedIdentity, user_id: UserId) -> Self {
        Self {
            provider: identity.provider.clone(),
            provider_account_id: identity.provider_account_id.clone(),
            user_id,
        }
    }
}
