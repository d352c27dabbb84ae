//! Signed session tokens.
//!
//! The session lives entirely in a signed token carried by the browser.
//! It is issued at sign-in, re-signed with a fresh expiry on every request
//! cycle, and dropped at logout or expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use tkj_learning_core::UserId;

use crate::error::TokenError;
use crate::identity::VerifiedIdentity;
use crate::role::Role;
use crate::user::User;

/// Default maximum token lifetime.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;

/// Accepted range for the configured token lifetime, in days.
pub const MAX_AGE_DAYS_RANGE: std::ops::RangeInclusive<i64> = 1..=3650;

/// Claims carried by a session token.
///
/// `sub` and `role` are only present once the token has been enriched from
/// a stored user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(default)]
    iat: i64,
    #[serde(default)]
    exp: i64,
}

impl SessionToken {
    /// Creates an unsigned token carrying only an email claim.
    #[must_use]
    pub fn new(email: Option<String>) -> Self {
        Self {
            email,
            ..Self::default()
        }
    }

    /// Creates the initial token for a fresh sign-in.
    #[must_use]
    pub fn for_identity(identity: &VerifiedIdentity) -> Self {
        Self {
            email: identity.email.clone(),
            name: identity.name.clone(),
            picture: identity.image.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.sub
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Returns when the token was last signed, if it has been.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        (self.iat != 0)
            .then(|| DateTime::from_timestamp(self.iat, 0))
            .flatten()
    }

    /// Returns when the token stops being accepted, if it has been signed.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        (self.exp != 0)
            .then(|| DateTime::from_timestamp(self.exp, 0))
            .flatten()
    }

    /// Copies the stored user's claims into the token.
    pub(crate) fn apply_user(&mut self, user: &User) {
        self.sub = Some(user.id());
        self.email = Some(user.email().to_string());
        self.role = user.role();
        if let Some(name) = user.name() {
            self.name = Some(name.to_string());
        }
        if let Some(image) = user.image() {
            self.picture = Some(image.to_string());
        }
    }

    /// Drops the claims that came from a stored user.
    pub(crate) fn clear_user(&mut self) {
        self.sub = None;
        self.role = None;
    }
}

/// Signs and verifies session tokens (HS256).
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: Duration,
}

impl TokenCodec {
    /// Creates a codec for the given secret and maximum token lifetime.
    #[must_use]
    pub fn new(secret: &str, max_age: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            max_age,
        }
    }

    /// Returns the maximum lifetime of a freshly signed token.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Signs the token with `iat` set to now and `exp` one max-age later.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails or the expiry falls
    /// outside the representable time range.
    pub fn encode(&self, token: &SessionToken) -> Result<String, Report<TokenError>> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.max_age)
            .ok_or_else(|| TokenError::Encoding {
                reason: format!("max age {} overflows the expiry", self.max_age),
            })?;
        let mut stamped = token.clone();
        stamped.iat = now.timestamp();
        stamped.exp = expires.timestamp();

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &stamped, &self.encoding_key)
            .map_err(|e| {
                TokenError::Encoding {
                    reason: e.to_string(),
                }
                .into()
            })
    }

    /// Verifies the signature and expiry and returns the claims.
    ///
    /// # Errors
    ///
    /// `TokenError::Expired` past `exp`, `TokenError::Invalid` for anything
    /// else that fails verification.
    pub fn decode(&self, raw: &str) -> Result<SessionToken, Report<TokenError>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<SessionToken>(raw, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired.into(),
                _ => TokenError::Invalid {
                    reason: e.to_string(),
                }
                .into(),
            })
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}
