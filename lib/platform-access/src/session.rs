//! Request-scoped session view.
//!
//! A `SessionView` is what pages and endpoints see of the signed-in user.
//! It is materialized from the enriched token on every request and is never
//! persisted.

use serde::{Deserialize, Serialize};
use tkj_learning_core::UserId;

use crate::role::Role;
use crate::token::SessionToken;

/// The session object exposed to route logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

impl SessionView {
    /// Creates a view with the given claims.
    #[must_use]
    pub fn new(id: Option<UserId>, email: Option<String>, role: Option<Role>) -> Self {
        Self {
            id,
            email,
            role,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<UserId> {
        self.id
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
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Returns the role exactly as the token carried it.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Returns the role used for access decisions.
    ///
    /// A session without a role is treated as the unprivileged visitor.
    #[must_use]
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or(Role::DEFAULT)
    }
}

/// Projects an enriched token into the session view.
///
/// Copies only what the token carries; no defaults are filled in here.
#[must_use]
pub fn materialize(token: &SessionToken) -> SessionView {
    SessionView {
        id: token.user_id(),
        email: token.email().map(str::to_string),
        name: token.name().map(str::to_string),
        image: token.picture().map(str::to_string),
        role: token.role(),
    }
}

impl From<&SessionToken> for SessionView {
    fn from(token: &SessionToken) -> Self {
        materialize(token)
    }
}
