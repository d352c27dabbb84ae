//! User domain type.
//!
//! A `User` is the local record behind a verified identity. Users are keyed
//! by email, created by the account linker on first sign-in, and never
//! deleted by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tkj_learning_core::UserId;

use crate::role::Role;

/// A person who has signed in to the learning system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID.
    id: UserId,
    /// Email address; unique across users.
    email: String,
    /// Display name taken from the identity provider.
    name: Option<String>,
    /// Profile image URL taken from the identity provider.
    image: Option<String>,
    /// Access role. Stored rows may lack one until the linker fills it in.
    role: Option<Role>,
    /// When the identity provider vouched for the email address.
    email_verified_at: Option<DateTime<Utc>>,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with the default role.
    #[must_use]
    pub fn new(email: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            name: None,
            image: None,
            role: Some(Role::DEFAULT),
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        email: String,
        name: Option<String>,
        image: Option<String>,
        role: Option<Role>,
        email_verified_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            name,
            image,
            role,
            email_verified_at,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Returns the stored role, if one has been assigned.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    #[must_use]
    pub fn email_verified_at(&self) -> Option<DateTime<Utc>> {
        self.email_verified_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
        self.updated_at = Utc::now();
    }

    /// Sets the profile image URL.
    pub fn set_image(&mut self, image: Option<String>) {
        self.image = image;
        self.updated_at = Utc::now();
    }

    /// Sets the role.
    pub fn set_role(&mut self, role: Role) {
        self.role = Some(role);
        self.updated_at = Utc::now();
    }

    /// Records when the email address was verified.
    pub fn mark_email_verified(&mut self, at: DateTime<Utc>) {
        self.email_verified_at = Some(at);
        self.updated_at = Utc::now();
    }
}
