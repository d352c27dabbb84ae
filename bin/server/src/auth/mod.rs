//! Authentication module for the TKJ Learning System server.
//!
//! This module provides:
//! - Google sign-in (`/auth/login`, `/auth/callback`, `/auth/logout`)
//! - Signed session cookies, refreshed on every request
//! - The guard middleware and the session extractors for Axum routes
//!
//! # Session Model
//!
//! There is no server-side session table. The session is a signed token in
//! the `session` cookie. Every request decodes it, re-reads the role from the
//! user store (see [`RoleRefresh`](tkj_learning_platform_access::RoleRefresh)),
//! runs the route guard and re-signs it with a fresh expiry.

pub mod db;
pub mod middleware;
pub mod oidc;
pub mod routes;

use crate::config::SessionConfig;
use std::sync::Arc;
use tkj_learning_platform_access::{AccountLinker, RouteGuard, TokenCodec, TokenEnricher, UserStore};

pub use middleware::{
    AuthRejection, CurrentSession, OptionalSession, RequireInstructor, RequireSession,
    guard_requests,
};
pub use oidc::{GoogleClient, IdentityProvider};
pub use routes::{callback, login, logout, session};

/// Shared application state.
pub struct AppState {
    /// Identity provider used for sign-in.
    pub identity_provider: Arc<dyn IdentityProvider>,
    /// Links verified identities to users on sign-in.
    pub linker: AccountLinker,
    /// Refreshes user id and role in session tokens.
    pub enricher: TokenEnricher,
    /// Signs and verifies the session cookie.
    pub codec: TokenCodec,
    /// Route requirements.
    pub guard: RouteGuard,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state over the given store and provider.
    pub fn new(
        store: Arc<dyn UserStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        session_config: SessionConfig,
        allow_email_account_linking: bool,
    ) -> Self {
        Self {
            identity_provider,
            linker: AccountLinker::new(store.clone(), allow_email_account_linking),
            enricher: TokenEnricher::new(store, session_config.role_refresh),
            codec: TokenCodec::new(&session_config.secret, session_config.max_age()),
            guard: RouteGuard::default(),
            session_config,
        }
    }
}
