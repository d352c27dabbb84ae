//! Session token enrichment.
//!
//! Runs on every token refresh. On a fresh sign-in the just-linked user is
//! copied into the token; afterwards the role is read back from storage
//! according to the configured refresh policy.

use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::error::StorageError;
use crate::store::UserStore;
use crate::token::SessionToken;
use crate::user::User;

/// When the enricher reads the role back from storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRefresh {
    /// Look up the user on every refresh, so role changes apply at the
    /// next request.
    #[default]
    Always,
    /// Look up the user only while the token has no role. Role changes
    /// apply at the next sign-in.
    WhenMissing,
}

/// Fills user id and role into session tokens.
#[derive(Clone)]
pub struct TokenEnricher {
    store: Arc<dyn UserStore>,
    refresh: RoleRefresh,
}

impl TokenEnricher {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, refresh: RoleRefresh) -> Self {
        Self { store, refresh }
    }

    #[must_use]
    pub fn refresh(&self) -> RoleRefresh {
        self.refresh
    }

    /// Enriches the token.
    ///
    /// `linked` is the user returned by the account linker on a fresh
    /// sign-in, and `None` on every later refresh.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the lookup fails. The token is not
    /// returned in that case, so callers cannot fall back to stale claims.
    #[instrument(skip_all, fields(fresh = linked.is_some()))]
    pub async fn enrich(
        &self,
        mut token: SessionToken,
        linked: Option<&User>,
    ) -> Result<SessionToken, Report<StorageError>> {
        if let Some(user) = linked {
            token.apply_user(user);
            return Ok(token);
        }

        let lookup = match self.refresh {
            RoleRefresh::Always => true,
            RoleRefresh::WhenMissing => token.role().is_none(),
        };
        if !lookup {
            return Ok(token);
        }
        let Some(email) = token.email().map(str::to_string) else {
            return Ok(token);
        };

        let found = self.store.find_user_by_email(&email).await.map_err(|e| {
            error!(email = %email, error = %e, "Role lookup failed during token refresh");
            e
        })?;

        match found {
            Some(user) => {
                if token.role() != user.role() {
                    debug!(user_id = %user.id(), role = ?user.role(), "Token role refreshed");
                }
                token.apply_user(&user);
            }
            None if self.refresh == RoleRefresh::Always => {
                debug!(email = %email, "No stored user for token; dropping id and role");
                token.clear_user();
            }
            None => {}
        }

        Ok(token)
    }
}
