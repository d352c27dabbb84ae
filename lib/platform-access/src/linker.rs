//! First-sign-in account linking.
//!
//! The linker turns a verified identity into a local user: it creates the
//! user on first sign-in, attaches the provider account, and makes sure the
//! user ends up with a role. Every storage failure aborts the sign-in.

use chrono::Utc;
use rootcause::prelude::{Report, ResultExt};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::AuthenticationError;
use crate::identity::{LinkedAccount, VerifiedIdentity};
use crate::role::Role;
use crate::store::UserStore;
use crate::user::User;

/// Result of linking a verified identity.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    /// The linked user, with its role set.
    pub user: User,
    /// The user was created by this sign-in.
    pub is_new_user: bool,
    /// The provider account was attached by this sign-in.
    pub account_linked: bool,
    /// The user's missing role was filled with the default.
    pub role_defaulted: bool,
}

/// Creates or links local users from verified identities.
#[derive(Clone)]
pub struct AccountLinker {
    store: Arc<dyn UserStore>,
    allow_email_account_linking: bool,
}

impl AccountLinker {
    /// Creates a linker.
    ///
    /// With `allow_email_account_linking`, a provider account signing in
    /// with the email of an existing user is attached to that user.
    /// Without it, such sign-ins are refused.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, allow_email_account_linking: bool) -> Self {
        Self {
            store,
            allow_email_account_linking,
        }
    }

    /// Links the identity to a local user.
    ///
    /// Re-running with the same identity changes nothing beyond filling a
    /// missing role.
    ///
    /// # Errors
    ///
    /// Returns an `AuthenticationError` when the identity has no verified
    /// email, the account cannot be linked, or the store fails.
    #[instrument(skip(self, identity), fields(provider = %identity.provider))]
    pub async fn link(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<LinkOutcome, Report<AuthenticationError>> {
        let email = identity.verified_email()?;

        let by_account = self
            .store
            .find_user_by_account(&identity.provider, &identity.provider_account_id)
            .await
            .context(AuthenticationError::StorageFailed)?;
        let by_email = self
            .store
            .find_user_by_email(email)
            .await
            .context(AuthenticationError::StorageFailed)?;

        let mut outcome = match (by_account, by_email) {
            (Some(linked), Some(owner)) if linked.id() != owner.id() => {
                warn!(
                    email,
                    linked_user = %linked.id(),
                    email_owner = %owner.id(),
                    "Provider account is linked to a different user than the email"
                );
                return Err(AuthenticationError::AccountConflict {
                    provider: identity.provider.clone(),
                    provider_account_id: identity.provider_account_id.clone(),
                }
                .into());
            }
            // Returning user; when the provider email changed, the link wins.
            (Some(linked), _) => LinkOutcome {
                user: linked,
                is_new_user: false,
                account_linked: false,
                role_defaulted: false,
            },
            (None, Some(owner)) => self.attach_account(identity, owner).await?,
            (None, None) => self.create_user(identity, email).await?,
        };

        if outcome.user.role().is_none() {
            self.store
                .set_user_role(outcome.user.email(), Role::DEFAULT)
                .await
                .context(AuthenticationError::StorageFailed)?;
            outcome.user.set_role(Role::DEFAULT);
            outcome.role_defaulted = true;
            info!(user_id = %outcome.user.id(), "Assigned default role on sign-in");
        }

        Ok(outcome)
    }

    async fn attach_account(
        &self,
        identity: &VerifiedIdentity,
        mut owner: User,
    ) -> Result<LinkOutcome, Report<AuthenticationError>> {
        if !self.allow_email_account_linking {
            return Err(AuthenticationError::AccountNotLinked {
                email: owner.email().to_string(),
                provider: identity.provider.clone(),
            }
            .into());
        }

        self.store
            .link_account(&LinkedAccount::for_identity(identity, owner.id()))
            .await
            .context(AuthenticationError::StorageFailed)?;

        let now = Utc::now();
        self.store
            .mark_email_verified(owner.id(), now)
            .await
            .context(AuthenticationError::StorageFailed)?;
        owner.mark_email_verified(now);

        info!(user_id = %owner.id(), "Linked provider account to existing user by email");

        Ok(LinkOutcome {
            user: owner,
            is_new_user: false,
            account_linked: true,
            role_defaulted: false,
        })
    }

    async fn create_user(
        &self,
        identity: &VerifiedIdentity,
        email: &str,
    ) -> Result<LinkOutcome, Report<AuthenticationError>> {
        let mut user = User::new(email.to_string());
        user.set_name(identity.name.clone());
        user.set_image(identity.image.clone());
        user.mark_email_verified(Utc::now());

        self.store
            .create_user(&user)
            .await
            .context(AuthenticationError::StorageFailed)?;
        self.store
            .link_account(&LinkedAccount::for_identity(identity, user.id()))
            .await
            .context(AuthenticationError::StorageFailed)?;

        info!(user_id = %user.id(), "Created user on first sign-in");

        Ok(LinkOutcome {
            user,
            is_new_user: true,
            account_linked: true,
            role_defaulted: false,
        })
    }
}
