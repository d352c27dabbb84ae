//! User storage seam.
//!
//! The sign-in chain needs only a handful of operations from the persistent
//! store. The server provides a PostgreSQL implementation; `MemoryUserStore`
//! backs tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tkj_learning_core::{Result, UserId};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::identity::LinkedAccount;
use crate::role::Role;
use crate::user::User;

/// Trait for user and linked-account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by email address.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// Sets the role of the user with this email. Last write wins.
    async fn set_user_role(&self, email: &str, role: Role) -> Result<(), StorageError>;

    /// Inserts a new user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email is already taken.
    async fn create_user(&self, user: &User) -> Result<(), StorageError>;

    /// Finds the user a provider account is linked to.
    async fn find_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, StorageError>;

    /// Links a provider account to a user.
    async fn link_account(&self, account: &LinkedAccount) -> Result<(), StorageError>;

    /// Records when a user's email was verified.
    async fn mark_email_verified(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// In-memory user store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    accounts: RwLock<HashMap<(String, String), UserId>>,
    role_writes: AtomicUsize,
    unavailable: bool,
    read_only: bool,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store on which every operation fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Creates a store seeded with the given users.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users
            .into_iter()
            .map(|u| (u.email().to_string(), u))
            .collect();
        Self {
            users: RwLock::new(users),
            ..Self::default()
        }
    }

    /// Makes every write fail while reads keep working.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Number of `set_user_role` calls served so far.
    #[must_use]
    pub fn role_writes(&self) -> usize {
        self.role_writes.load(Ordering::SeqCst)
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable {
            return Err(StorageError::Unavailable {
                details: "memory store configured as unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        self.check_available()?;
        if self.read_only {
            return Err(StorageError::Unavailable {
                details: "memory store configured as read-only".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        self.check_available()?;
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn set_user_role(&self, email: &str, role: Role) -> Result<(), StorageError> {
        self.check_writable()?;
        self.role_writes.fetch_add(1, Ordering::SeqCst);

        let mut users = self.users.write().await;
        let user = users.get_mut(email).ok_or_else(|| StorageError::QueryFailed {
            details: format!("no user with email '{email}'"),
        })?;
        user.set_role(role);
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<(), StorageError> {
        self.check_writable()?;

        let mut users = self.users.write().await;
        if users.contains_key(user.email()) {
            return Err(StorageError::Conflict {
                details: format!("email '{}' already registered", user.email()),
            }
            .into());
        }
        users.insert(user.email().to_string(), user.clone());
        Ok(())
    }

    async fn find_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, StorageError> {
        self.check_available()?;

        let key = (provider.to_string(), provider_account_id.to_string());
        let Some(user_id) = self.accounts.read().await.get(&key).copied() else {
            return Ok(None);
        };
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.id() == user_id)
            .cloned())
    }

    async fn link_account(&self, account: &LinkedAccount) -> Result<(), StorageError> {
        self.check_writable()?;

        let key = (
            account.provider.clone(),
            account.provider_account_id.clone(),
        );
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(StorageError::Conflict {
                details: format!(
                    "'{}' account {} already linked",
                    account.provider, account.provider_account_id
                ),
            }
            .into());
        }
        accounts.insert(key, account.user_id);
        Ok(())
    }

    async fn mark_email_verified(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_writable()?;

        let mut users = self.users.write().await;
        if let Some(user) = users.values_mut().find(|u| u.id() == user_id) {
            user.mark_email_verified(at);
        }
        Ok(())
    }
}
