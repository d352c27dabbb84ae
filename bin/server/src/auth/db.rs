//! PostgreSQL user store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tkj_learning_core::{Result, UserId};
use tkj_learning_platform_access::{LinkedAccount, Role, StorageError, User, UserStore};
use tracing::{error, instrument};

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: Option<String>,
    image: Option<String>,
    role: Option<String>,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> std::result::Result<User, StorageError> {
        let id = UserId::from_str(&self.id).map_err(|e| StorageError::InvalidRecord {
            details: format!("invalid user id '{}': {e}", self.id),
        })?;
        let role = self
            .role
            .map(|value| {
                Role::from_str(&value).map_err(|_| StorageError::InvalidRole { value })
            })
            .transpose()?;

        Ok(User::with_all_fields(
            id,
            self.email,
            self.name,
            self.image,
            role,
            self.email_verified_at,
            self.created_at,
            self.updated_at,
        ))
    }
}

const USER_COLUMNS: &str =
    "u.id, u.email, u.name, u.image, u.role, u.email_verified_at, u.created_at, u.updated_at";

fn storage_error(e: sqlx::Error) -> StorageError {
    let unique_violation = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());

    if unique_violation {
        return StorageError::Conflict {
            details: e.to_string(),
        };
    }
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable {
                details: e.to_string(),
            }
        }
        other => StorageError::QueryFailed {
            details: other.to_string(),
        },
    }
}

fn fail(e: sqlx::Error) -> Report<StorageError> {
    let err = storage_error(e);
    error!(error = %err, "User store query failed");
    err.into()
}

/// User store backed by the `users` and `accounts` tables.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(row: Option<UserRow>) -> Result<Option<User>, StorageError> {
        match row {
            Some(r) => Ok(Some(r.try_into_user().map_err(|e| {
                error!(error = %e, "Stored user rejected");
                Report::from(e)
            })?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(fail)?;

        Self::decode(row)
    }

    #[instrument(skip(self))]
    async fn set_user_role(&self, email: &str, role: Role) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(fail)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::QueryFailed {
                details: format!("no user with email '{email}'"),
            }
            .into());
        }
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    async fn create_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, image, role, email_verified_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.email())
        .bind(user.name())
        .bind(user.image())
        .bind(user.role().map(|r| r.as_str()))
        .bind(user.email_verified_at())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(fail)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u \
             JOIN accounts a ON a.user_id = u.id \
             WHERE a.provider = $1 AND a.provider_account_id = $2"
        ))
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(fail)?;

        Self::decode(row)
    }

    #[instrument(skip(self, account), fields(provider = %account.provider, user_id = %account.user_id))]
    async fn link_account(&self, account: &LinkedAccount) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (provider, provider_account_id, user_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(account.user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(fail)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_email_verified(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(fail)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: Option<&str>) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: UserId::new().to_string(),
            email: "a@b.com".to_string(),
            name: Some("Budi".to_string()),
            image: None,
            role: role.map(str::to_string),
            email_verified_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_with_known_role_decodes() {
        let user = row(Some("TKJ2")).try_into_user().expect("decode");
        assert_eq!(user.role(), Some(Role::Tkj2));
        assert_eq!(user.name(), Some("Budi"));
    }

    #[test]
    fn row_without_role_decodes_to_none() {
        let user = row(None).try_into_user().expect("decode");
        assert!(user.role().is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = row(Some("ADMIN")).try_into_user().unwrap_err();
        assert_eq!(
            err,
            StorageError::InvalidRole {
                value: "ADMIN".to_string()
            }
        );
    }

    #[test]
    fn malformed_id_is_rejected() {
        let mut bad = row(Some("VISITOR"));
        bad.id = "not-an-id".to_string();
        assert!(matches!(
            bad.try_into_user(),
            Err(StorageError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn pool_timeouts_mean_unavailable() {
        assert!(matches!(
            storage_error(sqlx::Error::PoolTimedOut),
            StorageError::Unavailable { .. }
        ));
        assert!(matches!(
            storage_error(sqlx::Error::RowNotFound),
            StorageError::QueryFailed { .. }
        ));
    }
}
