//! Password reset token repository

use crate::db::DynDatabasePool;
use crate::models::PasswordReset;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(&self, reset: &PasswordReset) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<PasswordReset>>;

    async fn mark_used(&self, token: &str) -> Result<()>;

    /// Drop tokens that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<i64>;
}

pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(&self, reset: &PasswordReset) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query(
                "INSERT INTO password_resets (token, user_id, expires_at, used, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&reset.token)
            .bind(reset.user_id)
            .bind(reset.expires_at)
            .bind(reset.used)
            .bind(reset.created_at)
            .execute(pool)
            .await
            .context("Failed to store password reset token")?;
        });
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<PasswordReset>> {
        with_pool!(self.pool, pool => {
            let row = sqlx::query(
                "SELECT token, user_id, expires_at, used, created_at FROM password_resets WHERE token = ?",
            )
            .bind(token)
            .fetch_optional(pool)
            .await
            .context("Failed to get password reset token")?;
            Ok(row.map(|row| PasswordReset {
                token: row.get("token"),
                user_id: row.get("user_id"),
                expires_at: row.get("expires_at"),
                used: row.get("used"),
                created_at: row.get("created_at"),
            }))
        })
    }

    async fn mark_used(&self, token: &str) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("UPDATE password_resets SET used = ? WHERE token = ?")
                .bind(true)
                .bind(token)
                .execute(pool)
                .await
                .context("Failed to mark password reset token used")?;
        });
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<i64> {
        with_pool!(self.pool, pool => {
            let result = sqlx::query("DELETE FROM password_resets WHERE expires_at < ? OR used = ?")
                .bind(now)
                .bind(true)
                .execute(pool)
                .await
                .context("Failed to delete expired password reset tokens")?;
            Ok(result.rows_affected() as i64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::models::UserRole;
    use chrono::Duration;

    #[tokio::test]
    async fn test_token_lifecycle() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "alice", UserRole::Employee, None).await;
        let repo = SqlxPasswordResetRepository::new(pool);
        let now = Utc::now();

        repo.create(&PasswordReset {
            token: "tok".to_string(),
            user_id: user.id,
            expires_at: now + Duration::hours(1),
            used: false,
            created_at: now,
        })
        .await
        .unwrap();

        let found = repo.get("tok").await.unwrap().unwrap();
        assert!(found.is_usable(now));

        repo.mark_used("tok").await.unwrap();
        let found = repo.get("tok").await.unwrap().unwrap();
        assert!(!found.is_usable(now));

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.get("tok").await.unwrap().is_none());
    }
}
