//! Login audit log repository

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{ListParams, LoginLog};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Fields recorded for a login attempt
#[derive(Debug, Clone, Default)]
pub struct NewLoginLog {
    pub username: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

#[async_trait]
pub trait LoginLogRepository: Send + Sync {
    async fn create(&self, entry: &NewLoginLog) -> Result<LoginLog>;

    /// Most recent attempts first
    async fn list(&self, params: &ListParams) -> Result<(Vec<LoginLog>, i64)>;
}

pub struct SqlxLoginLogRepository {
    pool: DynDatabasePool,
}

impl SqlxLoginLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LoginLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LoginLogRepository for SqlxLoginLogRepository {
    async fn create(&self, entry: &NewLoginLog) -> Result<LoginLog> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO login_logs (username, ip_address, user_agent, success, failure_reason, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.username)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.success)
            .bind(&entry.failure_reason)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to write login log")?
            .inserted_id()
        });

        Ok(LoginLog {
            id,
            username: entry.username.clone(),
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            success: entry.success,
            failure_reason: entry.failure_reason.clone(),
            created_at: now,
        })
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<LoginLog>, i64)> {
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(
                r#"
                SELECT id, username, ip_address, user_agent, success, failure_reason, created_at
                FROM login_logs
                ORDER BY id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list login logs")?;

            let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM login_logs")
                .fetch_one(pool)
                .await
                .context("Failed to count login logs")?
                .get("count");

            let logs = rows
                .iter()
                .map(|row| LoginLog {
                    id: row.get("id"),
                    username: row.get("username"),
                    ip_address: row.get("ip_address"),
                    user_agent: row.get("user_agent"),
                    success: row.get("success"),
                    failure_reason: row.get("failure_reason"),
                    created_at: row.get("created_at"),
                })
                .collect();
            Ok((logs, total))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;

    #[tokio::test]
    async fn test_write_and_list_attempts() {
        let repo = SqlxLoginLogRepository::new(setup_pool().await);

        repo.create(&NewLoginLog {
            username: "alice".to_string(),
            ip_address: Some("10.0.0.1".to_string()),
            success: false,
            failure_reason: Some("invalid password".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.create(&NewLoginLog {
            username: "alice".to_string(),
            success: true,
            ..Default::default()
        })
        .await
        .unwrap();

        let (logs, total) = repo.list(&ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert!(logs[0].success);
        assert_eq!(logs[1].failure_reason.as_deref(), Some("invalid password"));
    }
}
