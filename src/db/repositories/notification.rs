//! In-app notification repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{ListParams, Notification, NotificationKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, link, is_read, created_at";

macro_rules! notification_from_row {
    ($row:expr) => {
        Notification {
            id: $row.get("id"),
            user_id: $row.get("user_id"),
            kind: parse_column($row.get("kind"), "kind")?,
            title: $row.get("title"),
            message: $row.get("message"),
            link: $row.get("link"),
            is_read: $row.get("is_read"),
            created_at: $row.get("created_at"),
        }
    };
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// A user's notifications, newest first
    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    async fn mark_read(&self, id: i64) -> Result<()>;

    /// Mark every notification of a user read, returning how many changed
    async fn mark_all_read(&self, user_id: i64) -> Result<i64>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO notifications (user_id, kind, title, message, link, is_read, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(notification.user_id)
            .bind(notification.kind.as_str())
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.link)
            .bind(false)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create notification")?
            .inserted_id()
        });

        Ok(Notification {
            id,
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title.clone(),
            message: notification.message.clone(),
            link: notification.link.clone(),
            is_read: false,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let sql = format!("SELECT {} FROM notifications WHERE id = ?", NOTIFICATION_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get notification")?;
            match row {
                Some(row) => Ok(Some(notification_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)> {
        let filter = "user_id = ? AND (? = 0 OR is_read = 0)";
        let sql = format!(
            "SELECT {} FROM notifications WHERE {} ORDER BY id DESC LIMIT ? OFFSET ?",
            NOTIFICATION_COLUMNS, filter
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM notifications WHERE {}", filter);
        let unread_only = i64::from(unread_only);

        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(unread_only)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list notifications")?;
            let total: i64 = sqlx::query(&count_sql)
                .bind(user_id)
                .bind(unread_only)
                .fetch_one(pool)
                .await
                .context("Failed to count notifications")?
                .get("count");

            let mut notifications = Vec::with_capacity(rows.len());
            for row in rows {
                notifications.push(notification_from_row!(row));
            }
            Ok((notifications, total))
        })
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        with_pool!(self.pool, pool => {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM notifications WHERE user_id = ? AND is_read = 0",
            )
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to count unread notifications")?;
            Ok(row.get("count"))
        })
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to mark notification read")?;
        });
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<i64> {
        with_pool!(self.pool, pool => {
            let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to mark notifications read")?;
            Ok(result.rows_affected() as i64)
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM notifications WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete notification")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::models::UserRole;

    fn note(user_id: i64, title: &str) -> NewNotification {
        NewNotification {
            user_id,
            kind: NotificationKind::General,
            title: title.to_string(),
            message: "Body".to_string(),
            link: None,
        }
    }

    #[tokio::test]
    async fn test_unread_tracking() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "alice", UserRole::Employee, None).await;
        let other = insert_user(&pool, "bob", UserRole::Employee, None).await;
        let repo = SqlxNotificationRepository::new(pool);

        let first = repo.create(&note(user.id, "one")).await.unwrap();
        repo.create(&note(user.id, "two")).await.unwrap();
        repo.create(&note(other.id, "theirs")).await.unwrap();
        assert_eq!(repo.unread_count(user.id).await.unwrap(), 2);

        repo.mark_read(first.id).await.unwrap();
        assert_eq!(repo.unread_count(user.id).await.unwrap(), 1);

        let (unread, total) = repo.list(user.id, true, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(unread[0].title, "two");

        let (all, total) = repo.list(user.id, false, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(all[0].title, "two");
        assert!(all[1].is_read);
    }

    #[tokio::test]
    async fn test_mark_all_read_scoped_to_user() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "alice", UserRole::Employee, None).await;
        let other = insert_user(&pool, "bob", UserRole::Employee, None).await;
        let repo = SqlxNotificationRepository::new(pool);

        repo.create(&note(user.id, "one")).await.unwrap();
        repo.create(&note(user.id, "two")).await.unwrap();
        repo.create(&note(other.id, "theirs")).await.unwrap();

        assert_eq!(repo.mark_all_read(user.id).await.unwrap(), 2);
        assert_eq!(repo.unread_count(user.id).await.unwrap(), 0);
        assert_eq!(repo.unread_count(other.id).await.unwrap(), 1);
    }
}
