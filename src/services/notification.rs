//! In-app notifications
//!
//! Other services call [`NotificationService::notify_employee`] and friends
//! as a side effect; those calls log failures instead of returning them, so a
//! notification problem never undoes the action that triggered it.

use crate::db::repositories::{NewNotification, NotificationRepository, UserRepository};
use crate::models::{ListParams, Notification, NotificationKind, PagedResult};
use crate::services::error::{OrNotFound, ServiceResult};
use anyhow::Context;
use std::sync::Arc;

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { repo, user_repo }
    }

    pub async fn notify(
        &self,
        user_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> ServiceResult<Notification> {
        let notification = self
            .repo
            .create(&NewNotification {
                user_id,
                kind,
                title: title.to_string(),
                message: message.to_string(),
                link: link.map(str::to_string),
            })
            .await
            .context("Failed to create notification")?;
        Ok(notification)
    }

    /// Notify a user, logging instead of failing
    pub async fn notify_user(
        &self,
        user_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) {
        if let Err(e) = self.notify(user_id, kind, title, message, link).await {
            tracing::warn!(user_id, kind = %kind, "Failed to notify user: {}", e);
        }
    }

    /// Notify the account linked to an employee, if there is one
    pub async fn notify_employee(
        &self,
        employee_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) {
        match self.user_repo.get_by_employee_id(employee_id).await {
            Ok(Some(user)) => self.notify_user(user.id, kind, title, message, link).await,
            Ok(None) => tracing::debug!(employee_id, "Employee has no account, notification skipped"),
            Err(e) => tracing::warn!(employee_id, "Failed to look up employee account: {:#}", e),
        }
    }

    pub async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Notification>> {
        let (items, total) = self
            .repo
            .list(user_id, unread_only, params)
            .await
            .context("Failed to list notifications")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn unread_count(&self, user_id: i64) -> ServiceResult<i64> {
        Ok(self
            .repo
            .unread_count(user_id)
            .await
            .context("Failed to count notifications")?)
    }

    pub async fn mark_read(&self, user_id: i64, id: i64) -> ServiceResult<()> {
        self.owned(user_id, id).await?;
        self.repo.mark_read(id).await.context("Failed to mark notification read")?;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: i64) -> ServiceResult<i64> {
        Ok(self
            .repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")?)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> ServiceResult<()> {
        self.owned(user_id, id).await?;
        self.repo.delete(id).await.context("Failed to delete notification")?;
        Ok(())
    }

    /// Someone else's notification looks the same as a missing one
    async fn owned(&self, user_id: i64, id: i64) -> ServiceResult<Notification> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get notification")?
            .filter(|n| n.user_id == user_id)
            .or_not_found("Notification", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, insert_user, setup_pool};
    use crate::db::repositories::{SqlxNotificationRepository, SqlxUserRepository};
    use crate::models::UserRole;
    use crate::services::error::ServiceError;

    #[tokio::test]
    async fn test_notify_and_read() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "alice", UserRole::Employee, None).await;
        let service = NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );

        let first = service
            .notify(user.id, NotificationKind::General, "Hello", "Welcome aboard", None)
            .await
            .unwrap();
        service
            .notify(user.id, NotificationKind::General, "Again", "Second", Some("/home"))
            .await
            .unwrap();
        assert_eq!(service.unread_count(user.id).await.unwrap(), 2);

        service.mark_read(user.id, first.id).await.unwrap();
        let unread = service.list(user.id, true, &ListParams::default()).await.unwrap();
        assert_eq!(unread.total, 1);
        assert_eq!(unread.items[0].link.as_deref(), Some("/home"));

        assert_eq!(service.mark_all_read(user.id).await.unwrap(), 1);
        assert_eq!(service.unread_count(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cannot_touch_other_users_notifications() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "alice", UserRole::Employee, None).await;
        let bob = insert_user(&pool, "bob", UserRole::Employee, None).await;
        let service = NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );

        let note = service
            .notify(alice.id, NotificationKind::General, "Private", "For Alice", None)
            .await
            .unwrap();
        assert!(matches!(service.mark_read(bob.id, note.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(bob.id, note.id).await, Err(ServiceError::NotFound(_))));

        service.delete(alice.id, note.id).await.unwrap();
        assert_eq!(service.unread_count(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_notify_employee_uses_linked_account() {
        let pool = setup_pool().await;
        let linked = insert_employee(&pool, "Ada", "Lovelace").await;
        let unlinked = insert_employee(&pool, "Alan", "Turing").await;
        let user = insert_user(&pool, "ada", UserRole::Employee, Some(linked.id)).await;
        let service = NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );

        service
            .notify_employee(linked.id, NotificationKind::PayslipIssued, "Paid", "Salary paid", None)
            .await;
        service
            .notify_employee(unlinked.id, NotificationKind::PayslipIssued, "Paid", "Salary paid", None)
            .await;

        assert_eq!(service.unread_count(user.id).await.unwrap(), 1);
    }
}
