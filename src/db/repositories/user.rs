//! User repository
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{ListParams, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, status, employee_id, created_at, updated_at";

macro_rules! user_from_row {
    ($row:expr) => {
        User {
            id: $row.get("id"),
            username: $row.get("username"),
            email: $row.get("email"),
            password_hash: $row.get("password_hash"),
            role: parse_column($row.get("role"), "role")?,
            status: parse_column($row.get("status"), "status")?,
            employee_id: $row.get("employee_id"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Account linked to an employee record
    async fn get_by_employee_id(&self, employee_id: i64) -> Result<Option<User>>;

    /// Persist every mutable column of `user`
    async fn update(&self, user: &User) -> Result<User>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// List users, newest first
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;

    /// Active users holding `role`
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &str, value: FindValue<'_>) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        with_pool!(self.pool, pool => {
            let query = sqlx::query(&sql);
            let query = match value {
                FindValue::Id(id) => query.bind(id),
                FindValue::Text(text) => query.bind(text),
            };
            let row = query
                .fetch_optional(pool)
                .await
                .with_context(|| format!("Failed to get user by {}", column))?;
            match row {
                Some(row) => Ok(Some(user_from_row!(row))),
                None => Ok(None),
            }
        })
    }
}

enum FindValue<'a> {
    Id(i64),
    Text(&'a str),
}


#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash, role, status, employee_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(user.employee_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.find_one("id", FindValue::Id(id)).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_one("username", FindValue::Text(username)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", FindValue::Text(email)).await
    }

    async fn get_by_employee_id(&self, employee_id: i64) -> Result<Option<User>> {
        self.find_one("employee_id", FindValue::Id(employee_id)).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE users
                SET username = ?, email = ?, password_hash = ?, role = ?, status = ?, employee_id = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(user.employee_id)
            .bind(now)
            .bind(user.id)
            .execute(pool)
            .await
            .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, pool => {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?;
            Ok(row.get("count"))
        })
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS
        );
        let users = with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list users")?;
            let mut users = Vec::with_capacity(rows.len());
            for row in rows {
                users.push(user_from_row!(row));
            }
            users
        });

        Ok((users, self.count().await?))
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = ? AND status = 'active' ORDER BY id",
            USER_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(role.as_str())
                .fetch_all(pool)
                .await
                .context("Failed to list users by role")?;
            let mut users = Vec::with_capacity(rows.len());
            for row in rows {
                users.push(user_from_row!(row));
            }
            Ok(users)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::models::UserStatus;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn create_test_user(username: &str, role: UserRole) -> User {
        User::new(
            username.to_string(),
            format!("{}@example.com", username),
            "$argon2id$v=19$m=19456,t=2,p=1$salt$hash".to_string(),
            role,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&create_test_user("alice", UserRole::Hr)).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.role, UserRole::Hr);
        assert_eq!(found.status, UserStatus::Active);

        assert!(repo.get_by_username("alice").await.unwrap().is_some());
        assert!(repo.get_by_email("alice@example.com").await.unwrap().is_some());
        assert!(repo.get_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_user("alice", UserRole::Employee)).await.unwrap();

        let mut dup = create_test_user("alice", UserRole::Employee);
        dup.email = "other@example.com".to_string();
        let err = repo.create(&dup).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_link_employee_and_lookup() {
        let (pool, repo) = setup_test_repo().await;
        let employee = insert_employee(&pool, "Grace", "Hopper").await;

        let mut user = repo.create(&create_test_user("grace", UserRole::Employee)).await.unwrap();
        user.employee_id = Some(employee.id);
        repo.update(&user).await.unwrap();

        let found = repo.get_by_employee_id(employee.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_update_role_and_status() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo.create(&create_test_user("carol", UserRole::Employee)).await.unwrap();

        user.role = UserRole::Manager;
        user.status = UserStatus::Disabled;
        let updated = repo.update(&user).await.unwrap();

        assert_eq!(updated.role, UserRole::Manager);
        assert_eq!(updated.status, UserStatus::Disabled);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let (_pool, repo) = setup_test_repo().await;
        for name in ["a1", "a2", "a3"] {
            repo.create(&create_test_user(name, UserRole::Employee)).await.unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 3);

        let (page, total) = repo.list(&ListParams::new(1, 2)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_list_by_role_skips_disabled() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_user("hr1", UserRole::Hr)).await.unwrap();
        let mut hr2 = repo.create(&create_test_user("hr2", UserRole::Hr)).await.unwrap();
        hr2.status = UserStatus::Disabled;
        repo.update(&hr2).await.unwrap();
        repo.create(&create_test_user("emp", UserRole::Employee)).await.unwrap();

        let hr = repo.list_by_role(UserRole::Hr).await.unwrap();
        assert_eq!(hr.len(), 1);
        assert_eq!(hr[0].username, "hr1");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&create_test_user("dave", UserRole::Employee)).await.unwrap();

        repo.delete(user.id).await.unwrap();
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }
}
