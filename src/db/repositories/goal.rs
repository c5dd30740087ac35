//! Goal repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{Goal, GoalFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const GOAL_COLUMNS: &str =
    "id, employee_id, title, description, due_date, progress, status, created_by, created_at, updated_at";

macro_rules! goal_from_row {
    ($row:expr) => {
        Goal {
            id: $row.get("id"),
            employee_id: $row.get("employee_id"),
            title: $row.get("title"),
            description: $row.get("description"),
            due_date: $row.get("due_date"),
            progress: $row.get("progress"),
            status: parse_column($row.get("status"), "status")?,
            created_by: $row.get("created_by"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn create(&self, goal: &Goal) -> Result<Goal>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Goal>>;

    async fn update(&self, goal: &Goal) -> Result<Goal>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Goals by due date, undated goals last
    async fn list(&self, filter: &GoalFilter) -> Result<Vec<Goal>>;
}

pub struct SqlxGoalRepository {
    pool: DynDatabasePool,
}

impl SqlxGoalRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GoalRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GoalRepository for SqlxGoalRepository {
    async fn create(&self, goal: &Goal) -> Result<Goal> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO goals (employee_id, title, description, due_date, progress, status, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(goal.employee_id)
            .bind(&goal.title)
            .bind(&goal.description)
            .bind(goal.due_date)
            .bind(goal.progress)
            .bind(goal.status.as_str())
            .bind(goal.created_by)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create goal")?
            .inserted_id()
        });

        Ok(Goal {
            id,
            created_at: now,
            updated_at: now,
            ..goal.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Goal>> {
        let sql = format!("SELECT {} FROM goals WHERE id = ?", GOAL_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get goal")?;
            match row {
                Some(row) => Ok(Some(goal_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, goal: &Goal) -> Result<Goal> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE goals
                SET title = ?, description = ?, due_date = ?, progress = ?, status = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&goal.title)
            .bind(&goal.description)
            .bind(goal.due_date)
            .bind(goal.progress)
            .bind(goal.status.as_str())
            .bind(now)
            .bind(goal.id)
            .execute(pool)
            .await
            .context("Failed to update goal")?;
        });

        Ok(Goal {
            updated_at: now,
            ..goal.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM goals WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete goal")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &GoalFilter) -> Result<Vec<Goal>> {
        let sql = format!(
            r#"
            SELECT {} FROM goals
            WHERE (? IS NULL OR employee_id = ?) AND (? IS NULL OR status = ?)
            ORDER BY CASE WHEN due_date IS NULL THEN 1 ELSE 0 END, due_date, id
            "#,
            GOAL_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(filter.employee_id)
                .bind(filter.employee_id)
                .bind(status)
                .bind(status)
                .fetch_all(pool)
                .await
                .context("Failed to list goals")?;
            let mut goals = Vec::with_capacity(rows.len());
            for row in rows {
                goals.push(goal_from_row!(row));
            }
            Ok(goals)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::models::GoalStatus;
    use chrono::NaiveDate;

    fn goal(employee_id: i64, title: &str, due: Option<NaiveDate>) -> Goal {
        let now = Utc::now();
        Goal {
            id: 0,
            employee_id,
            title: title.to_string(),
            description: None,
            due_date: due,
            progress: 0,
            status: GoalStatus::NotStarted,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_progress_update_persists() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxGoalRepository::new(pool);

        let mut created = repo.create(&goal(employee.id, "Ship v2", None)).await.unwrap();
        created.progress = 40;
        created.status = GoalStatus::from_progress(40);
        repo.update(&created).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.progress, 40);
        assert_eq!(found.status, GoalStatus::InProgress);
    }

    #[tokio::test]
    async fn test_list_orders_by_due_date_with_undated_last() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let other = insert_employee(&pool, "Alan", "Turing").await;
        let repo = SqlxGoalRepository::new(pool);

        repo.create(&goal(employee.id, "someday", None)).await.unwrap();
        repo.create(&goal(employee.id, "late", NaiveDate::from_ymd_opt(2024, 9, 1))).await.unwrap();
        repo.create(&goal(employee.id, "early", NaiveDate::from_ymd_opt(2024, 3, 1))).await.unwrap();
        repo.create(&goal(other.id, "not mine", None)).await.unwrap();

        let filter = GoalFilter {
            employee_id: Some(employee.id),
            ..Default::default()
        };
        let titles: Vec<_> = repo
            .list(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.title)
            .collect();
        assert_eq!(titles, vec!["early", "late", "someday"]);
    }
}
