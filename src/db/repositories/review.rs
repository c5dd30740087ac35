//! Performance review repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{PerformanceReview, ReviewFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const REVIEW_COLUMNS: &str = "id, employee_id, reviewer_id, period, rating, strengths, improvements, \
     comments, status, submitted_at, acknowledged_at, created_at, updated_at";

macro_rules! review_from_row {
    ($row:expr) => {
        PerformanceReview {
            id: $row.get("id"),
            employee_id: $row.get("employee_id"),
            reviewer_id: $row.get("reviewer_id"),
            period: $row.get("period"),
            rating: $row.get("rating"),
            strengths: $row.get("strengths"),
            improvements: $row.get("improvements"),
            comments: $row.get("comments"),
            status: parse_column($row.get("status"), "status")?,
            submitted_at: $row.get("submitted_at"),
            acknowledged_at: $row.get("acknowledged_at"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, review: &PerformanceReview) -> Result<PerformanceReview>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PerformanceReview>>;

    /// The review of an employee for a period
    async fn get_by_period(&self, employee_id: i64, period: &str) -> Result<Option<PerformanceReview>>;

    async fn update(&self, review: &PerformanceReview) -> Result<PerformanceReview>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest periods first
    async fn list(&self, filter: &ReviewFilter) -> Result<Vec<PerformanceReview>>;
}

pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create(&self, review: &PerformanceReview) -> Result<PerformanceReview> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO performance_reviews (employee_id, reviewer_id, period, rating, strengths, improvements,
                    comments, status, submitted_at, acknowledged_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(review.employee_id)
            .bind(review.reviewer_id)
            .bind(&review.period)
            .bind(review.rating)
            .bind(&review.strengths)
            .bind(&review.improvements)
            .bind(&review.comments)
            .bind(review.status.as_str())
            .bind(review.submitted_at)
            .bind(review.acknowledged_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create performance review")?
            .inserted_id()
        });

        Ok(PerformanceReview {
            id,
            created_at: now,
            updated_at: now,
            ..review.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PerformanceReview>> {
        let sql = format!("SELECT {} FROM performance_reviews WHERE id = ?", REVIEW_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get performance review")?;
            match row {
                Some(row) => Ok(Some(review_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_period(&self, employee_id: i64, period: &str) -> Result<Option<PerformanceReview>> {
        let sql = format!(
            "SELECT {} FROM performance_reviews WHERE employee_id = ? AND period = ?",
            REVIEW_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(employee_id)
                .bind(period)
                .fetch_optional(pool)
                .await
                .context("Failed to get performance review by period")?;
            match row {
                Some(row) => Ok(Some(review_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, review: &PerformanceReview) -> Result<PerformanceReview> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE performance_reviews
                SET rating = ?, strengths = ?, improvements = ?, comments = ?, status = ?,
                    submitted_at = ?, acknowledged_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(review.rating)
            .bind(&review.strengths)
            .bind(&review.improvements)
            .bind(&review.comments)
            .bind(review.status.as_str())
            .bind(review.submitted_at)
            .bind(review.acknowledged_at)
            .bind(now)
            .bind(review.id)
            .execute(pool)
            .await
            .context("Failed to update performance review")?;
        });

        Ok(PerformanceReview {
            updated_at: now,
            ..review.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM performance_reviews WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete performance review")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &ReviewFilter) -> Result<Vec<PerformanceReview>> {
        let sql = format!(
            r#"
            SELECT {} FROM performance_reviews
            WHERE (? IS NULL OR employee_id = ?) AND (? IS NULL OR status = ?) AND (? IS NULL OR period = ?)
            ORDER BY period DESC, id DESC
            "#,
            REVIEW_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());
        let period = filter.period.as_deref();
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(filter.employee_id)
                .bind(filter.employee_id)
                .bind(status)
                .bind(status)
                .bind(period)
                .bind(period)
                .fetch_all(pool)
                .await
                .context("Failed to list performance reviews")?;
            let mut reviews = Vec::with_capacity(rows.len());
            for row in rows {
                reviews.push(review_from_row!(row));
            }
            Ok(reviews)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::models::ReviewStatus;

    fn review(employee_id: i64, period: &str) -> PerformanceReview {
        let now = Utc::now();
        PerformanceReview {
            id: 0,
            employee_id,
            reviewer_id: None,
            period: period.to_string(),
            rating: 4,
            strengths: Some("Ownership".to_string()),
            improvements: None,
            comments: None,
            status: ReviewStatus::Draft,
            submitted_at: None,
            acknowledged_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_one_review_per_period() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxReviewRepository::new(pool);

        repo.create(&review(employee.id, "2024-H1")).await.unwrap();
        let err = repo.create(&review(employee.id, "2024-H1")).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));

        let found = repo.get_by_period(employee.id, "2024-H1").await.unwrap();
        assert_eq!(found.map(|r| r.rating), Some(4));
    }

    #[tokio::test]
    async fn test_submit_and_filter_by_status() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxReviewRepository::new(pool);

        let mut first = repo.create(&review(employee.id, "2023-H2")).await.unwrap();
        repo.create(&review(employee.id, "2024-H1")).await.unwrap();

        first.status = ReviewStatus::Submitted;
        first.submitted_at = Some(Utc::now());
        repo.update(&first).await.unwrap();

        let filter = ReviewFilter {
            status: Some(ReviewStatus::Submitted),
            ..Default::default()
        };
        let submitted = repo.list(&filter).await.unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].period, "2023-H2");

        let all = repo.list(&ReviewFilter::default()).await.unwrap();
        assert_eq!(all[0].period, "2024-H1");
    }
}
