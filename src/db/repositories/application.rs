//! Job application repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{Application, ApplicationFilter, ApplicationStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const APPLICATION_COLUMNS: &str =
    "id, job_id, candidate_id, status, cover_letter, created_at, updated_at";

macro_rules! application_from_row {
    ($row:expr) => {
        Application {
            id: $row.get("id"),
            job_id: $row.get("job_id"),
            candidate_id: $row.get("candidate_id"),
            status: parse_column($row.get("status"), "status")?,
            cover_letter: $row.get("cover_letter"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create(
        &self,
        job_id: i64,
        candidate_id: i64,
        cover_letter: Option<&str>,
    ) -> Result<Application>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Application>>;

    /// A candidate's application to a job, if any
    async fn get_by_job_candidate(&self, job_id: i64, candidate_id: i64) -> Result<Option<Application>>;

    async fn update_status(&self, id: i64, status: ApplicationStatus) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest applications first
    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>>;

    /// Applications of a job currently in `status`
    async fn count_for_job(&self, job_id: i64, status: ApplicationStatus) -> Result<i64>;
}

pub struct SqlxApplicationRepository {
    pool: DynDatabasePool,
}

impl SqlxApplicationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ApplicationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ApplicationRepository for SqlxApplicationRepository {
    async fn create(
        &self,
        job_id: i64,
        candidate_id: i64,
        cover_letter: Option<&str>,
    ) -> Result<Application> {
        let now = Utc::now();
        let status = ApplicationStatus::Applied;
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO applications (job_id, candidate_id, status, cover_letter, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(job_id)
            .bind(candidate_id)
            .bind(status.as_str())
            .bind(cover_letter)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create application")?
            .inserted_id()
        });

        Ok(Application {
            id,
            job_id,
            candidate_id,
            status,
            cover_letter: cover_letter.map(str::to_string),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Application>> {
        let sql = format!("SELECT {} FROM applications WHERE id = ?", APPLICATION_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get application")?;
            match row {
                Some(row) => Ok(Some(application_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_job_candidate(&self, job_id: i64, candidate_id: i64) -> Result<Option<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE job_id = ? AND candidate_id = ?",
            APPLICATION_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(job_id)
                .bind(candidate_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get application")?;
            match row {
                Some(row) => Ok(Some(application_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update_status(&self, id: i64, status: ApplicationStatus) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query("UPDATE applications SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update application status")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM applications WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete application")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let sql = format!(
            r#"
            SELECT {} FROM applications
            WHERE (? IS NULL OR job_id = ?) AND (? IS NULL OR candidate_id = ?) AND (? IS NULL OR status = ?)
            ORDER BY created_at DESC, id DESC
            "#,
            APPLICATION_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(filter.job_id)
                .bind(filter.job_id)
                .bind(filter.candidate_id)
                .bind(filter.candidate_id)
                .bind(status)
                .bind(status)
                .fetch_all(pool)
                .await
                .context("Failed to list applications")?;
            let mut applications = Vec::with_capacity(rows.len());
            for row in rows {
                applications.push(application_from_row!(row));
            }
            Ok(applications)
        })
    }

    async fn count_for_job(&self, job_id: i64, status: ApplicationStatus) -> Result<i64> {
        with_pool!(self.pool, pool => {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM applications WHERE job_id = ? AND status = ?",
            )
            .bind(job_id)
            .bind(status.as_str())
            .fetch_one(pool)
            .await
            .context("Failed to count applications")?;
            Ok(row.get("count"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::candidate::sample_candidate;
    use crate::db::repositories::job::sample_job;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{
        CandidateRepository, JobRepository, SqlxCandidateRepository, SqlxJobRepository,
    };

    async fn setup() -> (SqlxApplicationRepository, i64, i64, i64) {
        let pool = setup_pool().await;
        let job = SqlxJobRepository::new(pool.clone())
            .create(&sample_job("Backend Engineer"))
            .await
            .unwrap();
        let candidates = SqlxCandidateRepository::new(pool.clone());
        let a = candidates.create(&sample_candidate("Linus", "Torvalds")).await.unwrap();
        let b = candidates.create(&sample_candidate("Margaret", "Hamilton")).await.unwrap();
        (SqlxApplicationRepository::new(pool), job.id, a.id, b.id)
    }

    #[tokio::test]
    async fn test_one_application_per_job_and_candidate() {
        let (repo, job, linus, _) = setup().await;
        let created = repo.create(job, linus, Some("Hello")).await.unwrap();
        assert_eq!(created.status, ApplicationStatus::Applied);

        let err = repo.create(job, linus, None).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));

        let found = repo.get_by_job_candidate(job, linus).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.cover_letter.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_status_updates_and_counts() {
        let (repo, job, linus, margaret) = setup().await;
        let a = repo.create(job, linus, None).await.unwrap();
        repo.create(job, margaret, None).await.unwrap();

        repo.update_status(a.id, ApplicationStatus::Hired).await.unwrap();
        assert_eq!(repo.count_for_job(job, ApplicationStatus::Hired).await.unwrap(), 1);
        assert_eq!(repo.count_for_job(job, ApplicationStatus::Applied).await.unwrap(), 1);

        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::Applied),
            ..Default::default()
        };
        let open = repo.list(&filter).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].candidate_id, margaret);
    }
}
