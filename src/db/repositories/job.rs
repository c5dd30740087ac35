//! Job posting repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{Job, JobFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use super::like_pattern;

const JOB_COLUMNS: &str = "id, title, department_id, description, location, employment_type, \
     openings, status, closed_at, created_at, updated_at";

macro_rules! job_from_row {
    ($row:expr) => {
        Job {
            id: $row.get("id"),
            title: $row.get("title"),
            department_id: $row.get("department_id"),
            description: $row.get("description"),
            location: $row.get("location"),
            employment_type: parse_column($row.get("employment_type"), "employment_type")?,
            openings: $row.get("openings"),
            status: parse_column($row.get("status"), "status")?,
            closed_at: $row.get("closed_at"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<Job>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Job>>;

    async fn update(&self, job: &Job) -> Result<Job>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest postings first
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;
}

pub struct SqlxJobRepository {
    pool: DynDatabasePool,
}

impl SqlxJobRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JobRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl JobRepository for SqlxJobRepository {
    async fn create(&self, job: &Job) -> Result<Job> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO jobs (title, department_id, description, location, employment_type, openings,
                    status, closed_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&job.title)
            .bind(job.department_id)
            .bind(&job.description)
            .bind(&job.location)
            .bind(job.employment_type.as_str())
            .bind(job.openings)
            .bind(job.status.as_str())
            .bind(job.closed_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create job")?
            .inserted_id()
        });

        Ok(Job {
            id,
            created_at: now,
            updated_at: now,
            ..job.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get job")?;
            match row {
                Some(row) => Ok(Some(job_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, job: &Job) -> Result<Job> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE jobs
                SET title = ?, department_id = ?, description = ?, location = ?, employment_type = ?,
                    openings = ?, status = ?, closed_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&job.title)
            .bind(job.department_id)
            .bind(&job.description)
            .bind(&job.location)
            .bind(job.employment_type.as_str())
            .bind(job.openings)
            .bind(job.status.as_str())
            .bind(job.closed_at)
            .bind(now)
            .bind(job.id)
            .execute(pool)
            .await
            .context("Failed to update job")?;
        });

        Ok(Job {
            updated_at: now,
            ..job.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM jobs WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete job")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let sql = format!(
            r#"
            SELECT {} FROM jobs
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR department_id = ?)
              AND (? IS NULL OR title LIKE ? OR location LIKE ?)
            ORDER BY created_at DESC, id DESC
            "#,
            JOB_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());
        let search = like_pattern(filter.search.as_deref());
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(status)
                .bind(status)
                .bind(filter.department_id)
                .bind(filter.department_id)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_all(pool)
                .await
                .context("Failed to list jobs")?;
            let mut jobs = Vec::with_capacity(rows.len());
            for row in rows {
                jobs.push(job_from_row!(row));
            }
            Ok(jobs)
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_job(title: &str) -> Job {
    let now = Utc::now();
    Job {
        id: 0,
        title: title.to_string(),
        department_id: None,
        description: "Build and run things".to_string(),
        location: Some("Remote".to_string()),
        employment_type: crate::models::EmploymentType::FullTime,
        openings: 1,
        status: crate::models::JobStatus::Open,
        closed_at: None,
        created_at: now,
        updated_at: now,
    }
}
