//! Interview repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{Interview, InterviewFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const INTERVIEW_COLUMNS: &str = "id, application_id, interviewer_id, scheduled_at, duration_minutes, \
     location, status, feedback, rating, created_at, updated_at";

macro_rules! interview_from_row {
    ($row:expr) => {
        Interview {
            id: $row.get("id"),
            application_id: $row.get("application_id"),
            interviewer_id: $row.get("interviewer_id"),
            scheduled_at: $row.get("scheduled_at"),
            duration_minutes: $row.get("duration_minutes"),
            location: $row.get("location"),
            status: parse_column($row.get("status"), "status")?,
            feedback: $row.get("feedback"),
            rating: $row.get("rating"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait InterviewRepository: Send + Sync {
    async fn create(&self, interview: &Interview) -> Result<Interview>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Interview>>;

    async fn update(&self, interview: &Interview) -> Result<Interview>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Interviews in schedule order. The time window is applied after
    /// loading, since stored timestamps are compared as instants.
    async fn list(&self, filter: &InterviewFilter) -> Result<Vec<Interview>>;
}

pub struct SqlxInterviewRepository {
    pool: DynDatabasePool,
}

impl SqlxInterviewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InterviewRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl InterviewRepository for SqlxInterviewRepository {
    async fn create(&self, interview: &Interview) -> Result<Interview> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO interviews (application_id, interviewer_id, scheduled_at, duration_minutes, location,
                    status, feedback, rating, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(interview.application_id)
            .bind(interview.interviewer_id)
            .bind(interview.scheduled_at)
            .bind(interview.duration_minutes)
            .bind(&interview.location)
            .bind(interview.status.as_str())
            .bind(&interview.feedback)
            .bind(interview.rating)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create interview")?
            .inserted_id()
        });

        Ok(Interview {
            id,
            created_at: now,
            updated_at: now,
            ..interview.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Interview>> {
        let sql = format!("SELECT {} FROM interviews WHERE id = ?", INTERVIEW_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get interview")?;
            match row {
                Some(row) => Ok(Some(interview_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, interview: &Interview) -> Result<Interview> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE interviews
                SET interviewer_id = ?, scheduled_at = ?, duration_minutes = ?, location = ?, status = ?,
                    feedback = ?, rating = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(interview.interviewer_id)
            .bind(interview.scheduled_at)
            .bind(interview.duration_minutes)
            .bind(&interview.location)
            .bind(interview.status.as_str())
            .bind(&interview.feedback)
            .bind(interview.rating)
            .bind(now)
            .bind(interview.id)
            .execute(pool)
            .await
            .context("Failed to update interview")?;
        });

        Ok(Interview {
            updated_at: now,
            ..interview.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM interviews WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete interview")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &InterviewFilter) -> Result<Vec<Interview>> {
        let sql = format!(
            r#"
            SELECT {} FROM interviews
            WHERE (? IS NULL OR application_id = ?) AND (? IS NULL OR interviewer_id = ?) AND (? IS NULL OR status = ?)
            ORDER BY id
            "#,
            INTERVIEW_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());
        let mut interviews = with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(filter.application_id)
                .bind(filter.application_id)
                .bind(filter.interviewer_id)
                .bind(filter.interviewer_id)
                .bind(status)
                .bind(status)
                .fetch_all(pool)
                .await
                .context("Failed to list interviews")?;
            let mut interviews = Vec::with_capacity(rows.len());
            for row in rows {
                interviews.push(interview_from_row!(row));
            }
            interviews
        });

        interviews.retain(|i| {
            filter.from.map_or(true, |from| i.ends_at() > from)
                && filter.to.map_or(true, |to| i.scheduled_at < to)
        });
        interviews.sort_by_key(|i| (i.scheduled_at, i.id));
        Ok(interviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::candidate::sample_candidate;
    use crate::db::repositories::job::sample_job;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::db::repositories::{
        ApplicationRepository, CandidateRepository, JobRepository, SqlxApplicationRepository,
        SqlxCandidateRepository, SqlxJobRepository,
    };
    use crate::models::InterviewStatus;
    use chrono::{DateTime, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, hour, 0, 0).unwrap()
    }

    fn interview(application_id: i64, interviewer_id: i64, hour: u32) -> Interview {
        Interview {
            id: 0,
            application_id,
            interviewer_id,
            scheduled_at: at(hour),
            duration_minutes: 60,
            location: None,
            status: InterviewStatus::Scheduled,
            feedback: None,
            rating: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    async fn setup() -> (SqlxInterviewRepository, i64, i64) {
        let pool = setup_pool().await;
        let job = SqlxJobRepository::new(pool.clone())
            .create(&sample_job("Backend Engineer"))
            .await
            .unwrap();
        let candidate = SqlxCandidateRepository::new(pool.clone())
            .create(&sample_candidate("Linus", "Torvalds"))
            .await
            .unwrap();
        let application = SqlxApplicationRepository::new(pool.clone())
            .create(job.id, candidate.id, None)
            .await
            .unwrap();
        let interviewer = insert_employee(&pool, "Ada", "Lovelace").await;
        (SqlxInterviewRepository::new(pool), application.id, interviewer.id)
    }

    #[tokio::test]
    async fn test_complete_with_feedback() {
        let (repo, application, interviewer) = setup().await;
        let mut created = repo.create(&interview(application, interviewer, 10)).await.unwrap();

        created.status = InterviewStatus::Completed;
        created.feedback = Some("Strong systems background".to_string());
        created.rating = Some(5);
        repo.update(&created).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, InterviewStatus::Completed);
        assert_eq!(found.rating, Some(5));
        assert_eq!(found.scheduled_at, at(10));
    }

    #[tokio::test]
    async fn test_list_window_and_order() {
        let (repo, application, interviewer) = setup().await;
        repo.create(&interview(application, interviewer, 15)).await.unwrap();
        repo.create(&interview(application, interviewer, 9)).await.unwrap();
        repo.create(&interview(application, interviewer, 12)).await.unwrap();

        let filter = InterviewFilter {
            interviewer_id: Some(interviewer),
            from: Some(at(9) + chrono::Duration::minutes(30)),
            to: Some(at(13)),
            ..Default::default()
        };
        let hours: Vec<_> = repo
            .list(&filter)
            .await
            .unwrap()
            .iter()
            .map(|i| i.scheduled_at)
            .collect();
        assert_eq!(hours, vec![at(9), at(12)]);
    }
}
