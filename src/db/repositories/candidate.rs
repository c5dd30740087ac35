//! Candidate repository

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{Candidate, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use super::like_pattern;

const CANDIDATE_COLUMNS: &str =
    "id, first_name, last_name, email, phone, resume_path, source, notes, created_at, updated_at";

macro_rules! candidate_from_row {
    ($row:expr) => {
        Candidate {
            id: $row.get("id"),
            first_name: $row.get("first_name"),
            last_name: $row.get("last_name"),
            email: $row.get("email"),
            phone: $row.get("phone"),
            resume_path: $row.get("resume_path"),
            source: $row.get("source"),
            notes: $row.get("notes"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn create(&self, candidate: &Candidate) -> Result<Candidate>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Candidate>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<Candidate>>;

    async fn update(&self, candidate: &Candidate) -> Result<Candidate>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Search by name or e-mail, newest first
    async fn list(&self, search: Option<&str>, params: &ListParams) -> Result<(Vec<Candidate>, i64)>;
}

pub struct SqlxCandidateRepository {
    pool: DynDatabasePool,
}

impl SqlxCandidateRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CandidateRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CandidateRepository for SqlxCandidateRepository {
    async fn create(&self, candidate: &Candidate) -> Result<Candidate> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO candidates (first_name, last_name, email, phone, resume_path, source, notes, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&candidate.first_name)
            .bind(&candidate.last_name)
            .bind(&candidate.email)
            .bind(&candidate.phone)
            .bind(&candidate.resume_path)
            .bind(&candidate.source)
            .bind(&candidate.notes)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create candidate")?
            .inserted_id()
        });

        Ok(Candidate {
            id,
            created_at: now,
            updated_at: now,
            ..candidate.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {} FROM candidates WHERE id = ?", CANDIDATE_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get candidate")?;
            Ok(row.map(|row| candidate_from_row!(row)))
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {} FROM candidates WHERE email = ?", CANDIDATE_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(email)
                .fetch_optional(pool)
                .await
                .context("Failed to get candidate by email")?;
            Ok(row.map(|row| candidate_from_row!(row)))
        })
    }

    async fn update(&self, candidate: &Candidate) -> Result<Candidate> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE candidates
                SET first_name = ?, last_name = ?, email = ?, phone = ?, resume_path = ?, source = ?,
                    notes = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&candidate.first_name)
            .bind(&candidate.last_name)
            .bind(&candidate.email)
            .bind(&candidate.phone)
            .bind(&candidate.resume_path)
            .bind(&candidate.source)
            .bind(&candidate.notes)
            .bind(now)
            .bind(candidate.id)
            .execute(pool)
            .await
            .context("Failed to update candidate")?;
        });

        Ok(Candidate {
            updated_at: now,
            ..candidate.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM candidates WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete candidate")?;
        });
        Ok(())
    }

    async fn list(&self, search: Option<&str>, params: &ListParams) -> Result<(Vec<Candidate>, i64)> {
        let filter = "(? IS NULL OR first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)";
        let sql = format!(
            "SELECT {} FROM candidates WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            CANDIDATE_COLUMNS, filter
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM candidates WHERE {}", filter);
        let search = like_pattern(search);

        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list candidates")?;
            let total: i64 = sqlx::query(&count_sql)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(pool)
                .await
                .context("Failed to count candidates")?
                .get("count");
            let candidates = rows.iter().map(|row| candidate_from_row!(row)).collect();
            Ok((candidates, total))
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_candidate(first: &str, last: &str) -> Candidate {
    let now = Utc::now();
    Candidate {
        id: 0,
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}@candidates.test", first.to_lowercase()),
        phone: None,
        resume_path: None,
        source: Some("careers".to_string()),
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;

    #[tokio::test]
    async fn test_lookup_by_email() {
        let repo = SqlxCandidateRepository::new(setup_pool().await);
        let created = repo.create(&sample_candidate("Linus", "Torvalds")).await.unwrap();

        let found = repo.get_by_email("linus@candidates.test").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.full_name(), "Linus Torvalds");

        let err = repo.create(&sample_candidate("Linus", "Other")).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_search_and_update() {
        let repo = SqlxCandidateRepository::new(setup_pool().await);
        let mut linus = repo.create(&sample_candidate("Linus", "Torvalds")).await.unwrap();
        repo.create(&sample_candidate("Margaret", "Hamilton")).await.unwrap();

        let (found, total) = repo.list(Some("hamil"), &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].first_name, "Margaret");

        linus.resume_path = Some("cv-linus.pdf".to_string());
        repo.update(&linus).await.unwrap();
        let found = repo.get_by_id(linus.id).await.unwrap().unwrap();
        assert_eq!(found.resume_path.as_deref(), Some("cv-linus.pdf"));

        let (_, total) = repo.list(None, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
    }
}
