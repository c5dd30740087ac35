//! Leave request repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{LeaveFilter, LeaveRequest, LeaveStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use std::sync::Arc;

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, days, reason, \
     handover_document, status, reviewed_by, review_comment, reviewed_at, created_at, updated_at";

/// `from`/`to` select requests overlapping the window
const LEAVE_FILTER: &str = "(? IS NULL OR employee_id = ?) \
     AND (? IS NULL OR status = ?) \
     AND (? IS NULL OR leave_type = ?) \
     AND (? IS NULL OR end_date >= ?) \
     AND (? IS NULL OR start_date <= ?)";

macro_rules! leave_from_row {
    ($row:expr) => {
        LeaveRequest {
            id: $row.get("id"),
            employee_id: $row.get("employee_id"),
            leave_type: parse_column($row.get("leave_type"), "leave_type")?,
            start_date: $row.get("start_date"),
            end_date: $row.get("end_date"),
            days: $row.get("days"),
            reason: $row.get("reason"),
            handover_document: $row.get("handover_document"),
            status: parse_column($row.get("status"), "status")?,
            reviewed_by: $row.get("reviewed_by"),
            review_comment: $row.get("review_comment"),
            reviewed_at: $row.get("reviewed_at"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

macro_rules! bind_leave_filter {
    ($query:expr, $filter:expr) => {{
        let status = $filter.status.map(|s| s.as_str());
        let leave_type = $filter.leave_type.map(|t| t.as_str());
        $query
            .bind($filter.employee_id)
            .bind($filter.employee_id)
            .bind(status)
            .bind(status)
            .bind(leave_type)
            .bind(leave_type)
            .bind($filter.from)
            .bind($filter.from)
            .bind($filter.to)
            .bind($filter.to)
    }};
}

#[async_trait]
pub trait LeaveRepository: Send + Sync {
    async fn create(&self, request: &LeaveRequest) -> Result<LeaveRequest>;

    async fn get_by_id(&self, id: i64) -> Result<Option<LeaveRequest>>;

    /// Persist status, review fields and the editable request fields
    async fn update(&self, request: &LeaveRequest) -> Result<LeaveRequest>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest requests first
    async fn list(&self, filter: &LeaveFilter, params: &ListParams) -> Result<(Vec<LeaveRequest>, i64)>;

    /// Every matching request, by start date
    async fn list_all(&self, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>>;

    async fn count_pending(&self) -> Result<i64>;
}

pub struct SqlxLeaveRepository {
    pool: DynDatabasePool,
}

impl SqlxLeaveRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LeaveRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LeaveRepository for SqlxLeaveRepository {
    async fn create(&self, request: &LeaveRequest) -> Result<LeaveRequest> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO leave_requests (employee_id, leave_type, start_date, end_date, days, reason,
                    handover_document, status, reviewed_by, review_comment, reviewed_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(request.employee_id)
            .bind(request.leave_type.as_str())
            .bind(request.start_date)
            .bind(request.end_date)
            .bind(request.days)
            .bind(&request.reason)
            .bind(&request.handover_document)
            .bind(request.status.as_str())
            .bind(request.reviewed_by)
            .bind(&request.review_comment)
            .bind(request.reviewed_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create leave request")?
            .inserted_id()
        });

        Ok(LeaveRequest {
            id,
            created_at: now,
            updated_at: now,
            ..request.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LeaveRequest>> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get leave request")?;
            match row {
                Some(row) => Ok(Some(leave_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, request: &LeaveRequest) -> Result<LeaveRequest> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET leave_type = ?, start_date = ?, end_date = ?, days = ?, reason = ?,
                    handover_document = ?, status = ?, reviewed_by = ?, review_comment = ?,
                    reviewed_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(request.leave_type.as_str())
            .bind(request.start_date)
            .bind(request.end_date)
            .bind(request.days)
            .bind(&request.reason)
            .bind(&request.handover_document)
            .bind(request.status.as_str())
            .bind(request.reviewed_by)
            .bind(&request.review_comment)
            .bind(request.reviewed_at)
            .bind(now)
            .bind(request.id)
            .execute(pool)
            .await
            .context("Failed to update leave request")?;
        });

        Ok(LeaveRequest {
            updated_at: now,
            ..request.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM leave_requests WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete leave request")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &LeaveFilter, params: &ListParams) -> Result<(Vec<LeaveRequest>, i64)> {
        let sql = format!(
            "SELECT {} FROM leave_requests WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            LEAVE_COLUMNS, LEAVE_FILTER
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM leave_requests WHERE {}", LEAVE_FILTER);

        with_pool!(self.pool, pool => {
            let rows = bind_leave_filter!(sqlx::query(&sql), filter)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list leave requests")?;
            let total: i64 = bind_leave_filter!(sqlx::query(&count_sql), filter)
                .fetch_one(pool)
                .await
                .context("Failed to count leave requests")?
                .get("count");

            let mut requests = Vec::with_capacity(rows.len());
            for row in rows {
                requests.push(leave_from_row!(row));
            }
            Ok((requests, total))
        })
    }

    async fn list_all(&self, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {} FROM leave_requests WHERE {} ORDER BY start_date ASC, id ASC",
            LEAVE_COLUMNS, LEAVE_FILTER
        );
        with_pool!(self.pool, pool => {
            let rows = bind_leave_filter!(sqlx::query(&sql), filter)
                .fetch_all(pool)
                .await
                .context("Failed to list leave requests")?;
            let mut requests = Vec::with_capacity(rows.len());
            for row in rows {
                requests.push(leave_from_row!(row));
            }
            Ok(requests)
        })
    }

    async fn count_pending(&self) -> Result<i64> {
        with_pool!(self.pool, pool => {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM leave_requests WHERE status = ?")
                .bind(LeaveStatus::Pending.as_str())
                .fetch_one(pool)
                .await
                .context("Failed to count pending leave requests")?;
            Ok(row.get("count"))
        })
    }
}

/// Requests of one employee overlapping `[start, end]`
pub fn overlap_filter(employee_id: i64, start: NaiveDate, end: NaiveDate) -> LeaveFilter {
    LeaveFilter {
        employee_id: Some(employee_id),
        from: Some(start),
        to: Some(end),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::models::LeaveType;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn request(employee_id: i64, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: 0,
            employee_id,
            leave_type: LeaveType::Annual,
            start_date: start,
            end_date: end,
            days: 1,
            reason: Some("Family trip".to_string()),
            handover_document: None,
            status: LeaveStatus::Pending,
            reviewed_by: None,
            review_comment: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_review() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxLeaveRepository::new(pool);

        let mut created = repo.create(&request(employee.id, d(3, 4), d(3, 8))).await.unwrap();
        assert_eq!(repo.count_pending().await.unwrap(), 1);

        created.status = LeaveStatus::Approved;
        created.review_comment = Some("Enjoy".to_string());
        created.reviewed_at = Some(Utc::now());
        repo.update(&created).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, LeaveStatus::Approved);
        assert_eq!(found.review_comment.as_deref(), Some("Enjoy"));
        assert_eq!(repo.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overlap_filter_uses_inclusive_bounds() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxLeaveRepository::new(pool);
        repo.create(&request(employee.id, d(3, 4), d(3, 8))).await.unwrap();
        repo.create(&request(employee.id, d(4, 1), d(4, 2))).await.unwrap();

        let hits = repo
            .list_all(&overlap_filter(employee.id, d(3, 8), d(3, 12)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = repo
            .list_all(&overlap_filter(employee.id, d(3, 9), d(3, 31)))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_status_and_type() {
        let pool = setup_pool().await;
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let alan = insert_employee(&pool, "Alan", "Turing").await;
        let repo = SqlxLeaveRepository::new(pool);

        repo.create(&request(ada.id, d(3, 4), d(3, 4))).await.unwrap();
        let mut sick = request(alan.id, d(3, 5), d(3, 5));
        sick.leave_type = LeaveType::Sick;
        repo.create(&sick).await.unwrap();

        let filter = LeaveFilter {
            leave_type: Some(LeaveType::Sick),
            ..Default::default()
        };
        let (found, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].employee_id, alan.id);

        let filter = LeaveFilter {
            status: Some(LeaveStatus::Pending),
            ..Default::default()
        };
        let (_, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
    }
}
