//! Attendance repository
//!
//! One row per employee and work day. Open sessions are the rows with a
//! check-in but no check-out.

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{Attendance, AttendanceFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use std::sync::Arc;

const ATTENDANCE_COLUMNS: &str = "id, employee_id, work_date, check_in_at, check_out_at, \
     break_started_at, break_minutes, worked_minutes, is_late, status, auto_checked_out, notes, \
     created_at, updated_at";

const ATTENDANCE_FILTER: &str = "(? IS NULL OR employee_id = ?) \
     AND (? IS NULL OR work_date >= ?) \
     AND (? IS NULL OR work_date <= ?) \
     AND (? IS NULL OR status = ?)";

macro_rules! attendance_from_row {
    ($row:expr) => {
        Attendance {
            id: $row.get("id"),
            employee_id: $row.get("employee_id"),
            work_date: $row.get("work_date"),
            check_in_at: $row.get("check_in_at"),
            check_out_at: $row.get("check_out_at"),
            break_started_at: $row.get("break_started_at"),
            break_minutes: $row.get("break_minutes"),
            worked_minutes: $row.get("worked_minutes"),
            is_late: $row.get("is_late"),
            status: parse_column($row.get("status"), "status")?,
            auto_checked_out: $row.get("auto_checked_out"),
            notes: $row.get("notes"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

macro_rules! bind_attendance_filter {
    ($query:expr, $filter:expr) => {{
        let status = $filter.status.map(|s| s.as_str());
        $query
            .bind($filter.employee_id)
            .bind($filter.employee_id)
            .bind($filter.from)
            .bind($filter.from)
            .bind($filter.to)
            .bind($filter.to)
            .bind(status)
            .bind(status)
    }};
}

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Insert a record; the id and timestamps of `record` are ignored
    async fn create(&self, record: &Attendance) -> Result<Attendance>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Attendance>>;

    /// The record for an employee's work day
    async fn get_for_day(&self, employee_id: i64, work_date: NaiveDate) -> Result<Option<Attendance>>;

    async fn update(&self, record: &Attendance) -> Result<Attendance>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest days first
    async fn list(&self, filter: &AttendanceFilter, params: &ListParams) -> Result<(Vec<Attendance>, i64)>;

    /// Every matching record, oldest day first
    async fn list_range(&self, filter: &AttendanceFilter) -> Result<Vec<Attendance>>;

    /// Records checked in but not yet checked out
    async fn list_open(&self) -> Result<Vec<Attendance>>;
}

pub struct SqlxAttendanceRepository {
    pool: DynDatabasePool,
}

impl SqlxAttendanceRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AttendanceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AttendanceRepository for SqlxAttendanceRepository {
    async fn create(&self, record: &Attendance) -> Result<Attendance> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO attendance (employee_id, work_date, check_in_at, check_out_at, break_started_at,
                    break_minutes, worked_minutes, is_late, status, auto_checked_out, notes, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.employee_id)
            .bind(record.work_date)
            .bind(record.check_in_at)
            .bind(record.check_out_at)
            .bind(record.break_started_at)
            .bind(record.break_minutes)
            .bind(record.worked_minutes)
            .bind(record.is_late)
            .bind(record.status.as_str())
            .bind(record.auto_checked_out)
            .bind(&record.notes)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create attendance record")?
            .inserted_id()
        });

        Ok(Attendance {
            id,
            created_at: now,
            updated_at: now,
            ..record.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Attendance>> {
        let sql = format!("SELECT {} FROM attendance WHERE id = ?", ATTENDANCE_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get attendance record")?;
            match row {
                Some(row) => Ok(Some(attendance_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_for_day(&self, employee_id: i64, work_date: NaiveDate) -> Result<Option<Attendance>> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE employee_id = ? AND work_date = ?",
            ATTENDANCE_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(employee_id)
                .bind(work_date)
                .fetch_optional(pool)
                .await
                .context("Failed to get attendance for day")?;
            match row {
                Some(row) => Ok(Some(attendance_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, record: &Attendance) -> Result<Attendance> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE attendance
                SET check_in_at = ?, check_out_at = ?, break_started_at = ?, break_minutes = ?,
                    worked_minutes = ?, is_late = ?, status = ?, auto_checked_out = ?, notes = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(record.check_in_at)
            .bind(record.check_out_at)
            .bind(record.break_started_at)
            .bind(record.break_minutes)
            .bind(record.worked_minutes)
            .bind(record.is_late)
            .bind(record.status.as_str())
            .bind(record.auto_checked_out)
            .bind(&record.notes)
            .bind(now)
            .bind(record.id)
            .execute(pool)
            .await
            .context("Failed to update attendance record")?;
        });

        Ok(Attendance {
            updated_at: now,
            ..record.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM attendance WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete attendance record")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &AttendanceFilter, params: &ListParams) -> Result<(Vec<Attendance>, i64)> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE {} ORDER BY work_date DESC, id DESC LIMIT ? OFFSET ?",
            ATTENDANCE_COLUMNS, ATTENDANCE_FILTER
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM attendance WHERE {}", ATTENDANCE_FILTER);

        with_pool!(self.pool, pool => {
            let rows = bind_attendance_filter!(sqlx::query(&sql), filter)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list attendance")?;
            let total: i64 = bind_attendance_filter!(sqlx::query(&count_sql), filter)
                .fetch_one(pool)
                .await
                .context("Failed to count attendance")?
                .get("count");

            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                records.push(attendance_from_row!(row));
            }
            Ok((records, total))
        })
    }

    async fn list_range(&self, filter: &AttendanceFilter) -> Result<Vec<Attendance>> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE {} ORDER BY work_date ASC, employee_id ASC",
            ATTENDANCE_COLUMNS, ATTENDANCE_FILTER
        );
        with_pool!(self.pool, pool => {
            let rows = bind_attendance_filter!(sqlx::query(&sql), filter)
                .fetch_all(pool)
                .await
                .context("Failed to list attendance range")?;
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                records.push(attendance_from_row!(row));
            }
            Ok(records)
        })
    }

    async fn list_open(&self) -> Result<Vec<Attendance>> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE check_in_at IS NOT NULL AND check_out_at IS NULL ORDER BY id",
            ATTENDANCE_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list open attendance sessions")?;
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                records.push(attendance_from_row!(row));
            }
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::models::AttendanceStatus;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn open_record(employee_id: i64, work_date: NaiveDate) -> Attendance {
        let check_in = Utc
            .from_local_datetime(&work_date.and_hms_opt(9, 0, 0).unwrap())
            .unwrap();
        Attendance {
            id: 0,
            employee_id,
            work_date,
            check_in_at: Some(check_in),
            check_out_at: None,
            break_started_at: None,
            break_minutes: 0,
            worked_minutes: 0,
            is_late: false,
            status: AttendanceStatus::Present,
            auto_checked_out: false,
            notes: None,
            created_at: check_in,
            updated_at: check_in,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_for_day() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxAttendanceRepository::new(pool);

        let created = repo.create(&open_record(employee.id, day(4))).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_for_day(employee.id, day(4)).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.check_in_at, created.check_in_at);
        assert!(repo.get_for_day(employee.id, day(5)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_record_per_day() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxAttendanceRepository::new(pool);

        repo.create(&open_record(employee.id, day(4))).await.unwrap();
        let err = repo.create(&open_record(employee.id, day(4))).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_update_closes_session() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxAttendanceRepository::new(pool);

        let mut record = repo.create(&open_record(employee.id, day(4))).await.unwrap();
        assert_eq!(repo.list_open().await.unwrap().len(), 1);

        record.check_out_at = record.check_in_at.map(|t| t + Duration::hours(8));
        record.worked_minutes = 480;
        repo.update(&record).await.unwrap();

        assert!(repo.list_open().await.unwrap().is_empty());
        let found = repo.get_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(found.worked_minutes, 480);
    }

    #[tokio::test]
    async fn test_list_filters_by_range_and_status() {
        let pool = setup_pool().await;
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let alan = insert_employee(&pool, "Alan", "Turing").await;
        let repo = SqlxAttendanceRepository::new(pool);

        for d in 4..=8 {
            repo.create(&open_record(ada.id, day(d))).await.unwrap();
        }
        let mut late = open_record(alan.id, day(5));
        late.status = AttendanceStatus::Late;
        repo.create(&late).await.unwrap();

        let filter = AttendanceFilter {
            from: Some(day(5)),
            to: Some(day(6)),
            ..Default::default()
        };
        let (records, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(records[0].work_date, day(6));

        let filter = AttendanceFilter {
            status: Some(AttendanceStatus::Late),
            ..Default::default()
        };
        let records = repo.list_range(&filter).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].employee_id, alan.id);

        let filter = AttendanceFilter {
            employee_id: Some(ada.id),
            ..Default::default()
        };
        let records = repo.list_range(&filter).await.unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].work_date, day(4));
    }
}
