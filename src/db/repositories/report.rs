//! Stored report repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{ListParams, Report, ReportType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const REPORT_COLUMNS: &str = "id, report_type, title, parameters, data, generated_by, created_at";

macro_rules! report_from_row {
    ($row:expr) => {
        Report {
            id: $row.get("id"),
            report_type: parse_column($row.get("report_type"), "report_type")?,
            title: $row.get("title"),
            parameters: serde_json::from_str(&$row.get::<String, _>("parameters"))
                .context("Invalid report parameters in database")?,
            data: serde_json::from_str(&$row.get::<String, _>("data"))
                .context("Invalid report data in database")?,
            generated_by: $row.get("generated_by"),
            created_at: $row.get("created_at"),
        }
    };
}

/// A report about to be stored
#[derive(Debug, Clone)]
pub struct NewReport {
    pub report_type: ReportType,
    pub title: String,
    pub parameters: serde_json::Value,
    pub data: serde_json::Value,
    pub generated_by: Option<i64>,
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, report: &NewReport) -> Result<Report>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Report>>;

    /// Newest first, optionally of one type
    async fn list(&self, report_type: Option<ReportType>, params: &ListParams) -> Result<(Vec<Report>, i64)>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxReportRepository {
    pool: DynDatabasePool,
}

impl SqlxReportRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReportRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReportRepository for SqlxReportRepository {
    async fn create(&self, report: &NewReport) -> Result<Report> {
        let now = Utc::now();
        let parameters = serde_json::to_string(&report.parameters)?;
        let data = serde_json::to_string(&report.data)?;
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO reports (report_type, title, parameters, data, generated_by, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(report.report_type.as_str())
            .bind(&report.title)
            .bind(&parameters)
            .bind(&data)
            .bind(report.generated_by)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to store report")?
            .inserted_id()
        });

        Ok(Report {
            id,
            report_type: report.report_type,
            title: report.title.clone(),
            parameters: report.parameters.clone(),
            data: report.data.clone(),
            generated_by: report.generated_by,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Report>> {
        let sql = format!("SELECT {} FROM reports WHERE id = ?", REPORT_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get report")?;
            match row {
                Some(row) => Ok(Some(report_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, report_type: Option<ReportType>, params: &ListParams) -> Result<(Vec<Report>, i64)> {
        let sql = format!(
            "SELECT {} FROM reports WHERE (? IS NULL OR report_type = ?) ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            REPORT_COLUMNS
        );
        let report_type = report_type.map(|t| t.as_str());
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(report_type)
                .bind(report_type)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list reports")?;
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) AS count FROM reports WHERE (? IS NULL OR report_type = ?)",
            )
            .bind(report_type)
            .bind(report_type)
            .fetch_one(pool)
            .await
            .context("Failed to count reports")?
            .get("count");

            let mut reports = Vec::with_capacity(rows.len());
            for row in rows {
                reports.push(report_from_row!(row));
            }
            Ok((reports, total))
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM reports WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete report")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_and_reload_json() {
        let repo = SqlxReportRepository::new(setup_pool().await);
        let created = repo
            .create(&NewReport {
                report_type: ReportType::Headcount,
                title: "Headcount".to_string(),
                parameters: json!({}),
                data: json!({"columns": ["department", "count"], "rows": [["Engineering", 3]]}),
                generated_by: None,
            })
            .await
            .unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.report_type, ReportType::Headcount);
        assert_eq!(found.data["rows"][0][1], json!(3));
    }

    #[tokio::test]
    async fn test_list_by_type() {
        let repo = SqlxReportRepository::new(setup_pool().await);
        for report_type in [ReportType::Headcount, ReportType::LeaveSummary, ReportType::Headcount] {
            repo.create(&NewReport {
                report_type,
                title: report_type.title().to_string(),
                parameters: json!({}),
                data: json!({}),
                generated_by: None,
            })
            .await
            .unwrap();
        }

        let (reports, total) = repo
            .list(Some(ReportType::Headcount), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(reports.iter().all(|r| r.report_type == ReportType::Headcount));

        let (_, total) = repo.list(None, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
    }
}
