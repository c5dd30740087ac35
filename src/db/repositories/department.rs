//! Department repository

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{Department, DepartmentWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const DEPARTMENT_COLUMNS: &str = "id, name, description, head_employee_id, created_at, updated_at";

macro_rules! department_from_row {
    ($row:expr) => {
        Department {
            id: $row.get("id"),
            name: $row.get("name"),
            description: $row.get("description"),
            head_employee_id: $row.get("head_employee_id"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        head_employee_id: Option<i64>,
    ) -> Result<Department>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Department>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Department>>;

    /// All departments by name, each with its employee headcount
    async fn list_with_counts(&self) -> Result<Vec<DepartmentWithCount>>;

    async fn update(&self, department: &Department) -> Result<Department>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxDepartmentRepository {
    pool: DynDatabasePool,
}

impl SqlxDepartmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DepartmentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DepartmentRepository for SqlxDepartmentRepository {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        head_employee_id: Option<i64>,
    ) -> Result<Department> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                "INSERT INTO departments (name, description, head_employee_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(name)
            .bind(description)
            .bind(head_employee_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create department")?
            .inserted_id()
        });

        Ok(Department {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            head_employee_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Department>> {
        let sql = format!("SELECT {} FROM departments WHERE id = ?", DEPARTMENT_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get department")?;
            Ok(row.map(|row| department_from_row!(row)))
        })
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Department>> {
        let sql = format!("SELECT {} FROM departments WHERE name = ?", DEPARTMENT_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(name)
                .fetch_optional(pool)
                .await
                .context("Failed to get department by name")?;
            Ok(row.map(|row| department_from_row!(row)))
        })
    }

    async fn list_with_counts(&self) -> Result<Vec<DepartmentWithCount>> {
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(
                r#"
                SELECT d.id, d.name, d.description, d.head_employee_id, d.created_at, d.updated_at,
                       (SELECT COUNT(*) FROM employees e
                        WHERE e.department_id = d.id AND e.status <> 'terminated') AS employee_count
                FROM departments d
                ORDER BY d.name
                "#,
            )
            .fetch_all(pool)
            .await
            .context("Failed to list departments")?;

            Ok(rows
                .iter()
                .map(|row| DepartmentWithCount {
                    department: department_from_row!(row),
                    employee_count: row.get("employee_count"),
                })
                .collect())
        })
    }

    async fn update(&self, department: &Department) -> Result<Department> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                "UPDATE departments SET name = ?, description = ?, head_employee_id = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&department.name)
            .bind(&department.description)
            .bind(department.head_employee_id)
            .bind(now)
            .bind(department.id)
            .execute(pool)
            .await
            .context("Failed to update department")?;
        });

        Ok(Department {
            updated_at: now,
            ..department.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM departments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete department")?;
        });
        Ok(())
    }
}
