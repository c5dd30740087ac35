//! Department service

use crate::db::is_unique_violation;
use crate::db::repositories::{DepartmentRepository, EmployeeRepository};
use crate::models::{CreateDepartmentInput, Department, DepartmentWithCount, UpdateDepartmentInput};
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::validation;
use anyhow::Context;
use std::sync::Arc;

pub struct DepartmentService {
    repo: Arc<dyn DepartmentRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
}

impl DepartmentService {
    pub fn new(repo: Arc<dyn DepartmentRepository>, employee_repo: Arc<dyn EmployeeRepository>) -> Self {
        Self { repo, employee_repo }
    }

    pub async fn create(&self, input: CreateDepartmentInput) -> ServiceResult<Department> {
        let name = validation::required("Department name", &input.name)?;
        self.ensure_name_free(&name, None).await?;
        if let Some(head) = input.head_employee_id {
            self.ensure_employee(head).await?;
        }
        let description = validation::optional(input.description);

        let department = match self
            .repo
            .create(&name, description.as_deref(), input.head_employee_id)
            .await
        {
            Ok(d) => d,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::conflict(format!("Department '{}' already exists", name)))
            }
            Err(e) => return Err(e.context("Failed to create department").into()),
        };

        tracing::info!(department_id = department.id, name = %department.name, "Department created");
        Ok(department)
    }

    /// All departments with their headcount, by name
    pub async fn list(&self) -> ServiceResult<Vec<DepartmentWithCount>> {
        Ok(self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list departments")?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Department> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get department")?
            .or_not_found("Department", id)
    }

    pub async fn update(&self, id: i64, input: UpdateDepartmentInput) -> ServiceResult<Department> {
        let mut department = self.get(id).await?;

        if let Some(name) = input.name {
            let name = validation::required("Department name", &name)?;
            self.ensure_name_free(&name, Some(id)).await?;
            department.name = name;
        }
        if let Some(description) = input.description {
            department.description = validation::optional(Some(description));
        }
        if let Some(head) = input.head_employee_id {
            if let Some(head) = head {
                self.ensure_employee(head).await?;
            }
            department.head_employee_id = head;
        }

        Ok(self
            .repo
            .update(&department)
            .await
            .context("Failed to update department")?)
    }

    /// Delete a department; its employees are left without one
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete department")?;
        tracing::info!(department_id = id, "Department deleted");
        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> ServiceResult<()> {
        let existing = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check department name")?;
        match existing {
            Some(d) if Some(d.id) != except => {
                Err(ServiceError::conflict(format!("Department '{}' already exists", name)))
            }
            _ => Ok(()),
        }
    }

    async fn ensure_employee(&self, id: i64) -> ServiceResult<()> {
        if self
            .employee_repo
            .get_by_id(id)
            .await
            .context("Failed to get employee")?
            .is_none()
        {
            return Err(ServiceError::validation(format!("Employee {} does not exist", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::db::repositories::{SqlxDepartmentRepository, SqlxEmployeeRepository};
    use crate::db::DynDatabasePool;

    fn service(pool: &DynDatabasePool) -> DepartmentService {
        DepartmentService::new(
            SqlxDepartmentRepository::boxed(pool.clone()),
            SqlxEmployeeRepository::boxed(pool.clone()),
        )
    }

    fn input(name: &str) -> CreateDepartmentInput {
        CreateDepartmentInput {
            name: name.to_string(),
            description: None,
            head_employee_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_duplicate_name() {
        let pool = setup_pool().await;
        let service = service(&pool);

        let engineering = service.create(input("  Engineering ")).await.unwrap();
        assert_eq!(engineering.name, "Engineering");

        assert!(matches!(
            service.create(input("Engineering")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(service.create(input("  ")).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_head_must_exist() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let mut with_head = input("Finance");
        with_head.head_employee_id = Some(404);
        assert!(matches!(service.create(with_head).await, Err(ServiceError::Validation(_))));

        let head = insert_employee(&pool, "Grace", "Hopper").await;
        let mut with_head = input("Finance");
        with_head.head_employee_id = Some(head.id);
        let finance = service.create(with_head).await.unwrap();
        assert_eq!(finance.head_employee_id, Some(head.id));

        let cleared = service
            .update(
                finance.id,
                UpdateDepartmentInput {
                    head_employee_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.head_employee_id.is_none());
    }

    #[tokio::test]
    async fn test_rename_conflict_and_delete() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let sales = service.create(input("Sales")).await.unwrap();
        service.create(input("Support")).await.unwrap();

        let rename = service
            .update(
                sales.id,
                UpdateDepartmentInput {
                    name: Some("Support".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(rename, Err(ServiceError::Conflict(_))));

        // Renaming to its own name is fine
        service
            .update(
                sales.id,
                UpdateDepartmentInput {
                    name: Some("Sales".to_string()),
                    description: Some("Revenue".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        service.delete(sales.id).await.unwrap();
        assert!(matches!(service.get(sales.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(sales.id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }
}
