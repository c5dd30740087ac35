//! Goals and performance reviews

use crate::db::is_unique_violation;
use crate::db::repositories::{EmployeeRepository, GoalRepository, ReviewRepository};
use crate::models::{
    CreateGoalInput, CreateReviewInput, Employee, Goal, GoalFilter, GoalStatus, NotificationKind,
    PerformanceReview, ReviewFilter, ReviewStatus, UpdateGoalInput, UpdateReviewInput, User,
};
use crate::services::access;
use crate::services::clock::Clock;
use crate::services::email::{templates, EmailService};
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::notification::NotificationService;
use crate::services::validation;
use anyhow::Context;
use std::sync::Arc;

pub struct PerformanceService {
    goal_repo: Arc<dyn GoalRepository>,
    review_repo: Arc<dyn ReviewRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    notifications: Arc<NotificationService>,
    email: Arc<EmailService>,
    clock: Arc<dyn Clock>,
}

impl PerformanceService {
    pub fn new(
        goal_repo: Arc<dyn GoalRepository>,
        review_repo: Arc<dyn ReviewRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        notifications: Arc<NotificationService>,
        email: Arc<EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            goal_repo,
            review_repo,
            employee_repo,
            notifications,
            email,
            clock,
        }
    }

    // Goals

    pub async fn create_goal(&self, user: &User, input: CreateGoalInput) -> ServiceResult<Goal> {
        let employee_id = match input.employee_id {
            Some(id) => id,
            None => access::linked_employee(user)?,
        };
        let employee = self.employee(employee_id).await?;
        if !user.is_employee(employee_id) {
            access::require_manage(user, &employee)?;
        }

        let now = self.clock.now();
        let goal = Goal {
            id: 0,
            employee_id,
            title: validation::required("Title", &input.title)?,
            description: validation::optional(input.description),
            due_date: input.due_date,
            progress: 0,
            status: GoalStatus::NotStarted,
            created_by: Some(user.id),
            created_at: now,
            updated_at: now,
        };
        let goal = self.goal_repo.create(&goal).await.context("Failed to create goal")?;
        tracing::info!(goal_id = goal.id, employee_id, "Goal created");
        Ok(goal)
    }

    /// Goals the caller may see, newest first
    pub async fn list_goals(&self, user: &User, filter: GoalFilter) -> ServiceResult<Vec<Goal>> {
        if let Some(id) = filter.employee_id {
            self.require_view(user, id).await?;
        }
        let visible = match filter.employee_id {
            Some(_) => None,
            None => access::visible_employees(self.employee_repo.as_ref(), user).await?,
        };
        let goals = self.goal_repo.list(&filter).await.context("Failed to list goals")?;
        Ok(match visible {
            Some(ids) => goals.into_iter().filter(|g| ids.contains(&g.employee_id)).collect(),
            None => goals,
        })
    }

    pub async fn get_goal(&self, user: &User, id: i64) -> ServiceResult<Goal> {
        let goal = self.find_goal(id).await?;
        self.require_view(user, goal.employee_id).await?;
        Ok(goal)
    }

    pub async fn update_goal(&self, user: &User, id: i64, input: UpdateGoalInput) -> ServiceResult<Goal> {
        let mut goal = self.editable_goal(user, id).await?;
        if let Some(title) = input.title {
            goal.title = validation::required("Title", &title)?;
        }
        if let Some(description) = input.description {
            goal.description = validation::optional(Some(description));
        }
        if let Some(due_date) = input.due_date {
            goal.due_date = due_date;
        }
        Ok(self.goal_repo.update(&goal).await.context("Failed to update goal")?)
    }

    /// Set progress; the status follows from it
    pub async fn update_progress(&self, user: &User, id: i64, progress: i64) -> ServiceResult<Goal> {
        if !(0..=100).contains(&progress) {
            return Err(ServiceError::validation("Progress must be between 0 and 100"));
        }
        let mut goal = self.editable_goal(user, id).await?;
        goal.progress = progress;
        goal.status = GoalStatus::from_progress(progress);
        let goal = self.goal_repo.update(&goal).await.context("Failed to update goal")?;
        tracing::info!(goal_id = id, progress, status = %goal.status, "Goal progress updated");
        Ok(goal)
    }

    pub async fn cancel_goal(&self, user: &User, id: i64) -> ServiceResult<Goal> {
        let mut goal = self.editable_goal(user, id).await?;
        if goal.status == GoalStatus::Completed {
            return Err(ServiceError::invalid_state("Completed goals cannot be cancelled"));
        }
        goal.status = GoalStatus::Cancelled;
        Ok(self.goal_repo.update(&goal).await.context("Failed to cancel goal")?)
    }

    pub async fn delete_goal(&self, user: &User, id: i64) -> ServiceResult<()> {
        let goal = self.find_goal(id).await?;
        self.require_view(user, goal.employee_id).await?;
        self.goal_repo.delete(id).await.context("Failed to delete goal")?;
        Ok(())
    }

    /// A goal the caller may change; cancelled goals are frozen
    async fn editable_goal(&self, user: &User, id: i64) -> ServiceResult<Goal> {
        let goal = self.find_goal(id).await?;
        self.require_view(user, goal.employee_id).await?;
        if goal.status == GoalStatus::Cancelled {
            return Err(ServiceError::invalid_state("Cancelled goals cannot be changed"));
        }
        Ok(goal)
    }

    async fn find_goal(&self, id: i64) -> ServiceResult<Goal> {
        self.goal_repo
            .get_by_id(id)
            .await
            .context("Failed to get goal")?
            .or_not_found("Goal", id)
    }

    // Reviews

    pub async fn create_review(&self, user: &User, input: CreateReviewInput) -> ServiceResult<PerformanceReview> {
        let employee = self.employee(input.employee_id).await?;
        if user.is_employee(employee.id) {
            return Err(ServiceError::forbidden("You cannot review yourself"));
        }
        access::require_manage(user, &employee)?;

        let period = validation::required("Period", &input.period)?;
        let rating = validation::rating(input.rating)?;
        if self
            .review_repo
            .get_by_period(employee.id, &period)
            .await
            .context("Failed to check existing review")?
            .is_some()
        {
            return Err(ServiceError::conflict(format!(
                "{} already has a review for {}",
                employee.full_name(),
                period
            )));
        }

        let now = self.clock.now();
        let review = PerformanceReview {
            id: 0,
            employee_id: employee.id,
            reviewer_id: Some(user.id),
            period,
            rating,
            strengths: validation::optional(input.strengths),
            improvements: validation::optional(input.improvements),
            comments: validation::optional(input.comments),
            status: ReviewStatus::Draft,
            submitted_at: None,
            acknowledged_at: None,
            created_at: now,
            updated_at: now,
        };
        let review = match self.review_repo.create(&review).await {
            Ok(r) => r,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::conflict("A review for this period already exists"))
            }
            Err(e) => return Err(e.context("Failed to create review").into()),
        };
        tracing::info!(review_id = review.id, employee_id = employee.id, "Review drafted");
        Ok(review)
    }

    pub async fn update_review(
        &self,
        user: &User,
        id: i64,
        input: UpdateReviewInput,
    ) -> ServiceResult<PerformanceReview> {
        let mut review = self.draft_review(user, id).await?;
        if let Some(rating) = input.rating {
            review.rating = validation::rating(rating)?;
        }
        if let Some(strengths) = input.strengths {
            review.strengths = validation::optional(Some(strengths));
        }
        if let Some(improvements) = input.improvements {
            review.improvements = validation::optional(Some(improvements));
        }
        if let Some(comments) = input.comments {
            review.comments = validation::optional(Some(comments));
        }
        Ok(self.review_repo.update(&review).await.context("Failed to update review")?)
    }

    /// Share a draft with the employee
    pub async fn submit_review(&self, user: &User, id: i64) -> ServiceResult<PerformanceReview> {
        let mut review = self.draft_review(user, id).await?;
        review.status = ReviewStatus::Submitted;
        review.submitted_at = Some(self.clock.now());
        let review = self.review_repo.update(&review).await.context("Failed to submit review")?;
        tracing::info!(review_id = id, "Review submitted");

        self.notifications
            .notify_employee(
                review.employee_id,
                NotificationKind::ReviewSubmitted,
                "New performance review",
                &format!("Your review for {} is ready to read", review.period),
                Some(&format!("/reviews/{}", review.id)),
            )
            .await;
        if let Ok(employee) = self.employee(review.employee_id).await {
            self.email
                .send_in_background(employee.email, templates::review_submitted(&review.period));
        }
        Ok(review)
    }

    /// The reviewed employee confirms they have read the review
    pub async fn acknowledge_review(&self, user: &User, id: i64) -> ServiceResult<PerformanceReview> {
        let mut review = self.find_review(id).await?;
        if !user.is_employee(review.employee_id) {
            return Err(ServiceError::forbidden("Only the reviewed employee can acknowledge"));
        }
        if review.status != ReviewStatus::Submitted {
            return Err(ServiceError::invalid_state(format!("Review is {}", review.status)));
        }
        review.status = ReviewStatus::Acknowledged;
        review.acknowledged_at = Some(self.clock.now());
        Ok(self
            .review_repo
            .update(&review)
            .await
            .context("Failed to acknowledge review")?)
    }

    /// Reviews the caller may see. Drafts stay hidden from the reviewed
    /// employee.
    pub async fn list_reviews(&self, user: &User, filter: ReviewFilter) -> ServiceResult<Vec<PerformanceReview>> {
        if let Some(id) = filter.employee_id {
            self.require_view(user, id).await?;
        }
        let visible = match filter.employee_id {
            Some(_) => None,
            None => access::visible_employees(self.employee_repo.as_ref(), user).await?,
        };
        Ok(self
            .review_repo
            .list(&filter)
            .await
            .context("Failed to list reviews")?
            .into_iter()
            .filter(|r| visible.as_ref().map_or(true, |ids| ids.contains(&r.employee_id)))
            .filter(|r| !hidden_draft(user, r))
            .collect())
    }

    pub async fn get_review(&self, user: &User, id: i64) -> ServiceResult<PerformanceReview> {
        let review = self.find_review(id).await?;
        if hidden_draft(user, &review) {
            return Err(ServiceError::not_found("Review", id));
        }
        self.require_view(user, review.employee_id).await?;
        Ok(review)
    }

    pub async fn delete_review(&self, user: &User, id: i64) -> ServiceResult<()> {
        self.draft_review(user, id).await?;
        self.review_repo.delete(id).await.context("Failed to delete review")?;
        Ok(())
    }

    /// A draft the caller may edit
    async fn draft_review(&self, user: &User, id: i64) -> ServiceResult<PerformanceReview> {
        let review = self.find_review(id).await?;
        let employee = self.employee(review.employee_id).await?;
        access::require_manage(user, &employee)?;
        if review.status != ReviewStatus::Draft {
            return Err(ServiceError::invalid_state("Only draft reviews can be changed"));
        }
        Ok(review)
    }

    async fn find_review(&self, id: i64) -> ServiceResult<PerformanceReview> {
        self.review_repo
            .get_by_id(id)
            .await
            .context("Failed to get review")?
            .or_not_found("Review", id)
    }

    async fn require_view(&self, user: &User, employee_id: i64) -> ServiceResult<()> {
        if user.is_hr() || user.is_employee(employee_id) {
            return Ok(());
        }
        let employee = self.employee(employee_id).await?;
        access::require_view(user, &employee)
    }

    async fn employee(&self, id: i64) -> ServiceResult<Employee> {
        self.employee_repo
            .get_by_id(id)
            .await
            .context("Failed to get employee")?
            .or_not_found("Employee", id)
    }
}

fn hidden_draft(user: &User, review: &PerformanceReview) -> bool {
    review.status == ReviewStatus::Draft && user.is_employee(review.employee_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpConfig;
    use crate::db::repositories::test_support::{insert_employee, insert_user, setup_pool};
    use crate::db::repositories::{
        NotificationRepository, SqlxEmployeeRepository, SqlxGoalRepository,
        SqlxNotificationRepository, SqlxReviewRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;
    use crate::services::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn service(pool: &DynDatabasePool) -> PerformanceService {
        PerformanceService::new(
            SqlxGoalRepository::boxed(pool.clone()),
            SqlxReviewRepository::boxed(pool.clone()),
            SqlxEmployeeRepository::boxed(pool.clone()),
            Arc::new(NotificationService::new(
                SqlxNotificationRepository::boxed(pool.clone()),
                SqlxUserRepository::boxed(pool.clone()),
            )),
            Arc::new(EmailService::new(SmtpConfig::default())),
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 28, 12, 0, 0).unwrap())),
        )
    }

    struct Team {
        ada: Employee,
        ada_user: User,
        manager: User,
        outsider: User,
    }

    async fn team(pool: &DynDatabasePool) -> Team {
        let grace = insert_employee(pool, "Grace", "Hopper").await;
        let alan = insert_employee(pool, "Alan", "Turing").await;
        let mut ada = insert_employee(pool, "Ada", "Lovelace").await;
        ada.manager_id = Some(grace.id);
        let ada = SqlxEmployeeRepository::new(pool.clone()).update(&ada).await.unwrap();
        Team {
            ada_user: insert_user(pool, "ada", UserRole::Employee, Some(ada.id)).await,
            manager: insert_user(pool, "grace", UserRole::Manager, Some(grace.id)).await,
            outsider: insert_user(pool, "alan", UserRole::Employee, Some(alan.id)).await,
            ada,
        }
    }

    fn goal(title: &str) -> CreateGoalInput {
        CreateGoalInput {
            employee_id: None,
            title: title.to_string(),
            description: None,
            due_date: None,
        }
    }

    fn review(employee_id: i64, period: &str, rating: i64) -> CreateReviewInput {
        CreateReviewInput {
            employee_id,
            period: period.to_string(),
            rating,
            strengths: Some("Analytical engines".to_string()),
            improvements: None,
            comments: None,
        }
    }

    #[tokio::test]
    async fn test_goal_progress_drives_status() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let t = team(&pool).await;

        let g = service.create_goal(&t.ada_user, goal("Ship the compiler")).await.unwrap();
        assert_eq!(g.employee_id, t.ada.id);
        assert_eq!(g.status, GoalStatus::NotStarted);

        let g = service.update_progress(&t.ada_user, g.id, 40).await.unwrap();
        assert_eq!(g.status, GoalStatus::InProgress);
        let g = service.update_progress(&t.manager, g.id, 100).await.unwrap();
        assert_eq!(g.status, GoalStatus::Completed);
        let g = service.update_progress(&t.ada_user, g.id, 0).await.unwrap();
        assert_eq!(g.status, GoalStatus::NotStarted);

        assert!(matches!(
            service.update_progress(&t.ada_user, g.id, 101).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.update_progress(&t.outsider, g.id, 50).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_goal_is_frozen() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let t = team(&pool).await;

        let g = service.create_goal(&t.ada_user, goal("Learn Rust")).await.unwrap();
        service.cancel_goal(&t.ada_user, g.id).await.unwrap();
        assert!(matches!(
            service.update_progress(&t.ada_user, g.id, 10).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            service
                .update_goal(
                    &t.ada_user,
                    g.id,
                    UpdateGoalInput {
                        title: Some("Learn Go".to_string()),
                        ..Default::default()
                    }
                )
                .await,
            Err(ServiceError::InvalidState(_))
        ));
        service.delete_goal(&t.ada_user, g.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_goal_for_report() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let t = team(&pool).await;

        let mut for_ada = goal("Mentor an intern");
        for_ada.employee_id = Some(t.ada.id);
        let g = service.create_goal(&t.manager, for_ada.clone()).await.unwrap();
        assert_eq!(g.created_by, Some(t.manager.id));
        assert!(matches!(
            service.create_goal(&t.outsider, for_ada).await,
            Err(ServiceError::Forbidden(_))
        ));

        let mine = service.list_goals(&t.ada_user, GoalFilter::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        let theirs = service.list_goals(&t.manager, GoalFilter::default()).await.unwrap();
        assert_eq!(theirs.len(), 1);
        let none = service.list_goals(&t.outsider, GoalFilter::default()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_review_lifecycle() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let t = team(&pool).await;

        let r = service
            .create_review(&t.manager, review(t.ada.id, "2024-H1", 4))
            .await
            .unwrap();
        assert_eq!(r.status, ReviewStatus::Draft);

        // Drafts are invisible to the employee
        assert!(matches!(service.get_review(&t.ada_user, r.id).await, Err(ServiceError::NotFound(_))));
        assert!(service
            .list_reviews(&t.ada_user, ReviewFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            service.acknowledge_review(&t.ada_user, r.id).await,
            Err(ServiceError::InvalidState(_))
        ));

        let r = service
            .update_review(
                &t.manager,
                r.id,
                UpdateReviewInput {
                    rating: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(r.rating, 5);

        let r = service.submit_review(&t.manager, r.id).await.unwrap();
        assert_eq!(r.status, ReviewStatus::Submitted);
        assert!(r.submitted_at.is_some());
        let unread = SqlxNotificationRepository::new(pool.clone())
            .unread_count(t.ada_user.id)
            .await
            .unwrap();
        assert_eq!(unread, 1);

        assert!(matches!(
            service.update_review(&t.manager, r.id, UpdateReviewInput::default()).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            service.acknowledge_review(&t.manager, r.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let r = service.acknowledge_review(&t.ada_user, r.id).await.unwrap();
        assert_eq!(r.status, ReviewStatus::Acknowledged);
        assert!(matches!(
            service.delete_review(&t.manager, r.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_review_rules() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let t = team(&pool).await;

        assert!(matches!(
            service.create_review(&t.manager, review(t.ada.id, "2024-H1", 6)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.create_review(&t.outsider, review(t.ada.id, "2024-H1", 3)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .create_review(&t.ada_user, review(t.ada.id, "2024-H1", 5))
                .await,
            Err(ServiceError::Forbidden(_))
        ));

        service
            .create_review(&t.manager, review(t.ada.id, "2024-H1", 3))
            .await
            .unwrap();
        assert!(matches!(
            service.create_review(&t.manager, review(t.ada.id, "2024-H1", 3)).await,
            Err(ServiceError::Conflict(_))
        ));
        service
            .create_review(&t.manager, review(t.ada.id, "2024-H2", 3))
            .await
            .unwrap();
        let listed = service.list_reviews(&t.manager, ReviewFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
