//! Recruitment service
//!
//! Job postings, candidates, the application pipeline and interviews.
//!
//! Applications move along
//! `applied -> screening -> interview -> offer -> hired`, and any open
//! application can be rejected or withdrawn. Hiring turns the candidate
//! into an employee and closes the posting once every opening is filled.

use crate::cache::MemoryCache;
use crate::db::is_unique_violation;
use crate::db::repositories::{
    ApplicationRepository, CandidateRepository, DepartmentRepository, EmployeeRepository,
    InterviewRepository, JobRepository,
};
use crate::models::{
    Application, ApplicationDetail, ApplicationFilter, ApplicationStatus, Candidate,
    CreateCandidateInput, CreateEmployeeInput, CreateInterviewInput, CreateJobInput, Employee,
    Interview, InterviewFilter, InterviewStatus, Job, JobFilter, JobStatus, ListParams,
    NotificationKind, PagedResult, UpdateCandidateInput, UpdateInterviewInput, UpdateJobInput,
    User,
};
use crate::services::clock::Clock;
use crate::services::email::{templates, EmailService};
use crate::services::employee::EmployeeService;
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::notification::NotificationService;
use crate::services::report::invalidate_dashboard;
use crate::services::upload::UploadService;
use crate::services::validation;
use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MIN_INTERVIEW_MINUTES: i64 = 15;
const MAX_INTERVIEW_MINUTES: i64 = 480;

/// Application submitted through the public careers page
#[derive(Debug, Clone, Deserialize)]
pub struct CareersApplication {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

/// An uploaded CV, as read from a multipart field
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub original_name: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Terms for turning a candidate into an employee
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HireInput {
    #[serde(default)]
    pub base_salary: f64,
    #[serde(default)]
    pub manager_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HireOutcome {
    pub application: Application,
    pub employee: Employee,
    /// The hire filled the last opening
    pub job_closed: bool,
}

pub struct RecruitmentService {
    job_repo: Arc<dyn JobRepository>,
    candidate_repo: Arc<dyn CandidateRepository>,
    application_repo: Arc<dyn ApplicationRepository>,
    interview_repo: Arc<dyn InterviewRepository>,
    department_repo: Arc<dyn DepartmentRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    employees: Arc<EmployeeService>,
    notifications: Arc<NotificationService>,
    email: Arc<EmailService>,
    uploads: Arc<UploadService>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    cache: Arc<MemoryCache>,
}

impl RecruitmentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        candidate_repo: Arc<dyn CandidateRepository>,
        application_repo: Arc<dyn ApplicationRepository>,
        interview_repo: Arc<dyn InterviewRepository>,
        department_repo: Arc<dyn DepartmentRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        employees: Arc<EmployeeService>,
        notifications: Arc<NotificationService>,
        email: Arc<EmailService>,
        uploads: Arc<UploadService>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            job_repo,
            candidate_repo,
            application_repo,
            interview_repo,
            department_repo,
            employee_repo,
            employees,
            notifications,
            email,
            uploads,
            clock,
            offset,
            cache,
        }
    }

    // Jobs

    pub async fn create_job(&self, input: CreateJobInput) -> ServiceResult<Job> {
        let title = validation::required("Title", &input.title)?;
        let description = validation::required("Description", &input.description)?;
        check_openings(input.openings)?;
        if let Some(department_id) = input.department_id {
            self.ensure_department(department_id).await?;
        }

        let now = self.clock.now();
        let job = Job {
            id: 0,
            title,
            department_id: input.department_id,
            description,
            location: validation::optional(input.location),
            employment_type: input.employment_type,
            openings: input.openings,
            status: JobStatus::Draft,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        let job = self.job_repo.create(&job).await.context("Failed to create job")?;
        tracing::info!(job_id = job.id, title = %job.title, "Job created");
        Ok(job)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> ServiceResult<Vec<Job>> {
        Ok(self.job_repo.list(filter).await.context("Failed to list jobs")?)
    }

    /// Postings shown on the public careers page
    pub async fn list_open_jobs(&self) -> ServiceResult<Vec<Job>> {
        self.list_jobs(&JobFilter {
            status: Some(JobStatus::Open),
            ..Default::default()
        })
        .await
    }

    pub async fn get_job(&self, id: i64) -> ServiceResult<Job> {
        self.job_repo
            .get_by_id(id)
            .await
            .context("Failed to get job")?
            .or_not_found("Job", id)
    }

    /// An open posting; anything else looks missing to the public
    pub async fn get_open_job(&self, id: i64) -> ServiceResult<Job> {
        let job = self.get_job(id).await?;
        if job.status != JobStatus::Open {
            return Err(ServiceError::not_found("Job", id));
        }
        Ok(job)
    }

    pub async fn update_job(&self, id: i64, input: UpdateJobInput) -> ServiceResult<Job> {
        let mut job = self.get_job(id).await?;
        if let Some(title) = input.title {
            job.title = validation::required("Title", &title)?;
        }
        if let Some(description) = input.description {
            job.description = validation::required("Description", &description)?;
        }
        if let Some(department_id) = input.department_id {
            if let Some(department_id) = department_id {
                self.ensure_department(department_id).await?;
            }
            job.department_id = department_id;
        }
        if let Some(location) = input.location {
            job.location = validation::optional(Some(location));
        }
        if let Some(employment_type) = input.employment_type {
            job.employment_type = employment_type;
        }
        if let Some(openings) = input.openings {
            check_openings(openings)?;
            job.openings = openings;
        }
        Ok(self.job_repo.update(&job).await.context("Failed to update job")?)
    }

    pub async fn publish_job(&self, id: i64) -> ServiceResult<Job> {
        let mut job = self.get_job(id).await?;
        if job.status != JobStatus::Draft {
            return Err(ServiceError::invalid_state(format!("Job is already {}", job.status)));
        }
        job.status = JobStatus::Open;
        let job = self.job_repo.update(&job).await.context("Failed to publish job")?;
        tracing::info!(job_id = id, "Job published");
        invalidate_dashboard(&self.cache).await;
        Ok(job)
    }

    pub async fn close_job(&self, id: i64) -> ServiceResult<Job> {
        let job = self.get_job(id).await?;
        if job.status == JobStatus::Closed {
            return Err(ServiceError::invalid_state("Job is already closed"));
        }
        self.close(job).await
    }

    async fn close(&self, mut job: Job) -> ServiceResult<Job> {
        job.status = JobStatus::Closed;
        job.closed_at = Some(self.clock.now());
        let job = self.job_repo.update(&job).await.context("Failed to close job")?;
        tracing::info!(job_id = job.id, "Job closed");
        invalidate_dashboard(&self.cache).await;
        Ok(job)
    }

    /// Delete a posting that nobody has applied to
    pub async fn delete_job(&self, id: i64) -> ServiceResult<()> {
        self.get_job(id).await?;
        let applications = self
            .application_repo
            .list(&ApplicationFilter {
                job_id: Some(id),
                ..Default::default()
            })
            .await
            .context("Failed to list applications")?;
        if !applications.is_empty() {
            return Err(ServiceError::conflict(format!(
                "Job has {} applications; close it instead",
                applications.len()
            )));
        }
        self.job_repo.delete(id).await.context("Failed to delete job")?;
        invalidate_dashboard(&self.cache).await;
        Ok(())
    }

    // Candidates

    pub async fn create_candidate(&self, input: CreateCandidateInput) -> ServiceResult<Candidate> {
        let email = validation::email(&input.email)?;
        if self
            .candidate_repo
            .get_by_email(&email)
            .await
            .context("Failed to check candidate e-mail")?
            .is_some()
        {
            return Err(ServiceError::conflict(format!("A candidate with e-mail {} exists", email)));
        }

        let now = self.clock.now();
        let candidate = Candidate {
            id: 0,
            first_name: validation::required("First name", &input.first_name)?,
            last_name: validation::required("Last name", &input.last_name)?,
            email,
            phone: validation::phone(input.phone)?,
            resume_path: None,
            source: validation::optional(input.source),
            notes: validation::optional(input.notes),
            created_at: now,
            updated_at: now,
        };
        match self.candidate_repo.create(&candidate).await {
            Ok(c) => Ok(c),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::conflict(format!(
                "A candidate with e-mail {} exists",
                candidate.email
            ))),
            Err(e) => Err(e.context("Failed to create candidate").into()),
        }
    }

    pub async fn list_candidates(
        &self,
        search: Option<&str>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Candidate>> {
        let (items, total) = self
            .candidate_repo
            .list(search, params)
            .await
            .context("Failed to list candidates")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_candidate(&self, id: i64) -> ServiceResult<Candidate> {
        self.candidate_repo
            .get_by_id(id)
            .await
            .context("Failed to get candidate")?
            .or_not_found("Candidate", id)
    }

    pub async fn update_candidate(&self, id: i64, input: UpdateCandidateInput) -> ServiceResult<Candidate> {
        let mut candidate = self.get_candidate(id).await?;
        if let Some(first_name) = input.first_name {
            candidate.first_name = validation::required("First name", &first_name)?;
        }
        if let Some(last_name) = input.last_name {
            candidate.last_name = validation::required("Last name", &last_name)?;
        }
        if let Some(email) = input.email {
            let email = validation::email(&email)?;
            if let Some(other) = self
                .candidate_repo
                .get_by_email(&email)
                .await
                .context("Failed to check candidate e-mail")?
            {
                if other.id != id {
                    return Err(ServiceError::conflict(format!("A candidate with e-mail {} exists", email)));
                }
            }
            candidate.email = email;
        }
        if let Some(phone) = input.phone {
            candidate.phone = validation::phone(Some(phone))?;
        }
        if let Some(source) = input.source {
            candidate.source = validation::optional(Some(source));
        }
        if let Some(notes) = input.notes {
            candidate.notes = validation::optional(Some(notes));
        }
        Ok(self
            .candidate_repo
            .update(&candidate)
            .await
            .context("Failed to update candidate")?)
    }

    /// Delete a candidate with their applications and stored CV
    pub async fn delete_candidate(&self, id: i64) -> ServiceResult<()> {
        let candidate = self.get_candidate(id).await?;
        self.candidate_repo
            .delete(id)
            .await
            .context("Failed to delete candidate")?;
        if let Some(resume) = candidate.resume_path {
            self.remove_file(&resume).await;
        }
        Ok(())
    }

    /// Store a CV and attach it, replacing any previous one
    pub async fn attach_resume(&self, id: i64, file: ResumeFile) -> ServiceResult<Candidate> {
        let mut candidate = self.get_candidate(id).await?;
        let stored = self
            .uploads
            .store(file.original_name.as_deref(), &file.content_type, &file.data)
            .await?;
        let previous = candidate.resume_path.replace(stored.filename);
        let candidate = self
            .candidate_repo
            .update(&candidate)
            .await
            .context("Failed to attach CV")?;
        if let Some(previous) = previous {
            self.remove_file(&previous).await;
        }
        Ok(candidate)
    }

    async fn remove_file(&self, name: &str) {
        if let Err(e) = self.uploads.delete(name).await {
            tracing::warn!(file = %name, "Failed to remove stored file: {}", e);
        }
    }

    // Applications

    pub async fn apply(
        &self,
        job_id: i64,
        candidate_id: i64,
        cover_letter: Option<String>,
    ) -> ServiceResult<Application> {
        let job = self.get_job(job_id).await?;
        if job.status != JobStatus::Open {
            return Err(ServiceError::invalid_state(format!("Job '{}' is not open", job.title)));
        }
        self.get_candidate(candidate_id).await?;
        if self
            .application_repo
            .get_by_job_candidate(job_id, candidate_id)
            .await
            .context("Failed to check existing application")?
            .is_some()
        {
            return Err(ServiceError::conflict("The candidate already applied to this job"));
        }

        let cover_letter = validation::optional(cover_letter);
        let application = match self
            .application_repo
            .create(job_id, candidate_id, cover_letter.as_deref())
            .await
        {
            Ok(a) => a,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::conflict("The candidate already applied to this job"))
            }
            Err(e) => return Err(e.context("Failed to create application").into()),
        };
        tracing::info!(application_id = application.id, job_id, candidate_id, "Application received");
        Ok(application)
    }

    /// Public application: find or create the candidate by e-mail, apply,
    /// and confirm by mail.
    ///
    /// The CV is checked and stored before anything else is recorded. It is
    /// only attached when the candidate has none on file; an anonymous caller
    /// never replaces a CV that HR already holds.
    pub async fn careers_apply(
        &self,
        job_id: i64,
        form: CareersApplication,
        resume: Option<ResumeFile>,
    ) -> ServiceResult<Application> {
        let job = self.get_open_job(job_id).await?;
        let email = validation::email(&form.email)?;
        let stored = match resume {
            Some(file) => Some(
                self.uploads
                    .store(file.original_name.as_deref(), &file.content_type, &file.data)
                    .await?,
            ),
            None => None,
        };

        let (mut candidate, application) = match self.record_public_application(job.id, email, form).await {
            Ok(recorded) => recorded,
            Err(e) => {
                if let Some(stored) = &stored {
                    self.remove_file(&stored.filename).await;
                }
                return Err(e);
            }
        };

        if let Some(stored) = stored {
            if candidate.resume_path.is_some() {
                tracing::info!(candidate_id = candidate.id, "Keeping the CV already on file");
                self.remove_file(&stored.filename).await;
            } else {
                candidate.resume_path = Some(stored.filename);
                candidate = self
                    .candidate_repo
                    .update(&candidate)
                    .await
                    .context("Failed to attach CV")?;
            }
        }

        self.email.send_in_background(
            candidate.email.clone(),
            templates::application_received(&candidate.full_name(), &job.title),
        );
        Ok(application)
    }

    async fn record_public_application(
        &self,
        job_id: i64,
        email: String,
        form: CareersApplication,
    ) -> ServiceResult<(Candidate, Application)> {
        let candidate = match self
            .candidate_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up candidate")?
        {
            Some(existing) => existing,
            None => {
                self.create_candidate(CreateCandidateInput {
                    first_name: form.first_name,
                    last_name: form.last_name,
                    email,
                    phone: form.phone,
                    source: Some("careers".to_string()),
                    notes: None,
                })
                .await?
            }
        };
        let application = self.apply(job_id, candidate.id, form.cover_letter).await?;
        Ok((candidate, application))
    }

    pub async fn list_applications(&self, filter: &ApplicationFilter) -> ServiceResult<Vec<ApplicationDetail>> {
        let applications = self
            .application_repo
            .list(filter)
            .await
            .context("Failed to list applications")?;
        let mut details = Vec::with_capacity(applications.len());
        for application in applications {
            details.push(self.detail(application).await?);
        }
        Ok(details)
    }

    pub async fn get_application(&self, id: i64) -> ServiceResult<ApplicationDetail> {
        let application = self.find_application(id).await?;
        self.detail(application).await
    }

    /// Move an application along the pipeline. Moving to `hired` goes
    /// through [`RecruitmentService::hire`] with default terms.
    pub async fn transition(&self, id: i64, to: ApplicationStatus) -> ServiceResult<Application> {
        if to == ApplicationStatus::Hired {
            return Ok(self.hire(id, HireInput::default()).await?.application);
        }
        let mut application = self.find_application(id).await?;
        check_transition(application.status, to)?;
        self.application_repo
            .update_status(id, to)
            .await
            .context("Failed to update application")?;
        tracing::info!(application_id = id, from = %application.status, to = %to, "Application moved");
        application.status = to;
        Ok(application)
    }

    /// Accept an offer: create the employee and fill an opening
    pub async fn hire(&self, id: i64, input: HireInput) -> ServiceResult<HireOutcome> {
        let mut application = self.find_application(id).await?;
        check_transition(application.status, ApplicationStatus::Hired)?;
        let job = self.get_job(application.job_id).await?;
        let candidate = self.get_candidate(application.candidate_id).await?;

        let employee = self
            .employees
            .create(CreateEmployeeInput {
                first_name: candidate.first_name.clone(),
                last_name: candidate.last_name.clone(),
                email: candidate.email.clone(),
                phone: candidate.phone.clone(),
                position: job.title.clone(),
                department_id: job.department_id,
                manager_id: input.manager_id,
                hire_date: self.clock.now().with_timezone(&self.offset).date_naive(),
                base_salary: input.base_salary,
            })
            .await?;

        self.application_repo
            .update_status(id, ApplicationStatus::Hired)
            .await
            .context("Failed to update application")?;
        application.status = ApplicationStatus::Hired;
        tracing::info!(application_id = id, employee_id = employee.id, "Candidate hired");

        let hired = self
            .application_repo
            .count_for_job(job.id, ApplicationStatus::Hired)
            .await
            .context("Failed to count hires")?;
        let job_closed = hired >= job.openings && job.status != JobStatus::Closed;
        if job_closed {
            self.close(job).await?;
        }

        Ok(HireOutcome {
            application,
            employee,
            job_closed,
        })
    }

    pub async fn delete_application(&self, id: i64) -> ServiceResult<()> {
        self.find_application(id).await?;
        self.application_repo
            .delete(id)
            .await
            .context("Failed to delete application")?;
        invalidate_dashboard(&self.cache).await;
        Ok(())
    }

    async fn find_application(&self, id: i64) -> ServiceResult<Application> {
        self.application_repo
            .get_by_id(id)
            .await
            .context("Failed to get application")?
            .or_not_found("Application", id)
    }

    async fn detail(&self, application: Application) -> ServiceResult<ApplicationDetail> {
        let job = self.get_job(application.job_id).await?;
        let candidate = self.get_candidate(application.candidate_id).await?;
        Ok(ApplicationDetail {
            application,
            job,
            candidate,
        })
    }

    // Interviews

    pub async fn schedule_interview(&self, input: CreateInterviewInput) -> ServiceResult<Interview> {
        let application = self.find_application(input.application_id).await?;
        if !matches!(
            application.status,
            ApplicationStatus::Screening | ApplicationStatus::Interview
        ) {
            return Err(ServiceError::invalid_state(format!(
                "Cannot interview an application that is {}",
                application.status
            )));
        }
        check_duration(input.duration_minutes)?;
        if input.scheduled_at <= self.clock.now() {
            return Err(ServiceError::validation("Interviews must be scheduled in the future"));
        }
        let interviewer = self.interviewer(input.interviewer_id).await?;
        self.ensure_free(interviewer.id, input.scheduled_at, input.duration_minutes, None)
            .await?;

        let now = self.clock.now();
        let interview = Interview {
            id: 0,
            application_id: application.id,
            interviewer_id: interviewer.id,
            scheduled_at: input.scheduled_at,
            duration_minutes: input.duration_minutes,
            location: validation::optional(input.location),
            status: InterviewStatus::Scheduled,
            feedback: None,
            rating: None,
            created_at: now,
            updated_at: now,
        };
        let interview = self
            .interview_repo
            .create(&interview)
            .await
            .context("Failed to create interview")?;

        if application.status == ApplicationStatus::Screening {
            self.application_repo
                .update_status(application.id, ApplicationStatus::Interview)
                .await
                .context("Failed to update application")?;
        }
        tracing::info!(
            interview_id = interview.id,
            application_id = application.id,
            interviewer_id = interviewer.id,
            "Interview scheduled"
        );

        let detail = self.detail(application).await?;
        let when = self.format_local(interview.scheduled_at);
        self.email.send_in_background(
            detail.candidate.email.clone(),
            templates::interview_scheduled(
                &detail.candidate.full_name(),
                &detail.job.title,
                &when,
                interview.location.as_deref(),
            ),
        );
        self.notifications
            .notify_employee(
                interviewer.id,
                NotificationKind::InterviewScheduled,
                "Interview scheduled",
                &format!(
                    "You interview {} for {} on {}",
                    detail.candidate.full_name(),
                    detail.job.title,
                    when
                ),
                Some(&format!("/interviews/{}", interview.id)),
            )
            .await;

        invalidate_dashboard(&self.cache).await;
        Ok(interview)
    }

    pub async fn update_interview(&self, id: i64, input: UpdateInterviewInput) -> ServiceResult<Interview> {
        let mut interview = self.scheduled_interview(id).await?;
        if let Some(interviewer_id) = input.interviewer_id {
            interview.interviewer_id = self.interviewer(interviewer_id).await?.id;
        }
        if let Some(scheduled_at) = input.scheduled_at {
            if scheduled_at <= self.clock.now() {
                return Err(ServiceError::validation("Interviews must be scheduled in the future"));
            }
            interview.scheduled_at = scheduled_at;
        }
        if let Some(duration) = input.duration_minutes {
            check_duration(duration)?;
            interview.duration_minutes = duration;
        }
        if let Some(location) = input.location {
            interview.location = validation::optional(Some(location));
        }
        self.ensure_free(
            interview.interviewer_id,
            interview.scheduled_at,
            interview.duration_minutes,
            Some(id),
        )
        .await?;

        let interview = self
            .interview_repo
            .update(&interview)
            .await
            .context("Failed to update interview")?;
        invalidate_dashboard(&self.cache).await;
        Ok(interview)
    }

    /// Record the outcome; HR or the interviewer only
    pub async fn complete_interview(
        &self,
        user: &User,
        id: i64,
        feedback: Option<String>,
        rating: i64,
    ) -> ServiceResult<Interview> {
        let mut interview = self.scheduled_interview(id).await?;
        if !user.is_hr() && !user.is_employee(interview.interviewer_id) {
            return Err(ServiceError::forbidden("Only the interviewer can record feedback"));
        }
        interview.rating = Some(validation::rating(rating)?);
        interview.feedback = validation::optional(feedback);
        interview.status = InterviewStatus::Completed;
        self.finish_interview(interview).await
    }

    pub async fn cancel_interview(&self, id: i64) -> ServiceResult<Interview> {
        let mut interview = self.scheduled_interview(id).await?;
        interview.status = InterviewStatus::Cancelled;
        self.finish_interview(interview).await
    }

    pub async fn mark_no_show(&self, id: i64) -> ServiceResult<Interview> {
        let mut interview = self.scheduled_interview(id).await?;
        interview.status = InterviewStatus::NoShow;
        self.finish_interview(interview).await
    }

    async fn finish_interview(&self, interview: Interview) -> ServiceResult<Interview> {
        let interview = self
            .interview_repo
            .update(&interview)
            .await
            .context("Failed to update interview")?;
        tracing::info!(interview_id = interview.id, status = %interview.status, "Interview closed");
        invalidate_dashboard(&self.cache).await;
        Ok(interview)
    }

    pub async fn list_interviews(&self, filter: &InterviewFilter) -> ServiceResult<Vec<Interview>> {
        Ok(self
            .interview_repo
            .list(filter)
            .await
            .context("Failed to list interviews")?)
    }

    pub async fn get_interview(&self, id: i64) -> ServiceResult<Interview> {
        self.interview_repo
            .get_by_id(id)
            .await
            .context("Failed to get interview")?
            .or_not_found("Interview", id)
    }

    async fn scheduled_interview(&self, id: i64) -> ServiceResult<Interview> {
        let interview = self.get_interview(id).await?;
        if interview.status != InterviewStatus::Scheduled {
            return Err(ServiceError::invalid_state(format!("Interview is {}", interview.status)));
        }
        Ok(interview)
    }

    async fn interviewer(&self, id: i64) -> ServiceResult<Employee> {
        match self
            .employee_repo
            .get_by_id(id)
            .await
            .context("Failed to get interviewer")?
        {
            Some(e) if e.is_active() => Ok(e),
            Some(_) => Err(ServiceError::validation("The interviewer is no longer employed")),
            None => Err(ServiceError::validation(format!("Employee {} does not exist", id))),
        }
    }

    /// Reject a slot that overlaps another scheduled interview of the same
    /// interviewer
    async fn ensure_free(
        &self,
        interviewer_id: i64,
        start: DateTime<Utc>,
        minutes: i64,
        except: Option<i64>,
    ) -> ServiceResult<()> {
        let booked = self
            .interview_repo
            .list(&InterviewFilter {
                interviewer_id: Some(interviewer_id),
                status: Some(InterviewStatus::Scheduled),
                ..Default::default()
            })
            .await
            .context("Failed to list interviews")?;
        if let Some(clash) = booked
            .iter()
            .find(|i| Some(i.id) != except && i.overlaps(start, minutes))
        {
            return Err(ServiceError::conflict(format!(
                "The interviewer is already booked from {} to {}",
                self.format_local(clash.scheduled_at),
                self.format_local(clash.ends_at())
            )));
        }
        Ok(())
    }

    async fn ensure_department(&self, id: i64) -> ServiceResult<()> {
        if self
            .department_repo
            .get_by_id(id)
            .await
            .context("Failed to get department")?
            .is_none()
        {
            return Err(ServiceError::validation(format!("Department {} does not exist", id)));
        }
        Ok(())
    }

    fn format_local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%Y-%m-%d %H:%M %:z").to_string()
    }
}

fn check_openings(openings: i64) -> ServiceResult<()> {
    if openings < 1 {
        return Err(ServiceError::validation("A job needs at least one opening"));
    }
    Ok(())
}

fn check_duration(minutes: i64) -> ServiceResult<()> {
    if !(MIN_INTERVIEW_MINUTES..=MAX_INTERVIEW_MINUTES).contains(&minutes) {
        return Err(ServiceError::validation(format!(
            "Interview length must be between {} and {} minutes",
            MIN_INTERVIEW_MINUTES, MAX_INTERVIEW_MINUTES
        )));
    }
    Ok(())
}

fn check_transition(from: ApplicationStatus, to: ApplicationStatus) -> ServiceResult<()> {
    if !from.can_transition_to(to) {
        return Err(ServiceError::invalid_state(format!(
            "Cannot move an application from {} to {}",
            from, to
        )));
    }
    Ok(())
}
