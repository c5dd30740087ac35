//! User service
//!
//! Accounts, sessions and password management:
//! - registration of the first account, which becomes the administrator
//! - login with rate limiting and an audit trail in `login_logs`
//! - session validation and cleanup
//! - password change and token-based reset
//! - user administration

use crate::db::is_unique_violation;
use crate::db::repositories::{
    EmployeeRepository, LoginLogRepository, NewLoginLog, PasswordResetRepository,
    SessionRepository, UserRepository,
};
use crate::models::{
    CreateUserInput, ListParams, LoginLog, PagedResult, PasswordReset, Session, UpdateUserInput,
    User, UserRole, UserStatus,
};
use crate::services::email::{templates, EmailService};
use crate::services::password::{hash_password, is_acceptable_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::validation;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Reset tokens stay valid this long
const PASSWORD_RESET_TTL_HOURS: i64 = 1;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Bad credentials or a disabled account
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User {0} not found")]
    NotFound(i64),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Too many login attempts
    #[error("Too many attempts, try again later")]
    RateLimited,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Where a login attempt came from
#[derive(Debug, Clone, Default)]
pub struct LoginContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    login_log_repo: Arc<dyn LoginLogRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    email: Arc<EmailService>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        login_log_repo: Arc<dyn LoginLogRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
        email: Arc<EmailService>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            login_log_repo,
            employee_repo,
            rate_limiter,
            email,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    pub fn with_session_expiration(mut self, days: i64) -> Self {
        self.session_expiration_days = days.max(1);
        self
    }

    /// Whether an administrator account exists
    pub async fn has_admin(&self) -> Result<bool, UserServiceError> {
        let admins = self
            .user_repo
            .list_by_role(UserRole::Admin)
            .await
            .context("Failed to list administrators")?;
        Ok(!admins.is_empty())
    }

    /// Register the first account.
    ///
    /// Self-registration is only open while the system has no users; that
    /// first account becomes the administrator. Everyone else is created by
    /// an administrator through [`create_user`](Self::create_user).
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let (username, email) = self.validate_new_account(&input.username, &input.email, &input.password)?;

        let count = self.user_repo.count().await.context("Failed to count users")?;
        if count > 0 {
            return Err(UserServiceError::Forbidden(
                "Registration is closed; ask an administrator for an account".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .insert_user(User::new(username, email, password_hash, UserRole::Admin))
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Administrator registered");
        Ok(user)
    }

    /// Check credentials and open a session.
    ///
    /// Every attempt, successful or not, is written to the login log.
    pub async fn login(
        &self,
        input: LoginInput,
        context: LoginContext,
    ) -> Result<(Session, User), UserServiceError> {
        let username = input.username_or_email.trim().to_string();

        if let Some(ip) = context.ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                self.log_attempt(&username, &context, false, Some("ip_rate_limited")).await;
                return Err(UserServiceError::RateLimited);
            }
            self.rate_limiter.record_ip_request(ip).await;
        }

        if self.rate_limiter.is_username_limited(&username).await {
            self.log_attempt(&username, &context, false, Some("user_rate_limited")).await;
            return Err(UserServiceError::RateLimited);
        }

        let user = match self.find_user_by_username_or_email(&username).await? {
            Some(user) => user,
            None => {
                self.fail_login(&username, &context, "user_not_found").await;
                return Err(UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
            }
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            self.fail_login(&username, &context, "invalid_password").await;
            return Err(UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active() {
            self.log_attempt(&username, &context, false, Some("account_disabled")).await;
            return Err(UserServiceError::AuthenticationError(
                "This account has been disabled. Please contact HR.".to_string(),
            ));
        }

        self.rate_limiter.clear_username_attempts(&username).await;
        let session = self.create_session(user.id).await?;
        self.log_attempt(&username, &context, true, None).await;
        tracing::info!(user_id = user.id, "User logged in");

        Ok((session, user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    /// The user behind a session token, if the session is live.
    ///
    /// Expired sessions are deleted on sight; disabled accounts have no
    /// valid sessions.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(User::is_active))
    }

    /// Change one's own password; the current one must be supplied
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound(user_id))?;

        if !verify_password(current_password, &user.password_hash).context("Failed to verify password")? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        check_password_policy(new_password)?;

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo.update(&user).await.context("Failed to update password")?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Start a password reset for the account with this e-mail.
    ///
    /// Unknown or disabled addresses are silently ignored so the endpoint
    /// cannot be used to enumerate accounts. Returns the issued token when
    /// one was created; it is delivered by e-mail, never over the API.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, UserServiceError> {
        let email = email.trim().to_lowercase();
        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        {
            Some(user) if user.is_active() => user,
            _ => {
                tracing::info!("Password reset requested for unknown address");
                return Ok(None);
            }
        };

        let now = Utc::now();
        let reset = PasswordReset {
            token: Uuid::new_v4().simple().to_string(),
            user_id: user.id,
            expires_at: now + Duration::hours(PASSWORD_RESET_TTL_HOURS),
            used: false,
            created_at: now,
        };
        self.reset_repo
            .create(&reset)
            .await
            .context("Failed to store reset token")?;

        self.email.send_in_background(
            user.email.clone(),
            templates::password_reset(&user.username, &reset.token),
        );
        tracing::info!(user_id = user.id, "Password reset token issued");
        Ok(Some(reset.token))
    }

    /// Redeem a reset token. All of the user's sessions are closed.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), UserServiceError> {
        check_password_policy(new_password)?;

        let reset = self
            .reset_repo
            .get(token.trim())
            .await
            .context("Failed to get reset token")?
            .filter(|r| r.is_usable(Utc::now()))
            .ok_or_else(|| UserServiceError::ValidationError("Invalid or expired reset token".to_string()))?;

        let mut user = self
            .user_repo
            .get_by_id(reset.user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound(reset.user_id))?;

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo.update(&user).await.context("Failed to update password")?;
        self.reset_repo
            .mark_used(&reset.token)
            .await
            .context("Failed to mark reset token used")?;
        self.session_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to delete sessions")?;

        tracing::info!(user_id = user.id, "Password reset completed");
        Ok(())
    }

    /// Drop expired sessions and spent reset tokens
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let sessions = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        self.reset_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired reset tokens")?;
        Ok(sessions)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let (username, email) = self.validate_new_account(&input.username, &input.email, &input.password)?;
        if let Some(employee_id) = input.employee_id {
            self.check_employee_link(employee_id, None).await?;
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(username, email, password_hash, input.role.unwrap_or_default());
        user.employee_id = input.employee_id;

        let user = self.insert_user(user).await?;
        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn list_users(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self.user_repo.list(params).await.context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Change role, status, e-mail or employee link.
    ///
    /// An administrator cannot demote or disable their own account.
    /// Disabling an account ends its sessions.
    pub async fn update_user(
        &self,
        acting_user_id: i64,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound(id))?;

        if id == acting_user_id {
            if input.role.map_or(false, |r| r != user.role) {
                return Err(UserServiceError::Forbidden("You cannot change your own role".to_string()));
            }
            if input.status == Some(UserStatus::Disabled) {
                return Err(UserServiceError::Forbidden("You cannot disable your own account".to_string()));
            }
        }

        if let Some(email) = input.email {
            let email = validation::email(&email).map_err(|e| UserServiceError::ValidationError(e.to_string()))?;
            if let Some(other) = self.user_repo.get_by_email(&email).await.context("Failed to check email")? {
                if other.id != id {
                    return Err(UserServiceError::UserExists(format!("Email '{}' is already registered", email)));
                }
            }
            user.email = email;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(employee_id) = input.employee_id {
            if let Some(employee_id) = employee_id {
                self.check_employee_link(employee_id, Some(id)).await?;
            }
            user.employee_id = employee_id;
        }
        let disabling = input.status == Some(UserStatus::Disabled) && user.is_active();
        if let Some(status) = input.status {
            user.status = status;
        }

        let user = self.user_repo.update(&user).await.context("Failed to update user")?;
        if disabling {
            self.session_repo
                .delete_by_user(id)
                .await
                .context("Failed to delete sessions")?;
            tracing::info!(user_id = id, "User disabled");
        }
        Ok(user)
    }

    pub async fn delete_user(&self, acting_user_id: i64, id: i64) -> Result<(), UserServiceError> {
        if id == acting_user_id {
            return Err(UserServiceError::Forbidden("You cannot delete your own account".to_string()));
        }
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound(id))?;

        self.user_repo.delete(id).await.context("Failed to delete user")?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    pub async fn login_logs(&self, params: &ListParams) -> Result<PagedResult<LoginLog>, UserServiceError> {
        let (logs, total) = self
            .login_log_repo
            .list(params)
            .await
            .context("Failed to list login logs")?;
        Ok(PagedResult::new(logs, total, params))
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn validate_new_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(String, String), UserServiceError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserServiceError::ValidationError("Username cannot be empty".to_string()));
        }
        if username.contains('@') || username.chars().any(char::is_whitespace) {
            return Err(UserServiceError::ValidationError(
                "Username cannot contain '@' or spaces".to_string(),
            ));
        }
        let email = validation::email(email).map_err(|e| UserServiceError::ValidationError(e.to_string()))?;
        check_password_policy(password)?;
        Ok((username.to_string(), email))
    }

    /// Insert, turning unique-key violations into `UserExists`
    async fn insert_user(&self, user: User) -> Result<User, UserServiceError> {
        if self
            .user_repo
            .get_by_username(&user.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                user.username
            )));
        }
        if self
            .user_repo
            .get_by_email(&user.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }

        match self.user_repo.create(&user).await {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::UserExists(user.username)),
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// The employee must exist and not already belong to another account
    async fn check_employee_link(&self, employee_id: i64, user_id: Option<i64>) -> Result<(), UserServiceError> {
        if self
            .employee_repo
            .get_by_id(employee_id)
            .await
            .context("Failed to get employee")?
            .is_none()
        {
            return Err(UserServiceError::ValidationError(format!(
                "Employee {} does not exist",
                employee_id
            )));
        }
        if let Some(owner) = self
            .user_repo
            .get_by_employee_id(employee_id)
            .await
            .context("Failed to check employee link")?
        {
            if Some(owner.id) != user_id {
                return Err(UserServiceError::UserExists(format!(
                    "Employee {} is already linked to '{}'",
                    employee_id, owner.username
                )));
            }
        }
        Ok(())
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(&username_or_email.to_lowercase())
            .await
            .context("Failed to get user by email")?;

        Ok(user)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }

    async fn fail_login(&self, username: &str, context: &LoginContext, reason: &str) {
        self.rate_limiter.record_failed_attempt(username).await;
        self.log_attempt(username, context, false, Some(reason)).await;
        tracing::info!(username, reason, "Login failed");
    }

    /// Audit logging never blocks a login
    async fn log_attempt(&self, username: &str, context: &LoginContext, success: bool, reason: Option<&str>) {
        let entry = NewLoginLog {
            username: username.to_string(),
            ip_address: context.ip.map(|ip| ip.to_string()),
            user_agent: context.user_agent.clone(),
            success,
            failure_reason: reason.map(str::to_string),
        };
        if let Err(e) = self.login_log_repo.create(&entry).await {
            tracing::warn!("Failed to write login log: {:#}", e);
        }
    }
}

fn check_password_policy(password: &str) -> Result<(), UserServiceError> {
    if !is_acceptable_password(password) {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SmtpConfig;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::db::repositories::{
        SqlxEmployeeRepository, SqlxLoginLogRepository, SqlxPasswordResetRepository,
        SqlxSessionRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;

    pub(crate) fn user_service(pool: &DynDatabasePool) -> UserService {
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            SqlxLoginLogRepository::boxed(pool.clone()),
            SqlxEmployeeRepository::boxed(pool.clone()),
            Arc::new(LoginRateLimiter::new()),
            Arc::new(EmailService::new(SmtpConfig::default())),
        )
    }

    async fn setup() -> (DynDatabasePool, UserService) {
        let pool = setup_pool().await;
        let service = user_service(&pool);
        (pool, service)
    }

    async fn with_admin(service: &UserService) -> User {
        service
            .register(RegisterInput::new("admin", "admin@example.com", "password123"))
            .await
            .expect("Failed to register")
    }

    fn new_user(username: &str, role: UserRole) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
            role: Some(role),
            employee_id: None,
        }
    }

    fn from_ip(ip: &str) -> LoginContext {
        LoginContext {
            ip: Some(ip.parse().unwrap()),
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_user_is_admin_and_registration_closes() {
        let (_pool, service) = setup().await;
        assert!(!service.has_admin().await.unwrap());

        let admin = with_admin(&service).await;
        assert_eq!(admin.role, UserRole::Admin);
        assert!(service.has_admin().await.unwrap());

        let result = service
            .register(RegisterInput::new("second", "second@example.com", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service) = setup().await;
        for input in [
            RegisterInput::new("", "a@example.com", "password123"),
            RegisterInput::new("alice", "not-an-email", "password123"),
            RegisterInput::new("alice", "a@example.com", "short"),
            RegisterInput::new("al ice", "a@example.com", "password123"),
        ] {
            assert!(matches!(
                service.register(input).await,
                Err(UserServiceError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_login_with_username_or_email() {
        let (_pool, service) = setup().await;
        with_admin(&service).await;

        let (session, user) = service
            .login(LoginInput::new("admin", "password123"), LoginContext::default())
            .await
            .unwrap();
        assert_eq!(user.username, "admin");
        assert!(!session.is_expired());

        let (_, user) = service
            .login(LoginInput::new("ADMIN@example.com", "password123"), LoginContext::default())
            .await
            .unwrap();
        assert_eq!(user.username, "admin");
    }

    #[tokio::test]
    async fn test_login_failures_are_logged() {
        let (_pool, service) = setup().await;
        with_admin(&service).await;

        let wrong = service
            .login(LoginInput::new("admin", "wrong-password"), from_ip("10.1.1.1"))
            .await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));
        let missing = service
            .login(LoginInput::new("ghost", "password123"), from_ip("10.1.1.1"))
            .await;
        assert!(matches!(missing, Err(UserServiceError::AuthenticationError(_))));
        service
            .login(LoginInput::new("admin", "password123"), from_ip("10.1.1.1"))
            .await
            .unwrap();

        let logs = service.login_logs(&ListParams::default()).await.unwrap();
        assert_eq!(logs.total, 3);
        assert!(logs.items[0].success);
        assert_eq!(logs.items[1].failure_reason.as_deref(), Some("user_not_found"));
        assert_eq!(logs.items[2].failure_reason.as_deref(), Some("invalid_password"));
        assert_eq!(logs.items[2].ip_address.as_deref(), Some("10.1.1.1"));
    }

    #[tokio::test]
    async fn test_username_rate_limit() {
        let (_pool, service) = setup().await;
        with_admin(&service).await;

        for _ in 0..5 {
            let _ = service
                .login(LoginInput::new("admin", "wrong-password"), LoginContext::default())
                .await;
        }
        let result = service
            .login(LoginInput::new("admin", "password123"), LoginContext::default())
            .await;
        assert!(matches!(result, Err(UserServiceError::RateLimited)));
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let (_pool, service) = setup().await;
        with_admin(&service).await;

        for i in 0..10 {
            let _ = service
                .login(LoginInput::new(format!("user{}", i), "x"), from_ip("10.2.2.2"))
                .await;
        }
        let result = service
            .login(LoginInput::new("admin", "password123"), from_ip("10.2.2.2"))
            .await;
        assert!(matches!(result, Err(UserServiceError::RateLimited)));

        service
            .login(LoginInput::new("admin", "password123"), from_ip("10.2.2.3"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_login() {
        let (_pool, service) = setup().await;
        let admin = with_admin(&service).await;
        let user = service.create_user(new_user("bob", UserRole::Employee)).await.unwrap();
        let (session, _) = service
            .login(LoginInput::new("bob", "password123"), LoginContext::default())
            .await
            .unwrap();

        service
            .update_user(
                admin.id,
                user.id,
                UpdateUserInput {
                    status: Some(UserStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        let result = service
            .login(LoginInput::new("bob", "password123"), LoginContext::default())
            .await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_validate_and_logout() {
        let (_pool, service) = setup().await;
        with_admin(&service).await;
        let (session, _) = service
            .login(LoginInput::new("admin", "password123"), LoginContext::default())
            .await
            .unwrap();

        let user = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(user.username, "admin");

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.validate_session("no-such-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_removed() {
        let (pool, service) = setup().await;
        let admin = with_admin(&service).await;
        let session_repo = SqlxSessionRepository::new(pool.clone());
        let expired = Session {
            id: "expired-token".to_string(),
            user_id: admin.id,
            expires_at: Utc::now() - Duration::hours(1),
            created_at: Utc::now() - Duration::days(8),
        };
        session_repo.create(&expired).await.unwrap();

        assert!(service.validate_session("expired-token").await.unwrap().is_none());
        assert!(session_repo.get_by_id("expired-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password() {
        let (_pool, service) = setup().await;
        let admin = with_admin(&service).await;

        let wrong = service.change_password(admin.id, "nope-nope", "new-password").await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));
        let short = service.change_password(admin.id, "password123", "short").await;
        assert!(matches!(short, Err(UserServiceError::ValidationError(_))));

        service
            .change_password(admin.id, "password123", "new-password")
            .await
            .unwrap();
        service
            .login(LoginInput::new("admin", "new-password"), LoginContext::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (_pool, service) = setup().await;
        with_admin(&service).await;
        let (session, _) = service
            .login(LoginInput::new("admin", "password123"), LoginContext::default())
            .await
            .unwrap();

        assert!(service.forgot_password("nobody@example.com").await.unwrap().is_none());
        let token = service
            .forgot_password("admin@example.com")
            .await
            .unwrap()
            .expect("token issued");

        service.reset_password(&token, "brand-new-pass").await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        service
            .login(LoginInput::new("admin", "brand-new-pass"), LoginContext::default())
            .await
            .unwrap();

        let reused = service.reset_password(&token, "another-pass").await;
        assert!(matches!(reused, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_admin_user_management() {
        let (pool, service) = setup().await;
        let admin = with_admin(&service).await;
        let employee = insert_employee(&pool, "Grace", "Hopper").await;

        let mut input = new_user("grace", UserRole::Hr);
        input.employee_id = Some(employee.id);
        let grace = service.create_user(input).await.unwrap();
        assert_eq!(grace.role, UserRole::Hr);
        assert_eq!(grace.employee_id, Some(employee.id));

        let mut duplicate_link = new_user("other", UserRole::Employee);
        duplicate_link.employee_id = Some(employee.id);
        assert!(matches!(
            service.create_user(duplicate_link).await,
            Err(UserServiceError::UserExists(_))
        ));
        assert!(matches!(
            service.create_user(new_user("grace", UserRole::Employee)).await,
            Err(UserServiceError::UserExists(_))
        ));

        let updated = service
            .update_user(
                admin.id,
                grace.id,
                UpdateUserInput {
                    role: Some(UserRole::Manager),
                    employee_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Manager);
        assert!(updated.employee_id.is_none());

        let page = service.list_users(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);

        service.delete_user(admin.id, grace.id).await.unwrap();
        assert!(service.get_by_id(grace.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_cannot_remove_self() {
        let (_pool, service) = setup().await;
        let admin = with_admin(&service).await;

        assert!(matches!(
            service.delete_user(admin.id, admin.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
        let demote = service
            .update_user(
                admin.id,
                admin.id,
                UpdateUserInput {
                    role: Some(UserRole::Employee),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(demote, Err(UserServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup().await;
        let admin = with_admin(&service).await;
        let session_repo = SqlxSessionRepository::new(pool.clone());
        for i in 0..3 {
            session_repo
                .create(&Session {
                    id: format!("old-{}", i),
                    user_id: admin.id,
                    expires_at: Utc::now() - Duration::minutes(1),
                    created_at: Utc::now() - Duration::days(8),
                })
                .await
                .unwrap();
        }
        service
            .login(LoginInput::new("admin", "password123"), LoginContext::default())
            .await
            .unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 3);
    }
}
