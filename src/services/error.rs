//! Error type shared by the domain services

/// Error returned by the HR services.
///
/// The API layer maps each variant onto an HTTP status; `Internal` wraps
/// repository and plumbing failures and is never shown to clients verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness or overlap with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The entity is not in a state that allows the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {}", entity, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ServiceError::InvalidState(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Unwrap a lookup or fail with `NotFound`
pub(crate) trait OrNotFound<T> {
    fn or_not_found(self, entity: &str, id: impl std::fmt::Display) -> ServiceResult<T>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, entity: &str, id: impl std::fmt::Display) -> ServiceResult<T> {
        self.ok_or_else(|| ServiceError::not_found(entity, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(ServiceError::not_found("Employee", 7).to_string(), "Employee 7 not found");
        assert_eq!(
            ServiceError::validation("end date before start date").to_string(),
            "Validation error: end date before start date"
        );
    }

    #[test]
    fn test_or_not_found() {
        let missing: Option<i32> = None;
        assert!(matches!(missing.or_not_found("Job", 3), Err(ServiceError::NotFound(_))));
        assert_eq!(Some(1).or_not_found("Job", 3).unwrap(), 1);
    }

    #[test]
    fn test_from_anyhow() {
        let err: ServiceError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
