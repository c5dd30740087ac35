//! Authentication records: sessions, password reset tokens and login audit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session entity for user authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Single-use password reset token
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    /// A token can be redeemed once, before it expires
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

/// One login attempt, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLog {
    pub id: i64,
    pub username: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_expiry() {
        let session = Session {
            id: "abc".to_string(),
            user_id: 1,
            expires_at: Utc::now() - Duration::seconds(1),
            created_at: Utc::now() - Duration::days(7),
        };
        assert!(session.is_expired());
    }

    #[test]
    fn test_password_reset_usable() {
        let now = Utc::now();
        let mut reset = PasswordReset {
            token: "t".to_string(),
            user_id: 1,
            expires_at: now + Duration::hours(1),
            used: false,
            created_at: now,
        };
        assert!(reset.is_usable(now));
        assert!(!reset.is_usable(now + Duration::hours(2)));

        reset.used = true;
        assert!(!reset.is_usable(now));
    }
}
