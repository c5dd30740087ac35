//! Interview model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: i64,
    pub application_id: i64,
    /// Interviewing employee
    pub interviewer_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub location: Option<String>,
    pub status: InterviewStatus,
    pub feedback: Option<String>,
    /// 1..=5, set on completion
    pub rating: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    /// Whether this interview's slot intersects `[start, start + minutes)`
    pub fn overlaps(&self, start: DateTime<Utc>, minutes: i64) -> bool {
        let end = start + Duration::minutes(minutes);
        self.scheduled_at < end && start < self.ends_at()
    }
}

string_enum! {
    #[derive(Default)]
    pub enum InterviewStatus {
        #[default]
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInterviewInput {
    pub application_id: i64,
    pub interviewer_id: i64,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub location: Option<String>,
}

fn default_duration() -> i64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInterviewInput {
    #[serde(default)]
    pub interviewer_id: Option<i64>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterviewFilter {
    #[serde(default)]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub interviewer_id: Option<i64>,
    #[serde(default)]
    pub status: Option<InterviewStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn interview_at(hour: u32, minutes: i64) -> Interview {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, hour, 0, 0).unwrap();
        Interview {
            id: 1,
            application_id: 1,
            interviewer_id: 1,
            scheduled_at: at,
            duration_minutes: minutes,
            location: None,
            status: InterviewStatus::Scheduled,
            feedback: None,
            rating: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_overlap_detection() {
        let existing = interview_at(10, 60);
        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2024, 5, 6, h, m, 0).unwrap();

        assert!(existing.overlaps(at(10, 30), 60));
        assert!(existing.overlaps(at(9, 30), 45));
        assert!(existing.overlaps(at(9, 0), 180));
        // Back-to-back slots do not collide
        assert!(!existing.overlaps(at(11, 0), 30));
        assert!(!existing.overlaps(at(9, 0), 60));
    }
}
