//! Job application model and its pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Candidate, Job};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub candidate_id: i64,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application with its job and candidate resolved
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub job: Job,
    pub candidate: Candidate,
}

string_enum! {
    #[derive(Default)]
    pub enum ApplicationStatus {
        #[default]
        Applied => "applied",
        Screening => "screening",
        Interview => "interview",
        Offer => "offer",
        Hired => "hired",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Next step along the happy path
    pub fn next(&self) -> Option<ApplicationStatus> {
        match self {
            ApplicationStatus::Applied => Some(ApplicationStatus::Screening),
            ApplicationStatus::Screening => Some(ApplicationStatus::Interview),
            ApplicationStatus::Interview => Some(ApplicationStatus::Offer),
            ApplicationStatus::Offer => Some(ApplicationStatus::Hired),
            _ => None,
        }
    }

    /// Whether the pipeline allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: ApplicationStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => true,
            _ => self.next() == Some(to),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub candidate_id: Option<i64>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}
