//! Goal model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub employee_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Percent complete, 0..=100
    pub progress: i64,
    pub status: GoalStatus,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    #[derive(Default)]
    pub enum GoalStatus {
        #[default]
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl GoalStatus {
    /// Status implied by a progress value
    pub fn from_progress(progress: i64) -> Self {
        match progress {
            p if p <= 0 => GoalStatus::NotStarted,
            p if p >= 100 => GoalStatus::Completed,
            _ => GoalStatus::InProgress,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoalInput {
    /// Defaults to the caller's own employee record
    #[serde(default)]
    pub employee_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGoalInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "super::user::double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalFilter {
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub status: Option<GoalStatus>,
}
