//! Job posting model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub department_id: Option<i64>,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    /// Positions to fill; the posting closes once this many are hired
    pub openings: i64,
    pub status: JobStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    #[derive(Default)]
    pub enum JobStatus {
        #[default]
        Draft => "draft",
        Open => "open",
        Closed => "closed",
    }
}

string_enum! {
    #[derive(Default)]
    pub enum EmploymentType {
        #[default]
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Internship => "internship",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobInput {
    pub title: String,
    #[serde(default)]
    pub department_id: Option<i64>,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(default = "default_openings")]
    pub openings: i64,
}

fn default_openings() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "super::user::double_option")]
    pub department_id: Option<Option<i64>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: Option<EmploymentType>,
    #[serde(default)]
    pub openings: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub department_id: Option<i64>,
    /// Matches title and location
    #[serde(default)]
    pub search: Option<String>,
}
