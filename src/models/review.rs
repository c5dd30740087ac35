//! Performance review model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReview {
    pub id: i64,
    pub employee_id: i64,
    /// Reviewing user
    pub reviewer_id: Option<i64>,
    /// Review period label, e.g. `2024-H1` or `2024-Q3`
    pub period: String,
    /// 1..=5
    pub rating: i64,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub comments: Option<String>,
    pub status: ReviewStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    #[derive(Default)]
    pub enum ReviewStatus {
        #[default]
        Draft => "draft",
        Submitted => "submitted",
        Acknowledged => "acknowledged",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewInput {
    pub employee_id: i64,
    pub period: String,
    pub rating: i64,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub improvements: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewInput {
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub improvements: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFilter {
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub period: Option<String>,
}
