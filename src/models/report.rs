//! Stored report model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generated report. `parameters` and `data` are stored as JSON text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub report_type: ReportType,
    pub title: String,
    pub parameters: serde_json::Value,
    /// `{ "columns": [...], "rows": [...], "totals": {...} }`
    pub data: serde_json::Value,
    pub generated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

string_enum! {
    pub enum ReportType {
        AttendanceSummary => "attendance_summary",
        LeaveSummary => "leave_summary",
        Headcount => "headcount",
        PayrollSummary => "payroll_summary",
        RecruitmentPipeline => "recruitment_pipeline",
    }
}

impl ReportType {
    pub fn title(&self) -> &'static str {
        match self {
            ReportType::AttendanceSummary => "Attendance summary",
            ReportType::LeaveSummary => "Leave summary",
            ReportType::Headcount => "Headcount",
            ReportType::PayrollSummary => "Payroll summary",
            ReportType::RecruitmentPipeline => "Recruitment pipeline",
        }
    }
}
