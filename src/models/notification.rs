//! In-app notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Front-end route to open, e.g. `/leave/12`
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

string_enum! {
    pub enum NotificationKind {
        LeaveRequested => "leave_requested",
        LeaveDecided => "leave_decided",
        ReviewSubmitted => "review_submitted",
        InterviewScheduled => "interview_scheduled",
        PayslipIssued => "payslip_issued",
        AutoCheckout => "auto_checkout",
        General => "general",
    }
}
