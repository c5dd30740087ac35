//! Leave request model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    /// Business days covered
    pub days: i64,
    pub reason: Option<String>,
    /// Uploaded handover document path
    pub handover_document: Option<String>,
    pub status: LeaveStatus,
    /// User who approved or declined
    pub reviewed_by: Option<i64>,
    pub review_comment: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

string_enum! {
    pub enum LeaveType {
        Annual => "annual",
        Sick => "sick",
        Personal => "personal",
        Unpaid => "unpaid",
        Parental => "parental",
    }
}

string_enum! {
    #[derive(Default)]
    pub enum LeaveStatus {
        #[default]
        Pending => "Pending",
        Approved => "Approved",
        Declined => "Declined",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeaveInput {
    /// HR may file on behalf of an employee; defaults to the caller
    #[serde(default)]
    pub employee_id: Option<i64>,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub handover_document: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveFilter {
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub status: Option<LeaveStatus>,
    #[serde(default)]
    pub leave_type: Option<LeaveType>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// Yearly balance for one leave type
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaveBalance {
    pub leave_type: LeaveType,
    /// `None` for types without a yearly cap
    pub allowance: Option<i64>,
    pub used: i64,
    pub pending: i64,
    pub remaining: Option<i64>,
}
