//! Attendance model
//!
//! One record per employee per company-local work day. The record doubles as
//! the state of that day's session: the presence of `check_in_at`,
//! `break_started_at` and `check_out_at` determines [`SessionState`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: i64,
    pub employee_id: i64,
    /// Company-local calendar day
    pub work_date: NaiveDate,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    /// Start of the break in progress, if any
    pub break_started_at: Option<DateTime<Utc>>,
    /// Completed break time
    pub break_minutes: i64,
    /// Worked time, excluding breaks; final once checked out
    pub worked_minutes: i64,
    pub is_late: bool,
    pub status: AttendanceStatus,
    /// Closed by the sweep rather than the employee
    pub auto_checked_out: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attendance {
    pub fn state(&self) -> SessionState {
        match (self.check_in_at, self.check_out_at, self.break_started_at) {
            (None, _, _) => SessionState::NotCheckedIn,
            (Some(_), Some(_), _) => SessionState::CheckedOut,
            (Some(_), None, Some(_)) => SessionState::OnBreak,
            (Some(_), None, None) => SessionState::CheckedIn,
        }
    }

    /// Minutes worked up to `now`, excluding completed and running breaks
    pub fn worked_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        let Some(check_in) = self.check_in_at else {
            return 0;
        };
        let end = self.check_out_at.unwrap_or(now);
        let running_break = match (self.check_out_at, self.break_started_at) {
            (None, Some(started)) => (now - started).num_minutes().max(0),
            _ => 0,
        };
        ((end - check_in).num_minutes() - self.break_minutes - running_break).max(0)
    }
}

string_enum! {
    /// Day classification stored on every record
    pub enum AttendanceStatus {
        Present => "PRESENT",
        Late => "LATE",
        Absent => "ABSENT",
        OnBreak => "ON_BREAK",
        Overtime => "OVERTIME",
        HalfDay => "HALF_DAY",
        EarlyDeparture => "EARLY_DEPARTURE",
    }
}

/// Where an employee is in today's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotCheckedIn,
    CheckedIn,
    OnBreak,
    CheckedOut,
}

/// Live view of today's session for the check-in widget
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub work_date: NaiveDate,
    pub server_time: DateTime<Utc>,
    pub record: Option<Attendance>,
    pub worked_minutes: i64,
    pub break_minutes: i64,
    /// Minutes left before the session is closed automatically
    pub minutes_until_auto_checkout: Option<i64>,
}

/// Filters for listing attendance
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

/// HR correction of a record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAttendanceInput {
    #[serde(default)]
    pub check_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub break_minutes: Option<i64>,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Aggregate over a date range
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub days_recorded: i64,
    /// Record count per status text
    pub by_status: BTreeMap<String, i64>,
    pub total_worked_minutes: i64,
    pub overtime_minutes: i64,
    pub late_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record() -> Attendance {
        let now = Utc::now();
        Attendance {
            id: 1,
            employee_id: 1,
            work_date: now.date_naive(),
            check_in_at: None,
            check_out_at: None,
            break_started_at: None,
            break_minutes: 0,
            worked_minutes: 0,
            is_late: false,
            status: AttendanceStatus::Absent,
            auto_checked_out: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_state_from_fields() {
        let mut r = record();
        assert_eq!(r.state(), SessionState::NotCheckedIn);

        let t = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        r.check_in_at = Some(t);
        assert_eq!(r.state(), SessionState::CheckedIn);

        r.break_started_at = Some(t + Duration::hours(2));
        assert_eq!(r.state(), SessionState::OnBreak);

        r.check_out_at = Some(t + Duration::hours(8));
        assert_eq!(r.state(), SessionState::CheckedOut);
    }

    #[test]
    fn test_worked_minutes_excludes_breaks() {
        let t = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let mut r = record();
        r.check_in_at = Some(t);
        r.break_minutes = 30;

        assert_eq!(r.worked_minutes_at(t + Duration::hours(3)), 150);

        r.break_started_at = Some(t + Duration::hours(3));
        assert_eq!(r.worked_minutes_at(t + Duration::minutes(200)), 150);
    }

    #[test]
    fn test_worked_minutes_never_negative() {
        let t = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let mut r = record();
        r.check_in_at = Some(t);
        r.break_minutes = 120;
        assert_eq!(r.worked_minutes_at(t + Duration::hours(1)), 0);
    }

    #[test]
    fn test_status_uppercase_text() {
        assert_eq!(AttendanceStatus::EarlyDeparture.to_string(), "EARLY_DEPARTURE");
        assert_eq!("on_break".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::OnBreak);
        let json = serde_json::to_string(&AttendanceStatus::HalfDay).unwrap();
        assert_eq!(json, "\"HALF_DAY\"");
    }
}
