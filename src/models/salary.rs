//! Salary (payslip) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salary {
    pub id: i64,
    pub employee_id: i64,
    /// Pay month, `YYYY-MM`
    pub period: String,
    pub base_amount: f64,
    pub overtime_hours: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_pay: f64,
    pub status: SalaryStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Salary {
    /// Recompute `net_pay` from the components
    pub fn recompute_net(&mut self) {
        self.net_pay = round_cents(self.base_amount + self.overtime_pay + self.bonus - self.deductions);
    }
}

/// Round a money amount to cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

string_enum! {
    #[derive(Default)]
    pub enum SalaryStatus {
        #[default]
        Draft => "draft",
        Paid => "paid",
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSalaryInput {
    #[serde(default)]
    pub bonus: Option<f64>,
    #[serde(default)]
    pub deductions: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalaryFilter {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub status: Option<SalaryStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.004), 10.0);
        assert_eq!(round_cents(10.005_1), 10.01);
        assert_eq!(round_cents(-3.333), -3.33);
    }

    #[test]
    fn test_recompute_net() {
        let now = Utc::now();
        let mut salary = Salary {
            id: 1,
            employee_id: 1,
            period: "2024-03".to_string(),
            base_amount: 3000.0,
            overtime_hours: 2.5,
            overtime_pay: 70.31,
            bonus: 100.0,
            deductions: 50.5,
            net_pay: 0.0,
            status: SalaryStatus::Draft,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        salary.recompute_net();
        assert_eq!(salary.net_pay, 3119.81);
    }
}
