//! Outgoing e-mail
//!
//! Messages go out over SMTP with lettre. With `smtp.enabled` off (the
//! default) each message is logged and dropped, which keeps development and
//! tests free of a mail server.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::models::LeaveRequest;

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

pub struct EmailService {
    config: SmtpConfig,
}

impl EmailService {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.host.trim().is_empty()
    }

    /// Send one plain-text message
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.is_enabled() {
            tracing::info!(to, subject, "SMTP disabled, e-mail not sent");
            return Ok(());
        }

        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from)
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| anyhow!("Invalid to address '{}': {}", to, e))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.port);
        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }
        let mailer = builder.build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!(to, subject, "E-mail sent");
        Ok(())
    }

    pub async fn send_message(&self, to: &str, message: &EmailMessage) -> Result<()> {
        self.send(to, &message.subject, &message.body).await
    }

    /// Send without waiting; failures are logged
    pub fn send_in_background(self: &Arc<Self>, to: String, message: EmailMessage) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.send_message(&to, &message).await {
                tracing::warn!(to = %to, subject = %message.subject, "E-mail delivery failed: {:#}", e);
            }
        });
    }
}

/// Message bodies for the notifications the system sends
pub mod templates {
    use super::*;

    fn date_range(start: NaiveDate, end: NaiveDate) -> String {
        if start == end {
            start.to_string()
        } else {
            format!("{} to {}", start, end)
        }
    }

    pub fn leave_submitted(employee_name: &str, request: &LeaveRequest) -> EmailMessage {
        EmailMessage {
            subject: format!("Leave request from {}", employee_name),
            body: format!(
                "{} requested {} leave for {} ({} business day(s)).\n\nReason: {}\n\nPlease review it in HRHub.",
                employee_name,
                request.leave_type,
                date_range(request.start_date, request.end_date),
                request.days,
                request.reason.as_deref().unwrap_or("-"),
            ),
        }
    }

    pub fn leave_decided(request: &LeaveRequest) -> EmailMessage {
        let decision = request.status.as_str().to_lowercase();
        let mut body = format!(
            "Your {} leave for {} was {}.",
            request.leave_type,
            date_range(request.start_date, request.end_date),
            decision,
        );
        if let Some(comment) = request.review_comment.as_deref().filter(|c| !c.is_empty()) {
            body.push_str(&format!("\n\nComment: {}", comment));
        }
        EmailMessage {
            subject: format!("Leave request {}", decision),
            body,
        }
    }

    pub fn password_reset(username: &str, token: &str) -> EmailMessage {
        EmailMessage {
            subject: "Password reset".to_string(),
            body: format!(
                "Hello {},\n\nUse this token to reset your HRHub password: {}\n\nIt expires in one hour. If you did not ask for a reset, ignore this message.",
                username, token
            ),
        }
    }

    pub fn application_received(candidate_name: &str, job_title: &str) -> EmailMessage {
        EmailMessage {
            subject: format!("Application received: {}", job_title),
            body: format!(
                "Dear {},\n\nThank you for applying for the {} position. We will be in touch after reviewing your application.",
                candidate_name, job_title
            ),
        }
    }

    pub fn interview_scheduled(
        candidate_name: &str,
        job_title: &str,
        when: &str,
        location: Option<&str>,
    ) -> EmailMessage {
        EmailMessage {
            subject: format!("Interview scheduled: {}", job_title),
            body: format!(
                "Dear {},\n\nYour interview for the {} position is scheduled for {}.\nLocation: {}",
                candidate_name,
                job_title,
                when,
                location.unwrap_or("to be confirmed"),
            ),
        }
    }

    pub fn review_submitted(period: &str) -> EmailMessage {
        EmailMessage {
            subject: format!("Performance review {}", period),
            body: format!(
                "Your performance review for {} has been submitted. Please read and acknowledge it in HRHub.",
                period
            ),
        }
    }

    pub fn payslip_issued(period: &str, net_pay: f64) -> EmailMessage {
        EmailMessage {
            subject: format!("Payslip {}", period),
            body: format!("Your salary for {} has been paid. Net pay: {:.2}.", period, net_pay),
        }
    }
}
