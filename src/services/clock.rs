//! Server clock
//!
//! Attendance timestamps come from one server-side clock. The clock is the
//! local system time plus an offset that can be refreshed from a remote time
//! API, so all clients see the same "now" through `GET /api/time`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::config::ClockConfig;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// What `/api/time` reports
#[derive(Debug, Clone, Serialize)]
pub struct ClockSnapshot {
    pub now: DateTime<Utc>,
    /// Remote minus local, in milliseconds
    pub offset_ms: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// `remote` once a sync succeeded, `system` before that
    pub source: &'static str,
}

/// Marker for "never synced" in `last_synced_ms`
const NEVER: i64 = i64::MIN;

pub struct ClockService {
    offset_ms: AtomicI64,
    last_synced_ms: AtomicI64,
    remote_url: Option<String>,
    client: reqwest::Client,
}

impl ClockService {
    pub fn new(config: &ClockConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            offset_ms: AtomicI64::new(0),
            last_synced_ms: AtomicI64::new(NEVER),
            remote_url: config
                .remote_url
                .as_ref()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            client,
        })
    }

    pub fn has_remote(&self) -> bool {
        self.remote_url.is_some()
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        match self.last_synced_ms.load(Ordering::Relaxed) {
            NEVER => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        let last_synced_at = self.last_synced_at();
        ClockSnapshot {
            now: self.now(),
            offset_ms: self.offset_ms(),
            last_synced_at,
            source: if last_synced_at.is_some() { "remote" } else { "system" },
        }
    }

    /// Fetch the remote time and store the new offset.
    ///
    /// The remote reading is compared with the midpoint of the request, so
    /// half the round trip is attributed to each direction.
    pub async fn sync(&self) -> Result<i64> {
        let url = self
            .remote_url
            .as_deref()
            .ok_or_else(|| anyhow!("No remote time URL configured"))?;

        let sent = Utc::now();
        let body: Value = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach time server")?
            .error_for_status()
            .context("Time server returned an error")?
            .json()
            .await
            .context("Time server returned invalid JSON")?;
        let received = Utc::now();

        let remote = parse_remote_time(&body)?;
        let midpoint = sent + (received - sent) / 2;
        let offset = (remote - midpoint).num_milliseconds();

        self.offset_ms.store(offset, Ordering::Relaxed);
        self.last_synced_ms
            .store(received.timestamp_millis(), Ordering::Relaxed);
        tracing::info!(offset_ms = offset, "Clock synchronised");
        Ok(offset)
    }

    /// Sync, keeping the previous offset on failure
    pub async fn sync_or_keep(&self) {
        if !self.has_remote() {
            return;
        }
        if let Err(e) = self.sync().await {
            tracing::warn!(
                offset_ms = self.offset_ms(),
                "Clock sync failed, keeping previous offset: {:#}",
                e
            );
        }
    }
}

impl Clock for ClockService {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::milliseconds(self.offset_ms())
    }
}

/// Read a time API response.
///
/// Accepted shapes: `{"unixtime": 1714989600}`,
/// `{"utc_datetime": "2024-05-06T10:00:00Z"}` and
/// `{"datetime": "2024-05-06T12:00:00+02:00"}`.
pub fn parse_remote_time(body: &Value) -> Result<DateTime<Utc>> {
    if let Some(unix) = body.get("unixtime") {
        let seconds = unix
            .as_f64()
            .ok_or_else(|| anyhow!("unixtime is not a number"))?;
        return Utc
            .timestamp_millis_opt((seconds * 1000.0).round() as i64)
            .single()
            .ok_or_else(|| anyhow!("unixtime out of range: {}", seconds));
    }

    for field in ["utc_datetime", "datetime"] {
        if let Some(text) = body.get(field).and_then(Value::as_str) {
            return DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("Invalid {}: {}", field, text));
        }
    }

    Err(anyhow!("Time server response has no recognised time field"))
}

/// Clock pinned to a settable instant
#[cfg(test)]
pub struct ManualClock {
    millis: AtomicI64,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_else(Utc::now)
    }
}
