//! Configuration management
//!
//! This module handles loading and parsing configuration for HRHub.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Outbound mail configuration
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Attendance policy
    #[serde(default)]
    pub attendance: AttendanceConfig,
    /// Leave allowances
    #[serde(default)]
    pub leave: LeaveConfig,
    /// Payroll parameters
    #[serde(default)]
    pub payroll: PayrollConfig,
    /// Remote clock synchronisation
    #[serde(default)]
    pub clock: ClockConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Read the client address from proxy headers. Only enable behind a
    /// reverse proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/hrhub.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Days until a login session expires
    #[serde(default = "default_session_days")]
    pub expiration_days: i64,
    /// How often expired sessions are purged
    #[serde(default = "default_session_cleanup")]
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_session_days(),
            cleanup_interval_secs: default_session_cleanup(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

fn default_session_cleanup() -> u64 {
    3600
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_ttl() -> u64 {
    60
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed document MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "application/msword".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string(),
        "image/png".to_string(),
        "image/jpeg".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "application/pdf" => "pdf",
            "application/msword" => "doc",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "text/plain" => "txt",
            _ => "bin",
        }
    }
}

/// SMTP configuration for notification mail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// When false, mail is logged instead of sent
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Sender address
    #[serde(default = "default_smtp_from")]
    pub from: String,
    /// Sender display name
    #[serde(default = "default_smtp_from_name")]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: default_smtp_from(),
            from_name: default_smtp_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "no-reply@hrhub.local".to_string()
}

fn default_smtp_from_name() -> String {
    "HRHub".to_string()
}

/// Attendance policy as written in config.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Local shift start, `HH:MM`
    #[serde(default = "default_shift_start")]
    pub shift_start: String,
    /// Local shift end, `HH:MM`
    #[serde(default = "default_shift_end")]
    pub shift_end: String,
    /// Minutes after shift start before a check-in counts as late
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    #[serde(default = "default_standard_hours")]
    pub standard_hours: i64,
    #[serde(default = "default_half_day_hours")]
    pub half_day_hours: i64,
    /// Minutes beyond the standard day before a record counts as overtime
    #[serde(default = "default_overtime_threshold")]
    pub overtime_threshold_minutes: i64,
    /// Open sessions are closed automatically after this many hours
    #[serde(default = "default_max_session_hours")]
    pub max_session_hours: i64,
    #[serde(default = "default_auto_checkout_interval")]
    pub auto_checkout_interval_secs: u64,
    /// Company local time offset from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            shift_start: default_shift_start(),
            shift_end: default_shift_end(),
            grace_minutes: default_grace_minutes(),
            standard_hours: default_standard_hours(),
            half_day_hours: default_half_day_hours(),
            overtime_threshold_minutes: default_overtime_threshold(),
            max_session_hours: default_max_session_hours(),
            auto_checkout_interval_secs: default_auto_checkout_interval(),
            utc_offset_minutes: 0,
        }
    }
}

fn default_shift_start() -> String {
    "09:00".to_string()
}

fn default_shift_end() -> String {
    "17:00".to_string()
}

fn default_grace_minutes() -> i64 {
    15
}

fn default_standard_hours() -> i64 {
    8
}

fn default_half_day_hours() -> i64 {
    4
}

fn default_overtime_threshold() -> i64 {
    30
}

fn default_max_session_hours() -> i64 {
    12
}

fn default_auto_checkout_interval() -> u64 {
    300
}

/// Parsed attendance policy used by the attendance service
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub grace_minutes: i64,
    pub standard_minutes: i64,
    pub half_day_minutes: i64,
    pub overtime_threshold_minutes: i64,
    pub max_session_minutes: i64,
    pub offset: FixedOffset,
}

impl AttendancePolicy {
    /// Parse the textual shift times and offset from the config section
    pub fn from_config(config: &AttendanceConfig) -> Result<Self, ConfigError> {
        let shift_start = parse_shift_time("shift_start", &config.shift_start)?;
        let shift_end = parse_shift_time("shift_end", &config.shift_end)?;
        if shift_end <= shift_start {
            return Err(ConfigError::ValidationError(
                "attendance.shift_end must be after attendance.shift_start".to_string(),
            ));
        }
        if config.max_session_hours <= 0 || config.standard_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "attendance hours must be positive".to_string(),
            ));
        }
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "attendance.utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            shift_start,
            shift_end,
            grace_minutes: config.grace_minutes.max(0),
            standard_minutes: config.standard_hours * 60,
            half_day_minutes: config.half_day_hours * 60,
            overtime_threshold_minutes: config.overtime_threshold_minutes.max(0),
            max_session_minutes: config.max_session_hours * 60,
            offset,
        })
    }
}

fn parse_shift_time(field: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        ConfigError::ValidationError(format!(
            "attendance.{} must be HH:MM, got '{}'",
            field, value
        ))
    })
}

/// Leave allowances per calendar year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveConfig {
    #[serde(default = "default_annual_allowance")]
    pub annual_allowance_days: i64,
    #[serde(default = "default_sick_allowance")]
    pub sick_allowance_days: i64,
}

impl Default for LeaveConfig {
    fn default() -> Self {
        Self {
            annual_allowance_days: default_annual_allowance(),
            sick_allowance_days: default_sick_allowance(),
        }
    }
}

fn default_annual_allowance() -> i64 {
    21
}

fn default_sick_allowance() -> i64 {
    10
}

/// Payroll parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollConfig {
    /// Working hours per month used to derive the hourly rate
    #[serde(default = "default_monthly_hours")]
    pub monthly_hours: f64,
    #[serde(default = "default_overtime_multiplier")]
    pub overtime_multiplier: f64,
}

impl Default for PayrollConfig {
    fn default() -> Self {
        Self {
            monthly_hours: default_monthly_hours(),
            overtime_multiplier: default_overtime_multiplier(),
        }
    }
}

fn default_monthly_hours() -> f64 {
    160.0
}

fn default_overtime_multiplier() -> f64 {
    1.5
}

/// Remote clock synchronisation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Time API endpoint; the local clock is used unmodified when unset
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_clock_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            sync_interval_secs: default_sync_interval(),
            timeout_secs: default_clock_timeout(),
        }
    }
}

fn default_sync_interval() -> u64 {
    3600
}

fn default_clock_timeout() -> u64 {
    5
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        // Fail at startup rather than on the first check-in
        AttendancePolicy::from_config(&config.attendance)?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - HRHUB_SERVER_HOST
    /// - HRHUB_SERVER_PORT
    /// - HRHUB_SERVER_CORS_ORIGIN
    /// - HRHUB_SERVER_TRUST_PROXY_HEADERS
    /// - HRHUB_DATABASE_DRIVER
    /// - HRHUB_DATABASE_URL
    /// - HRHUB_SMTP_ENABLED
    /// - HRHUB_SMTP_HOST
    /// - HRHUB_SMTP_USERNAME
    /// - HRHUB_SMTP_PASSWORD
    /// - HRHUB_CLOCK_REMOTE_URL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HRHUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("HRHUB_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("HRHUB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(trust) = std::env::var("HRHUB_SERVER_TRUST_PROXY_HEADERS") {
            if let Ok(trust) = trust.parse::<bool>() {
                self.server.trust_proxy_headers = trust;
            }
        }

        if let Ok(driver) = std::env::var("HRHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("HRHUB_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(enabled) = std::env::var("HRHUB_SMTP_ENABLED") {
            if let Ok(enabled) = enabled.parse::<bool>() {
                self.smtp.enabled = enabled;
            }
        }
        if let Ok(host) = std::env::var("HRHUB_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Ok(username) = std::env::var("HRHUB_SMTP_USERNAME") {
            self.smtp.username = username;
        }
        if let Ok(password) = std::env::var("HRHUB_SMTP_PASSWORD") {
            self.smtp.password = password;
        }

        if let Ok(url) = std::env::var("HRHUB_CLOCK_REMOTE_URL") {
            self.clock.remote_url = if url.trim().is_empty() { None } else { Some(url) };
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
