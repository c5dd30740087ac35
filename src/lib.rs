//! HRHub - A self-hosted HR management backend
//!
//! Employees and departments, attendance with a server-side clock, leave,
//! goals and reviews, payroll, recruitment, reports and notifications,
//! served as a JSON API by axum.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
