//! Public system endpoints
//!
//! - GET /api/time - Server clock, corrected by the last remote sync
//! - GET /api/health - Liveness, database reachability and request stats

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::config::DatabaseDriver;
use crate::db::DatabasePool;
use crate::services::clock::ClockSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub driver: DatabaseDriver,
    pub reachable: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/time", get(time))
        .route("/health", get(health))
}

async fn time(State(state): State<AppState>) -> Json<ClockSnapshot> {
    Json(state.clock.snapshot())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Database ping failed: {}", e);
            false
        }
    };
    let stats = &state.request_stats;

    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            driver: state.pool.driver(),
            reachable,
        },
        uptime_seconds: stats.uptime_seconds(),
        total_requests: stats.total_requests(),
        avg_response_time_ms: stats.avg_response_time_us() / 1000.0,
    })
}
