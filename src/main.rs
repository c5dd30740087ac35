//! HRHub - A self-hosted HR management backend

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hrhub::{api, config::Config, db, services::Clock};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hrhub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HRHub...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.upload.path).await?;

    let (state, rate_limiter) = api::build_state(pool, &config)?;

    if state.clock.has_remote() {
        state.clock.sync_or_keep().await;
    }

    // Purge expired sessions
    {
        let users = state.user_service.clone();
        let every = Duration::from_secs(config.session.cleanup_interval_secs.max(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(removed = n, "Expired sessions purged"),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Close sessions left open past the maximum length
    {
        let attendance = state.attendance_service.clone();
        let clock = state.clock.clone();
        let every = Duration::from_secs(config.attendance.auto_checkout_interval_secs.max(10));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = attendance.auto_checkout_sweep(clock.now()).await {
                    tracing::warn!("Auto-checkout sweep failed: {}", e);
                }
            }
        });
    }

    // Move employees in and out of on_leave as approved leave starts and ends
    {
        let leave = state.leave_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                if let Err(e) = leave.sync_leave_status().await {
                    tracing::warn!("Leave status sync failed: {}", e);
                }
            }
        });
    }

    // Refresh the clock offset
    if state.clock.has_remote() {
        let clock = state.clock.clone();
        let every = Duration::from_secs(config.clock.sync_interval_secs.max(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick fires immediately and startup already synced
            interval.tick().await;
            loop {
                interval.tick().await;
                clock.sync_or_keep().await;
            }
        });
    }

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
