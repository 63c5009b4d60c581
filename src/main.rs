/// Main application entry point with clean architecture
mod config;
mod domain;
mod errors;
mod handlers;
mod repo;
mod routes;
mod rules;
mod scheduler;
mod services;
mod simulator;
mod utils;

use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::repo::{init_db, MissionRepo, RoverRepo, TelemetryRepo};
use crate::routes::build_router;
use crate::scheduler::{Scheduler, SchedulerContext};
use crate::services::{FleetService, MissionService, RoverService, TelemetryService};
use crate::simulator::{SimulatorService, TelemetryGenerator};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    // Initialize database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    info!("Database connection pool established");

    // Initialize database schema
    init_db(&pool).await?;
    info!("Database schema initialized");

    // Initialize repositories
    let rover_repo = RoverRepo::new(pool.clone());
    let mission_repo = MissionRepo::new(pool.clone());
    let telemetry_repo = TelemetryRepo::new(pool.clone());

    // Initialize services
    let rover_service = Arc::new(RoverService::new(rover_repo.clone()));
    let mission_service = Arc::new(MissionService::new(mission_repo.clone(), rover_repo.clone()));
    let telemetry_service = Arc::new(TelemetryService::new(
        rover_repo.clone(),
        telemetry_repo.clone(),
    ));
    let fleet_service = Arc::new(FleetService::new(rover_repo.clone(), telemetry_repo.clone()));
    let generator = TelemetryGenerator::new()?;
    let simulator_service = Arc::new(SimulatorService::new(
        rover_repo.clone(),
        telemetry_repo.clone(),
        generator,
    ));

    // Initialize application state
    let state = AppState {
        rovers: rover_service,
        missions: mission_service.clone(),
        telemetry: telemetry_service,
    };

    // Start background jobs
    let scheduler = Scheduler::start(SchedulerContext {
        fleet: fleet_service,
        missions: mission_service,
        simulator: simulator_service,
        intervals: config.job_intervals.clone(),
        started_at: Utc::now(),
        simulation_enabled: config.simulation_enabled,
    });

    // Build router
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("fleet-command service listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight job ticks finish before exiting
    scheduler.stop().await;
    info!("fleet-command service stopped");

    Ok(())
}

/// Resolve when the process is asked to shut down
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received, shutting down gracefully");
}
