/// Application routes configuration
use crate::handlers::{
    active_missions, add_mission_objective, create_mission, create_rover, get_mission, get_rover,
    health, latest_telemetry, list_missions, list_rovers, low_battery_rovers, mission_rovers,
    receive_telemetry, rover_command, rover_telemetry, telemetry_stats, update_mission,
    update_rover, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Rover endpoints
        .route("/api/rovers", get(list_rovers).post(create_rover))
        .route("/api/rovers/status/low-battery", get(low_battery_rovers))
        .route("/api/rovers/:id", get(get_rover).put(update_rover))
        .route("/api/rovers/:id/command", post(rover_command))
        // Mission endpoints
        .route("/api/missions", get(list_missions).post(create_mission))
        .route("/api/missions/status/active", get(active_missions))
        .route("/api/missions/:id", get(get_mission).put(update_mission))
        .route("/api/missions/:id/objectives", post(add_mission_objective))
        .route("/api/missions/:id/rovers", get(mission_rovers))
        // Telemetry endpoints
        .route("/api/telemetry/receive", post(receive_telemetry))
        .route("/api/telemetry/latest", get(latest_telemetry))
        .route("/api/telemetry/rover/:id", get(rover_telemetry))
        .route("/api/telemetry/stats/:id", get(telemetry_stats))
        .with_state(state)
}
