/// HTTP request handlers
use crate::domain::{Health, Mission, Objective, Rover};
use crate::errors::ApiError;
use crate::services::{
    CommandRequest, CommandResponse, CreateMission, CreateRover, IngestResponse, MissionService,
    RoverService, TelemetryIngest, TelemetryService, UpdateMission, UpdateRover,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub rovers: Arc<RoverService>,
    pub missions: Arc<MissionService>,
    pub telemetry: Arc<TelemetryService>,
}

#[derive(Deserialize)]
pub struct EntityFilter {
    pub status: Option<String>,
    pub planet: Option<String>,
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: "fleet-command",
        timestamp: Utc::now(),
    })
}

/// List rovers, filterable by status and planet
pub async fn list_rovers(
    State(state): State<AppState>,
    Query(filter): Query<EntityFilter>,
) -> Result<Json<Vec<Rover>>, ApiError> {
    let rovers = state.rovers.list(filter.status, filter.planet).await?;
    Ok(Json(rovers))
}

pub async fn get_rover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Rover>, ApiError> {
    let rover = state.rovers.get(id).await?;
    Ok(Json(rover))
}

pub async fn create_rover(
    State(state): State<AppState>,
    Json(req): Json<CreateRover>,
) -> Result<(StatusCode, Json<Rover>), ApiError> {
    let rover = state.rovers.create(req).await?;
    Ok((StatusCode::CREATED, Json(rover)))
}

pub async fn update_rover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRover>,
) -> Result<Json<Rover>, ApiError> {
    let rover = state.rovers.update(id, req).await?;
    Ok(Json(rover))
}

/// Dispatch a command to a rover
pub async fn rover_command(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let response = state.rovers.command(id, req).await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct LowBatteryQuery {
    pub threshold: Option<f64>,
}

/// Active rovers below a battery threshold
pub async fn low_battery_rovers(
    State(state): State<AppState>,
    Query(query): Query<LowBatteryQuery>,
) -> Result<Json<Vec<Rover>>, ApiError> {
    let rovers = state.rovers.low_battery(query.threshold.unwrap_or(25.0)).await?;
    Ok(Json(rovers))
}

/// List missions, filterable by status and planet
pub async fn list_missions(
    State(state): State<AppState>,
    Query(filter): Query<EntityFilter>,
) -> Result<Json<Vec<Mission>>, ApiError> {
    let missions = state.missions.list(filter.status, filter.planet).await?;
    Ok(Json(missions))
}

pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Mission>, ApiError> {
    let mission = state.missions.get(id).await?;
    Ok(Json(mission))
}

pub async fn create_mission(
    State(state): State<AppState>,
    Json(req): Json<CreateMission>,
) -> Result<(StatusCode, Json<Mission>), ApiError> {
    let mission = state.missions.create(req).await?;
    Ok((StatusCode::CREATED, Json(mission)))
}

pub async fn update_mission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMission>,
) -> Result<Json<Mission>, ApiError> {
    let mission = state.missions.update(id, req).await?;
    Ok(Json(mission))
}

pub async fn add_mission_objective(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(objective): Json<Objective>,
) -> Result<(StatusCode, Json<Mission>), ApiError> {
    let mission = state.missions.add_objective(id, objective).await?;
    Ok((StatusCode::CREATED, Json(mission)))
}

/// Rovers assigned to a mission
pub async fn mission_rovers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Rover>>, ApiError> {
    let rovers = state.missions.rovers_for(id).await?;
    Ok(Json(rovers))
}

pub async fn active_missions(State(state): State<AppState>) -> Result<Json<Vec<Mission>>, ApiError> {
    let missions = state.missions.list_active().await?;
    Ok(Json(missions))
}

/// Accept one pushed telemetry reading
pub async fn receive_telemetry(
    State(state): State<AppState>,
    Json(payload): Json<TelemetryIngest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let response = state.telemetry.ingest(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Paginated telemetry history for one rover, newest first
pub async fn rover_telemetry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Value>, ApiError> {
    let rover = state.telemetry.rover(id).await?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let skip = query.skip.unwrap_or(0).max(0);
    let (readings, total) = state
        .telemetry
        .readings_for_rover(id, query.start_time, query.end_time, limit, skip)
        .await?;

    Ok(Json(serde_json::json!({
        "rover": { "id": rover.id, "name": rover.name },
        "telemetry": readings,
        "pagination": { "limit": limit, "skip": skip, "total": total },
    })))
}

/// Latest reading per active rover
pub async fn latest_telemetry(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let latest = state.telemetry.latest_for_active().await?;

    if latest.is_empty() {
        return Ok(Json(serde_json::json!({
            "message": "No active rovers found",
            "data": [],
        })));
    }

    let entries: Vec<Value> = latest
        .into_iter()
        .map(|(rover, telemetry)| {
            let battery_status = rover.battery_status();
            serde_json::json!({
                "rover": {
                    "id": rover.id,
                    "name": rover.name,
                    "model": rover.model,
                    "status": rover.status,
                    "planet": rover.location.planet,
                    "batteryStatus": battery_status,
                },
                "telemetry": telemetry,
            })
        })
        .collect();
    Ok(Json(serde_json::json!(entries)))
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub period: Option<String>,
}

fn period_duration(period: &str) -> Duration {
    match period {
        "1h" => Duration::hours(1),
        "6h" => Duration::hours(6),
        "7d" => Duration::days(7),
        "30d" => Duration::days(30),
        _ => Duration::days(1),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregated telemetry statistics for one rover over a period
pub async fn telemetry_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, ApiError> {
    let rover = state.telemetry.rover(id).await?;
    let period = query.period.unwrap_or_else(|| "24h".to_string());
    let end = Utc::now();
    let start = end - period_duration(&period);

    let stats = state.telemetry.stats_for_rover(id, start, end).await?;

    let statistics = if stats.data_points > 0 {
        serde_json::json!({
            "batteryLevel": {
                "avg": stats.battery_avg.map(round2),
                "min": stats.battery_min,
                "max": stats.battery_max,
            },
            "temperature": {
                "avg": stats.temperature_avg.map(round2),
                "min": stats.temperature_min,
                "max": stats.temperature_max,
            },
            "cpuUtilization": stats.cpu_avg.map(round2),
            "memoryUtilization": stats.memory_avg.map(round2),
            "signalStrength": stats.signal_avg.map(round2),
            "dataPoints": stats.data_points,
            "errorCount": stats.error_count,
        })
    } else {
        serde_json::json!({
            "message": "No data available for the specified period",
        })
    };

    Ok(Json(serde_json::json!({
        "roverId": rover.id,
        "roverName": rover.name,
        "period": period,
        "timeRange": { "start": start, "end": end },
        "statistics": statistics,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_durations_match_their_labels() {
        assert_eq!(period_duration("1h"), Duration::hours(1));
        assert_eq!(period_duration("6h"), Duration::hours(6));
        assert_eq!(period_duration("24h"), Duration::days(1));
        assert_eq!(period_duration("7d"), Duration::days(7));
        assert_eq!(period_duration("30d"), Duration::days(30));
        // anything unrecognized falls back to a day
        assert_eq!(period_duration("yesterday"), Duration::days(1));
    }

    #[test]
    fn round2_matches_display_precision() {
        assert_eq!(round2(42.456), 42.46);
        assert_eq!(round2(42.454), 42.45);
    }
}
