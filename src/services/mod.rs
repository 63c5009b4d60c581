/// Business logic services layer
use crate::domain::{
    Capability, LeadScientist, Location, LocationSnapshot, Mission, MissionStatus,
    NewTelemetryReading, Objective, Rover, RoverStatus, SystemStatus, TelemetryError,
    TelemetryReading,
};
use crate::errors::{ApiError, ApiResult};
use crate::repo::{MissionRepo, ReadingStats, RoverRepo, TelemetryRepo};
use crate::rules;
use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRover {
    pub name: String,
    pub model: String,
    pub location: Location,
    #[serde(default)]
    pub status: Option<RoverStatus>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub mission_id: Option<Uuid>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub telemetry_frequency: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRover {
    pub name: Option<String>,
    pub model: Option<String>,
    pub status: Option<RoverStatus>,
    pub location: Option<Location>,
    pub battery_level: Option<f64>,
    pub temperature_c: Option<f64>,
    pub mission_id: Option<Uuid>,
    pub capabilities: Option<Vec<Capability>>,
    pub telemetry_frequency: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub command: String,
    pub timestamp: DateTime<Utc>,
    pub rover_id: Uuid,
}

/// Rover CRUD and command dispatch
pub struct RoverService {
    repo: RoverRepo,
}

impl RoverService {
    pub fn new(repo: RoverRepo) -> Self {
        Self { repo }
    }

    pub async fn create(&self, req: CreateRover) -> ApiResult<Rover> {
        if req.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("rover name is required".to_string()));
        }
        if req.model.trim().is_empty() {
            return Err(ApiError::InvalidInput("rover model is required".to_string()));
        }
        let now = Utc::now();
        let rover = Rover {
            id: Uuid::new_v4(),
            name: req.name,
            model: req.model,
            status: req.status.unwrap_or(RoverStatus::Inactive),
            location: req.location,
            battery_level: req.battery_level.unwrap_or(100.0).clamp(0.0, 100.0),
            temperature_c: req.temperature_c.unwrap_or(20.0),
            last_contact: now,
            mission_id: req.mission_id,
            capabilities: req.capabilities,
            telemetry_frequency: req.telemetry_frequency.unwrap_or(60).clamp(10, 3600),
            created_at: now,
            updated_at: now,
        };
        self.repo.insert(&rover).await?;
        info!(rover = %rover.name, model = %rover.model, planet = %rover.location.planet,
              "created new rover");
        Ok(rover)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Rover> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("rover {id}")))
    }

    pub async fn list(
        &self,
        status: Option<String>,
        planet: Option<String>,
    ) -> ApiResult<Vec<Rover>> {
        if let Some(s) = status.as_deref() {
            if RoverStatus::parse(s).is_none() {
                return Err(ApiError::InvalidInput(format!("unknown rover status: {s}")));
            }
        }
        self.repo.list(status.as_deref(), planet.as_deref()).await
    }

    pub async fn update(&self, id: Uuid, req: UpdateRover) -> ApiResult<Rover> {
        let mut rover = self.get(id).await?;
        let old_status = rover.status;

        if let Some(name) = req.name {
            rover.name = name;
        }
        if let Some(model) = req.model {
            rover.model = model;
        }
        if let Some(status) = req.status {
            rover.status = status;
        }
        if let Some(location) = req.location {
            rover.location = location;
        }
        if let Some(battery) = req.battery_level {
            rover.battery_level = battery.clamp(0.0, 100.0);
        }
        if let Some(temperature) = req.temperature_c {
            rover.temperature_c = temperature;
        }
        if let Some(mission_id) = req.mission_id {
            rover.mission_id = Some(mission_id);
        }
        if let Some(capabilities) = req.capabilities {
            rover.capabilities = capabilities;
        }
        if let Some(frequency) = req.telemetry_frequency {
            rover.telemetry_frequency = frequency.clamp(10, 3600);
        }

        self.repo.update(&rover).await?;

        if old_status != rover.status {
            info!(rover = %rover.name, old_status = %old_status, new_status = %rover.status,
                  "rover status changed by direct update");
        }
        Ok(rover)
    }

    /// Dispatch a command to an active rover; refreshes its last contact
    pub async fn command(&self, id: Uuid, req: CommandRequest) -> ApiResult<CommandResponse> {
        if req.command.trim().is_empty() {
            return Err(ApiError::InvalidInput("command is required".to_string()));
        }
        let mut rover = self.get(id).await?;
        if rover.status != RoverStatus::Active {
            return Err(ApiError::InvalidInput(format!(
                "cannot send command to rover in {} state",
                rover.status
            )));
        }
        let now = Utc::now();
        rover.last_contact = now;
        self.repo.update(&rover).await?;
        info!(rover = %rover.name, command = %req.command, params = ?req.params,
              "command sent to rover");
        Ok(CommandResponse {
            success: true,
            command: req.command,
            timestamp: now,
            rover_id: rover.id,
        })
    }

    pub async fn low_battery(&self, threshold: f64) -> ApiResult<Vec<Rover>> {
        self.repo.list_low_battery(threshold).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMission {
    pub name: String,
    pub description: String,
    pub planet: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<MissionStatus>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    #[serde(default)]
    pub lead_scientist: LeadScientist,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMission {
    pub name: Option<String>,
    pub description: Option<String>,
    pub planet: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<MissionStatus>,
    pub objectives: Option<Vec<Objective>>,
    pub lead_scientist: Option<LeadScientist>,
}

/// Mission CRUD and the periodic progress pass
pub struct MissionService {
    repo: MissionRepo,
    rovers: RoverRepo,
}

impl MissionService {
    pub fn new(repo: MissionRepo, rovers: RoverRepo) -> Self {
        Self { repo, rovers }
    }

    pub async fn create(&self, req: CreateMission) -> ApiResult<Mission> {
        if req.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("mission name is required".to_string()));
        }
        let now = Utc::now();
        let mission = Mission {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            planet: req.planet,
            start_date: req.start_date,
            end_date: req.end_date,
            status: req.status.unwrap_or(MissionStatus::Planned),
            objectives: req.objectives,
            lead_scientist: req.lead_scientist,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert(&mission).await?;
        info!(mission = %mission.name, planet = %mission.planet, status = %mission.status,
              "created new mission");
        Ok(mission)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Mission> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("mission {id}")))
    }

    pub async fn list(
        &self,
        status: Option<String>,
        planet: Option<String>,
    ) -> ApiResult<Vec<Mission>> {
        if let Some(s) = status.as_deref() {
            if MissionStatus::parse(s).is_none() {
                return Err(ApiError::InvalidInput(format!(
                    "unknown mission status: {s}"
                )));
            }
        }
        self.repo.list(status.as_deref(), planet.as_deref()).await
    }

    pub async fn update(&self, id: Uuid, req: UpdateMission) -> ApiResult<Mission> {
        let mut mission = self.get(id).await?;
        let old_status = mission.status;

        if let Some(name) = req.name {
            mission.name = name;
        }
        if let Some(description) = req.description {
            mission.description = description;
        }
        if let Some(planet) = req.planet {
            mission.planet = planet;
        }
        if let Some(start_date) = req.start_date {
            mission.start_date = start_date;
        }
        if let Some(end_date) = req.end_date {
            mission.end_date = Some(end_date);
        }
        if let Some(status) = req.status {
            mission.status = status;
        }
        if let Some(objectives) = req.objectives {
            mission.objectives = objectives;
        }
        if let Some(lead) = req.lead_scientist {
            mission.lead_scientist = lead;
        }

        self.repo.update(&mission).await?;

        if old_status != mission.status {
            info!(mission = %mission.name, old_status = %old_status,
                  new_status = %mission.status, "mission status changed by direct update");
        }
        Ok(mission)
    }

    pub async fn add_objective(&self, id: Uuid, objective: Objective) -> ApiResult<Mission> {
        if objective.title.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "objective title is required".to_string(),
            ));
        }
        let mut mission = self.get(id).await?;
        info!(mission = %mission.name, objective = %objective.title,
              "added objective to mission");
        mission.objectives.push(objective);
        self.repo.update(&mission).await?;
        Ok(mission)
    }

    pub async fn rovers_for(&self, id: Uuid) -> ApiResult<Vec<Rover>> {
        // 404 on a dangling mission id, matching the read endpoints
        let mission = self.get(id).await?;
        self.rovers.list_by_mission(mission.id).await
    }

    pub async fn list_active(&self) -> ApiResult<Vec<Mission>> {
        self.repo.list_active().await
    }

    /// Periodic mission-progress pass: objectives complete stochastically;
    /// fully-completed active missions close out. Per-mission store failures
    /// are logged and skipped.
    pub async fn advance_active_missions(&self, rng: &mut StdRng) -> ApiResult<usize> {
        let missions = self.repo.list_active().await?;
        if missions.is_empty() {
            debug!("no active missions found for progress updates");
            return Ok(0);
        }

        let now = Utc::now();
        let mut updated = 0;
        for mut mission in missions {
            let progress = rules::advance_mission(&mission, now, rng);
            if !progress.changed {
                continue;
            }

            for title in &progress.newly_completed {
                info!(mission = %mission.name, objective = %title,
                      "completed objective for mission");
            }
            let completed_now = progress.status == MissionStatus::Completed
                && mission.status == MissionStatus::Active;

            mission.objectives = progress.objectives;
            mission.status = progress.status;
            mission.end_date = progress.end_date;

            if completed_now {
                info!(mission = %mission.name, duration_days = mission.duration_days(now),
                      "mission completed");
            }

            match self.repo.update(&mission).await {
                Ok(()) => updated += 1,
                Err(err) => {
                    warn!(mission = %mission.name, error = %err,
                          "failed to persist mission progress")
                }
            }
        }

        info!(updated, "updated progress for missions");
        Ok(updated)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryIngest {
    pub rover_id: Uuid,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub cpu_utilization: Option<f64>,
    #[serde(default)]
    pub memory_utilization: Option<f64>,
    #[serde(default)]
    pub disk_space_remaining: Option<f64>,
    #[serde(default)]
    pub location: Option<LocationSnapshot>,
    #[serde(default)]
    pub signal_strength: Option<f64>,
    #[serde(default)]
    pub sensor_readings: Map<String, Value>,
    #[serde(default)]
    pub system_status: Option<SystemStatus>,
    #[serde(default)]
    pub errors: Vec<TelemetryError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoverStatusReport {
    pub id: Uuid,
    pub name: String,
    pub status: RoverStatus,
    pub status_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub telemetry_id: i64,
    pub timestamp: DateTime<Utc>,
    pub rover_status: RoverStatusReport,
}

/// Ingest and query paths for the telemetry log
pub struct TelemetryService {
    rovers: RoverRepo,
    readings: TelemetryRepo,
}

impl TelemetryService {
    pub fn new(rovers: RoverRepo, readings: TelemetryRepo) -> Self {
        Self { rovers, readings }
    }

    /// Accept one externally pushed reading.
    ///
    /// The rover must exist (nothing is persisted otherwise). The reading is
    /// stored verbatim, the rover document absorbs the fields the payload
    /// carries, and critical-condition detection drives the critical/active
    /// flip. Returns what was stored and whether the status moved.
    pub async fn ingest(&self, payload: TelemetryIngest) -> ApiResult<IngestResponse> {
        let mut rover = self
            .rovers
            .get(payload.rover_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("rover {}", payload.rover_id)))?;

        let now = Utc::now();
        let reading = NewTelemetryReading {
            rover_id: payload.rover_id,
            timestamp: payload.timestamp.unwrap_or(now),
            battery_level: payload.battery_level,
            temperature_c: payload.temperature_c,
            cpu_utilization: payload.cpu_utilization,
            memory_utilization: payload.memory_utilization,
            disk_space_remaining: payload.disk_space_remaining,
            location: payload.location.clone(),
            signal_strength: payload.signal_strength,
            sensor_readings: payload.sensor_readings.clone(),
            system_status: payload.system_status,
            errors: payload.errors.clone(),
        };
        let telemetry_id = self.readings.insert(&reading).await?;

        rover.last_contact = now;
        if let Some(battery) = payload.battery_level {
            rover.battery_level = battery.clamp(0.0, 100.0);
        }
        if let Some(temperature) = payload.temperature_c {
            rover.temperature_c = temperature;
        }
        if let Some(location) = &payload.location {
            rover.location.coordinates = location.coordinates;
        }

        let assessment = rules::assess_reading(
            payload.battery_level,
            payload.temperature_c,
            &payload.errors,
            payload.signal_strength,
        );

        let mut status_changed = false;
        if assessment.critical && rover.status != RoverStatus::Critical {
            rover.status = RoverStatus::Critical;
            status_changed = true;
        } else if !assessment.critical && rover.status == RoverStatus::Critical {
            rover.status = RoverStatus::Active;
            status_changed = true;
        }

        self.rovers.update(&rover).await?;

        if status_changed {
            warn!(rover = %rover.name, status = %rover.status,
                  reason = assessment.message.as_deref().unwrap_or("conditions cleared"),
                  "rover status changed by telemetry");
        }
        info!(rover = %rover.name, telemetry_id, "processed telemetry reading");

        Ok(IngestResponse {
            success: true,
            telemetry_id,
            timestamp: reading.timestamp,
            rover_status: RoverStatusReport {
                id: rover.id,
                name: rover.name,
                status: rover.status,
                status_changed,
                status_message: if status_changed { assessment.message } else { None },
            },
        })
    }

    pub async fn rover(&self, rover_id: Uuid) -> ApiResult<Rover> {
        self.rovers
            .get(rover_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("rover {rover_id}")))
    }

    pub async fn readings_for_rover(
        &self,
        rover_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
        skip: i64,
    ) -> ApiResult<(Vec<TelemetryReading>, i64)> {
        let readings = self
            .readings
            .list_for_rover(rover_id, start, end, limit, skip)
            .await?;
        let total = self.readings.count_for_rover(rover_id, start, end).await?;
        Ok((readings, total))
    }

    /// Latest reading per active rover
    pub async fn latest_for_active(&self) -> ApiResult<Vec<(Rover, Option<TelemetryReading>)>> {
        let rovers = self.rovers.list_by_status(RoverStatus::Active).await?;
        let mut out = Vec::with_capacity(rovers.len());
        for rover in rovers {
            let latest = self.readings.latest_for_rover(rover.id).await?;
            out.push((rover, latest));
        }
        Ok(out)
    }

    pub async fn stats_for_rover(
        &self,
        rover_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ApiResult<ReadingStats> {
        self.readings.stats_for_rover(rover_id, start, end).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HealthCheckSummary {
    pub critical: usize,
    pub lost_signal: usize,
    pub repaired: usize,
    pub recovered: usize,
}

/// Fleet-wide periodic passes driven by the scheduler
pub struct FleetService {
    rovers: RoverRepo,
    telemetry: TelemetryRepo,
}

impl FleetService {
    pub fn new(rovers: RoverRepo, telemetry: TelemetryRepo) -> Self {
        Self { rovers, telemetry }
    }

    /// Battery pass over active rovers: solar charge by day, drain by night.
    /// Negligible deltas are not persisted.
    pub async fn update_rover_batteries(&self, rng: &mut StdRng) -> ApiResult<usize> {
        let rovers = self.rovers.list_by_status(RoverStatus::Active).await?;
        if rovers.is_empty() {
            debug!("no active rovers found for battery updates");
            return Ok(0);
        }

        let hour = Utc::now().hour();
        let mut updated = 0;
        for mut rover in rovers {
            let next = rules::next_battery_level(rover.battery_level, hour, rng);
            if (next - rover.battery_level).abs() <= rules::MEANINGFUL_BATTERY_DELTA {
                continue;
            }
            rover.battery_level = next;
            match self.rovers.update(&rover).await {
                Ok(()) => updated += 1,
                Err(err) => {
                    warn!(rover = %rover.name, error = %err,
                          "failed to persist battery update")
                }
            }
        }

        info!(updated, "updated battery levels for rovers");
        Ok(updated)
    }

    /// Health pass over every rover: signal loss and recovery, critical
    /// battery, maintenance repair.
    pub async fn run_health_checks(
        &self,
        uptime_hours: f64,
        rng: &mut StdRng,
    ) -> ApiResult<HealthCheckSummary> {
        let rovers = self.rovers.list(None, None).await?;
        if rovers.is_empty() {
            debug!("no rovers found for health checks");
            return Ok(HealthCheckSummary::default());
        }

        let now = Utc::now();
        let mut summary = HealthCheckSummary::default();
        for mut rover in rovers {
            let hours_since_contact =
                (now - rover.last_contact).num_milliseconds() as f64 / 3_600_000.0;
            let outcome = rules::evaluate_health(
                rover.status,
                rover.battery_level,
                hours_since_contact,
                uptime_hours,
                rng,
            );

            if outcome.status == rover.status && !outcome.contact_refreshed {
                continue;
            }

            match (rover.status, outcome.status) {
                (old, RoverStatus::LostSignal) if old != RoverStatus::LostSignal => {
                    summary.lost_signal += 1;
                    warn!(rover = %rover.name, hours_since_contact, "rover lost signal");
                }
                (RoverStatus::Active, RoverStatus::Critical) => {
                    summary.critical += 1;
                    warn!(rover = %rover.name, battery_level = rover.battery_level,
                          "rover entered critical state due to low battery");
                }
                (RoverStatus::Maintenance, RoverStatus::Active) => {
                    summary.repaired += 1;
                    info!(rover = %rover.name, "rover maintenance completed");
                }
                (RoverStatus::LostSignal, _) => {
                    summary.recovered += 1;
                    info!(rover = %rover.name, "rover signal re-established");
                }
                _ => {}
            }

            rover.status = outcome.status;
            if outcome.contact_refreshed {
                rover.last_contact = now;
            }
            if let Err(err) = self.rovers.update(&rover).await {
                warn!(rover = %rover.name, error = %err,
                      "failed to persist health check result");
            }
        }

        info!(critical = summary.critical, lost_signal = summary.lost_signal,
              repaired = summary.repaired, recovered = summary.recovered,
              "completed rover health checks");
        Ok(summary)
    }

    /// Maintenance pass: each active rover has a small chance of being
    /// pulled in.
    pub async fn schedule_maintenance(&self, rng: &mut StdRng) -> ApiResult<usize> {
        let rovers = self.rovers.list_by_status(RoverStatus::Active).await?;
        if rovers.is_empty() {
            debug!("no active rovers found for maintenance scheduling");
            return Ok(0);
        }

        let mut scheduled = 0;
        for mut rover in rovers {
            if !rules::should_schedule_maintenance(rng) {
                continue;
            }
            rover.status = RoverStatus::Maintenance;
            match self.rovers.update(&rover).await {
                Ok(()) => {
                    scheduled += 1;
                    info!(rover = %rover.name, "scheduled maintenance for rover");
                }
                Err(err) => {
                    warn!(rover = %rover.name, error = %err,
                          "failed to persist maintenance transition")
                }
            }
        }

        info!(scheduled, "scheduled maintenance for rovers");
        Ok(scheduled)
    }

    /// Placeholder maintenance window: a bounded read-only sweep that
    /// reports how long it took and how much it scanned. Mutates nothing.
    pub async fn run_data_cleanup(&self) -> ApiResult<()> {
        let started = Instant::now();
        let rovers = self.rovers.list(None, None).await?;

        let mut scanned = 0u64;
        for rover in &rovers {
            self.telemetry.count_for_rover(rover.id, None, None).await?;
            scanned += 1;
        }
        let readings_total = self.telemetry.count_all().await?;
        let rover_total = self.rovers.count().await?;

        info!(duration_ms = started.elapsed().as_millis() as u64,
              rovers_scanned = scanned, rover_total, readings_total,
              "completed data cleanup sweep");
        Ok(())
    }
}
