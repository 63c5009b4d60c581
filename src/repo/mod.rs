/// Repository layer for database operations
use crate::domain::{
    Capability, Coordinates, LeadScientist, Location, LocationSnapshot, Mission, MissionStatus,
    NewTelemetryReading, Objective, Rover, RoverStatus, SystemStatus, TelemetryError,
    TelemetryReading,
};
use crate::errors::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct RoverRow {
    id: Uuid,
    name: String,
    model: String,
    status: String,
    planet: String,
    coord_x: f64,
    coord_y: f64,
    battery_level: f64,
    temperature_c: f64,
    last_contact: DateTime<Utc>,
    mission_id: Option<Uuid>,
    capabilities: Json<Vec<Capability>>,
    telemetry_frequency: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoverRow> for Rover {
    type Error = ApiError;

    fn try_from(row: RoverRow) -> ApiResult<Self> {
        let status = RoverStatus::parse(&row.status)
            .ok_or_else(|| ApiError::Internal(format!("unknown rover status: {}", row.status)))?;
        Ok(Rover {
            id: row.id,
            name: row.name,
            model: row.model,
            status,
            location: Location {
                coordinates: Coordinates {
                    x: row.coord_x,
                    y: row.coord_y,
                },
                planet: row.planet,
            },
            battery_level: row.battery_level,
            temperature_c: row.temperature_c,
            last_contact: row.last_contact,
            mission_id: row.mission_id,
            capabilities: row.capabilities.0,
            telemetry_frequency: row.telemetry_frequency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ROVER_COLUMNS: &str = "id, name, model, status, planet, coord_x, coord_y, battery_level, \
     temperature_c, last_contact, mission_id, capabilities, telemetry_frequency, \
     created_at, updated_at";

/// Rover store adapter
#[derive(Clone)]
pub struct RoverRepo {
    pool: PgPool,
}

impl RoverRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, rover: &Rover) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO rovers (id, name, model, status, planet, coord_x, coord_y, \
             battery_level, temperature_c, last_contact, mission_id, capabilities, \
             telemetry_frequency, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
        )
        .bind(rover.id)
        .bind(&rover.name)
        .bind(&rover.model)
        .bind(rover.status.as_str())
        .bind(&rover.location.planet)
        .bind(rover.location.coordinates.x)
        .bind(rover.location.coordinates.y)
        .bind(rover.battery_level)
        .bind(rover.temperature_c)
        .bind(rover.last_contact)
        .bind(rover.mission_id)
        .bind(Json(&rover.capabilities))
        .bind(rover.telemetry_frequency)
        .bind(rover.created_at)
        .bind(rover.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Option<Rover>> {
        let row = sqlx::query_as::<_, RoverRow>(&format!(
            "SELECT {ROVER_COLUMNS} FROM rovers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Rover::try_from).transpose()
    }

    /// List rovers, optionally filtered by status and planet
    pub async fn list(&self, status: Option<&str>, planet: Option<&str>) -> ApiResult<Vec<Rover>> {
        let rows = sqlx::query_as::<_, RoverRow>(&format!(
            "SELECT {ROVER_COLUMNS} FROM rovers \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR planet = $2) \
             ORDER BY name"
        ))
        .bind(status)
        .bind(planet)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Rover::try_from).collect()
    }

    pub async fn list_by_status(&self, status: RoverStatus) -> ApiResult<Vec<Rover>> {
        self.list(Some(status.as_str()), None).await
    }

    pub async fn list_by_mission(&self, mission_id: Uuid) -> ApiResult<Vec<Rover>> {
        let rows = sqlx::query_as::<_, RoverRow>(&format!(
            "SELECT {ROVER_COLUMNS} FROM rovers WHERE mission_id = $1 ORDER BY name"
        ))
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Rover::try_from).collect()
    }

    /// Active rovers below a battery threshold, lowest first
    pub async fn list_low_battery(&self, threshold: f64) -> ApiResult<Vec<Rover>> {
        let rows = sqlx::query_as::<_, RoverRow>(&format!(
            "SELECT {ROVER_COLUMNS} FROM rovers \
             WHERE battery_level < $1 AND status = 'active' \
             ORDER BY battery_level ASC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Rover::try_from).collect()
    }

    /// Persist the full rover state
    pub async fn update(&self, rover: &Rover) -> ApiResult<()> {
        sqlx::query(
            "UPDATE rovers SET name=$2, model=$3, status=$4, planet=$5, coord_x=$6, \
             coord_y=$7, battery_level=$8, temperature_c=$9, last_contact=$10, \
             mission_id=$11, capabilities=$12, telemetry_frequency=$13, updated_at=$14 \
             WHERE id=$1",
        )
        .bind(rover.id)
        .bind(&rover.name)
        .bind(&rover.model)
        .bind(rover.status.as_str())
        .bind(&rover.location.planet)
        .bind(rover.location.coordinates.x)
        .bind(rover.location.coordinates.y)
        .bind(rover.battery_level)
        .bind(rover.temperature_c)
        .bind(rover.last_contact)
        .bind(rover.mission_id)
        .bind(Json(&rover.capabilities))
        .bind(rover.telemetry_frequency)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fold the latest telemetry values back onto the rover document
    pub async fn update_telemetry_snapshot(
        &self,
        id: Uuid,
        last_contact: DateTime<Utc>,
        battery_level: f64,
        temperature_c: f64,
        coordinates: Coordinates,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE rovers SET last_contact=$2, battery_level=$3, temperature_c=$4, \
             coord_x=$5, coord_y=$6, updated_at=$2 WHERE id=$1",
        )
        .bind(id)
        .bind(last_contact)
        .bind(battery_level)
        .bind(temperature_c)
        .bind(coordinates.x)
        .bind(coordinates.y)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> ApiResult<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM rovers")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[derive(sqlx::FromRow)]
struct MissionRow {
    id: Uuid,
    name: String,
    description: String,
    planet: String,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    status: String,
    objectives: Json<Vec<Objective>>,
    lead_scientist: Json<LeadScientist>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MissionRow> for Mission {
    type Error = ApiError;

    fn try_from(row: MissionRow) -> ApiResult<Self> {
        let status = MissionStatus::parse(&row.status)
            .ok_or_else(|| ApiError::Internal(format!("unknown mission status: {}", row.status)))?;
        Ok(Mission {
            id: row.id,
            name: row.name,
            description: row.description,
            planet: row.planet,
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            objectives: row.objectives.0,
            lead_scientist: row.lead_scientist.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const MISSION_COLUMNS: &str = "id, name, description, planet, start_date, end_date, status, \
     objectives, lead_scientist, created_at, updated_at";

/// Mission store adapter
#[derive(Clone)]
pub struct MissionRepo {
    pool: PgPool,
}

impl MissionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, mission: &Mission) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO missions (id, name, description, planet, start_date, end_date, \
             status, objectives, lead_scientist, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
        )
        .bind(mission.id)
        .bind(&mission.name)
        .bind(&mission.description)
        .bind(&mission.planet)
        .bind(mission.start_date)
        .bind(mission.end_date)
        .bind(mission.status.as_str())
        .bind(Json(&mission.objectives))
        .bind(Json(&mission.lead_scientist))
        .bind(mission.created_at)
        .bind(mission.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Option<Mission>> {
        let row = sqlx::query_as::<_, MissionRow>(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Mission::try_from).transpose()
    }

    /// List missions, optionally filtered by status and planet
    pub async fn list(
        &self,
        status: Option<&str>,
        planet: Option<&str>,
    ) -> ApiResult<Vec<Mission>> {
        let rows = sqlx::query_as::<_, MissionRow>(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR planet = $2) \
             ORDER BY name"
        ))
        .bind(status)
        .bind(planet)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Mission::try_from).collect()
    }

    /// Active missions ordered by start date
    pub async fn list_active(&self) -> ApiResult<Vec<Mission>> {
        let rows = sqlx::query_as::<_, MissionRow>(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions WHERE status = 'active' \
             ORDER BY start_date ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Mission::try_from).collect()
    }

    /// Persist the full mission state
    pub async fn update(&self, mission: &Mission) -> ApiResult<()> {
        sqlx::query(
            "UPDATE missions SET name=$2, description=$3, planet=$4, start_date=$5, \
             end_date=$6, status=$7, objectives=$8, lead_scientist=$9, updated_at=$10 \
             WHERE id=$1",
        )
        .bind(mission.id)
        .bind(&mission.name)
        .bind(&mission.description)
        .bind(&mission.planet)
        .bind(mission.start_date)
        .bind(mission.end_date)
        .bind(mission.status.as_str())
        .bind(Json(&mission.objectives))
        .bind(Json(&mission.lead_scientist))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: i64,
    rover_id: Uuid,
    timestamp: DateTime<Utc>,
    battery_level: Option<f64>,
    temperature_c: Option<f64>,
    cpu_utilization: Option<f64>,
    memory_utilization: Option<f64>,
    disk_space_remaining: Option<f64>,
    planet: Option<String>,
    coord_x: Option<f64>,
    coord_y: Option<f64>,
    signal_strength: Option<f64>,
    sensor_readings: Json<Map<String, Value>>,
    system_status: Option<Json<SystemStatus>>,
    errors: Json<Vec<TelemetryError>>,
}

impl From<ReadingRow> for TelemetryReading {
    fn from(row: ReadingRow) -> Self {
        let location = match (row.coord_x, row.coord_y) {
            (Some(x), Some(y)) => Some(LocationSnapshot {
                coordinates: Coordinates { x, y },
                planet: row.planet,
            }),
            _ => None,
        };
        TelemetryReading {
            id: row.id,
            rover_id: row.rover_id,
            timestamp: row.timestamp,
            battery_level: row.battery_level,
            temperature_c: row.temperature_c,
            cpu_utilization: row.cpu_utilization,
            memory_utilization: row.memory_utilization,
            disk_space_remaining: row.disk_space_remaining,
            location,
            signal_strength: row.signal_strength,
            sensor_readings: row.sensor_readings.0,
            system_status: row.system_status.map(|s| s.0),
            errors: row.errors.0,
        }
    }
}

const READING_COLUMNS: &str = "id, rover_id, timestamp, battery_level, temperature_c, \
     cpu_utilization, memory_utilization, disk_space_remaining, planet, coord_x, coord_y, \
     signal_strength, sensor_readings, system_status, errors";

/// Aggregates over a rover's readings for one time window
#[derive(Debug, Clone)]
pub struct ReadingStats {
    pub battery_avg: Option<f64>,
    pub battery_min: Option<f64>,
    pub battery_max: Option<f64>,
    pub temperature_avg: Option<f64>,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub cpu_avg: Option<f64>,
    pub memory_avg: Option<f64>,
    pub signal_avg: Option<f64>,
    pub data_points: i64,
    pub error_count: i64,
}

/// Append-only telemetry log adapter
#[derive(Clone)]
pub struct TelemetryRepo {
    pool: PgPool,
}

impl TelemetryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one reading, returning its row id
    pub async fn insert(&self, reading: &NewTelemetryReading) -> ApiResult<i64> {
        let (planet, coord_x, coord_y) = match &reading.location {
            Some(snapshot) => (
                snapshot.planet.clone(),
                Some(snapshot.coordinates.x),
                Some(snapshot.coordinates.y),
            ),
            None => (None, None, None),
        };
        let row = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO telemetry_readings (rover_id, timestamp, battery_level, \
             temperature_c, cpu_utilization, memory_utilization, disk_space_remaining, \
             planet, coord_x, coord_y, signal_strength, sensor_readings, system_status, \
             errors) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14) RETURNING id",
        )
        .bind(reading.rover_id)
        .bind(reading.timestamp)
        .bind(reading.battery_level)
        .bind(reading.temperature_c)
        .bind(reading.cpu_utilization)
        .bind(reading.memory_utilization)
        .bind(reading.disk_space_remaining)
        .bind(planet)
        .bind(coord_x)
        .bind(coord_y)
        .bind(reading.signal_strength)
        .bind(Json(&reading.sensor_readings))
        .bind(reading.system_status.map(Json))
        .bind(Json(&reading.errors))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Most recent reading for a rover
    pub async fn latest_for_rover(&self, rover_id: Uuid) -> ApiResult<Option<TelemetryReading>> {
        let row = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {READING_COLUMNS} FROM telemetry_readings \
             WHERE rover_id = $1 ORDER BY timestamp DESC LIMIT 1"
        ))
        .bind(rover_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(TelemetryReading::from))
    }

    /// Readings for a rover, newest first, optionally bounded in time
    pub async fn list_for_rover(
        &self,
        rover_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
        skip: i64,
    ) -> ApiResult<Vec<TelemetryReading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {READING_COLUMNS} FROM telemetry_readings \
             WHERE rover_id = $1 \
               AND ($2::timestamptz IS NULL OR timestamp >= $2) \
               AND ($3::timestamptz IS NULL OR timestamp <= $3) \
             ORDER BY timestamp DESC LIMIT $4 OFFSET $5"
        ))
        .bind(rover_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TelemetryReading::from).collect())
    }

    pub async fn count_for_rover(
        &self,
        rover_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> ApiResult<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT count(*) FROM telemetry_readings \
             WHERE rover_id = $1 \
               AND ($2::timestamptz IS NULL OR timestamp >= $2) \
               AND ($3::timestamptz IS NULL OR timestamp <= $3)",
        )
        .bind(rover_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn count_all(&self) -> ApiResult<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM telemetry_readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Aggregate statistics for one rover over a time window
    pub async fn stats_for_rover(
        &self,
        rover_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ApiResult<ReadingStats> {
        type StatsTuple = (
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            i64,
            i64,
        );
        let row = sqlx::query_as::<_, StatsTuple>(
            "SELECT avg(battery_level), min(battery_level), max(battery_level), \
                    avg(temperature_c), min(temperature_c), max(temperature_c), \
                    avg(cpu_utilization), avg(memory_utilization), avg(signal_strength), \
                    count(*), \
                    count(*) FILTER (WHERE jsonb_array_length(errors) > 0) \
             FROM telemetry_readings \
             WHERE rover_id = $1 AND timestamp >= $2 AND timestamp <= $3",
        )
        .bind(rover_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(ReadingStats {
            battery_avg: row.0,
            battery_min: row.1,
            battery_max: row.2,
            temperature_avg: row.3,
            temperature_min: row.4,
            temperature_max: row.5,
            cpu_avg: row.6,
            memory_avg: row.7,
            signal_avg: row.8,
            data_points: row.9,
            error_count: row.10,
        })
    }
}

/// Initialize database tables
pub async fn init_db(pool: &PgPool) -> ApiResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rovers(
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            model TEXT NOT NULL,
            status TEXT NOT NULL,
            planet TEXT NOT NULL,
            coord_x DOUBLE PRECISION NOT NULL,
            coord_y DOUBLE PRECISION NOT NULL,
            battery_level DOUBLE PRECISION NOT NULL,
            temperature_c DOUBLE PRECISION NOT NULL,
            last_contact TIMESTAMPTZ NOT NULL,
            mission_id UUID,
            capabilities JSONB NOT NULL DEFAULT '[]',
            telemetry_frequency INT NOT NULL DEFAULT 60,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS missions(
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            planet TEXT NOT NULL,
            start_date TIMESTAMPTZ NOT NULL,
            end_date TIMESTAMPTZ,
            status TEXT NOT NULL,
            objectives JSONB NOT NULL DEFAULT '[]',
            lead_scientist JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS telemetry_readings(
            id BIGSERIAL PRIMARY KEY,
            rover_id UUID NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
            battery_level DOUBLE PRECISION,
            temperature_c DOUBLE PRECISION,
            cpu_utilization DOUBLE PRECISION,
            memory_utilization DOUBLE PRECISION,
            disk_space_remaining DOUBLE PRECISION,
            planet TEXT,
            coord_x DOUBLE PRECISION,
            coord_y DOUBLE PRECISION,
            signal_strength DOUBLE PRECISION,
            sensor_readings JSONB NOT NULL DEFAULT '{}',
            system_status JSONB,
            errors JSONB NOT NULL DEFAULT '[]',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS ix_telemetry_rover_time \
         ON telemetry_readings(rover_id, timestamp DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_rovers_status ON rovers(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_missions_status ON missions(status)")
        .execute(pool)
        .await?;

    Ok(())
}
