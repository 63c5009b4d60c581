/// Domain models for the fleet
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Rover operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoverStatus {
    Inactive,
    Active,
    Maintenance,
    Critical,
    LostSignal,
}

impl RoverStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoverStatus::Inactive => "inactive",
            RoverStatus::Active => "active",
            RoverStatus::Maintenance => "maintenance",
            RoverStatus::Critical => "critical",
            RoverStatus::LostSignal => "lost_signal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(RoverStatus::Inactive),
            "active" => Some(RoverStatus::Active),
            "maintenance" => Some(RoverStatus::Maintenance),
            "critical" => Some(RoverStatus::Critical),
            "lost_signal" => Some(RoverStatus::LostSignal),
            _ => None,
        }
    }
}

impl fmt::Display for RoverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mission lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Planned,
    Active,
    Completed,
    Suspended,
    Failed,
}

impl MissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Planned => "planned",
            MissionStatus::Active => "active",
            MissionStatus::Completed => "completed",
            MissionStatus::Suspended => "suspended",
            MissionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(MissionStatus::Planned),
            "active" => Some(MissionStatus::Active),
            "completed" => Some(MissionStatus::Completed),
            "suspended" => Some(MissionStatus::Suspended),
            "failed" => Some(MissionStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware capability tags carried by a rover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sampling,
    Imaging,
    Drilling,
    Weather,
    Spectroscopy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub planet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rover {
    pub id: Uuid,
    pub name: String,
    pub model: String,
    pub status: RoverStatus,
    pub location: Location,
    pub battery_level: f64,
    pub temperature_c: f64,
    pub last_contact: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<Uuid>,
    pub capabilities: Vec<Capability>,
    pub telemetry_frequency: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rover {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Coarse battery label exposed on the API
    pub fn battery_status(&self) -> &'static str {
        if self.battery_level > 75.0 {
            "Optimal"
        } else if self.battery_level > 50.0 {
            "Good"
        } else if self.battery_level > 25.0 {
            "Low"
        } else {
            "Critical"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectivePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for ObjectivePriority {
    fn default() -> Self {
        ObjectivePriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: ObjectivePriority,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadScientist {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub planet: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: MissionStatus,
    pub objectives: Vec<Objective>,
    pub lead_scientist: LeadScientist,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    /// Elapsed mission duration in whole days, against `end_date` or now
    pub fn duration_days(&self, now: DateTime<Utc>) -> i64 {
        let end = self.end_date.unwrap_or(now);
        let delta = (end - self.start_date).num_days();
        delta.abs()
    }
}

/// Health grade of one rover subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsystemHealth {
    Nominal,
    Degraded,
    Critical,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub main_computer: SubsystemHealth,
    pub navigation_system: SubsystemHealth,
    pub communication_system: SubsystemHealth,
    pub power_system: SubsystemHealth,
    pub mobility_system: SubsystemHealth,
}

impl SystemStatus {
    pub fn all_nominal() -> Self {
        Self {
            main_computer: SubsystemHealth::Nominal,
            navigation_system: SubsystemHealth::Nominal,
            communication_system: SubsystemHealth::Nominal,
            power_system: SubsystemHealth::Nominal,
            mobility_system: SubsystemHealth::Nominal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One onboard error reported inside a telemetry reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryError {
    pub code: String,
    pub message: String,
    pub severity: ErrorSeverity,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Location snapshot carried by a reading; planet is optional on ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub coordinates: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planet: Option<String>,
}

/// One immutable telemetry reading, as stored
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    pub id: i64,
    pub rover_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<f64>,
    pub sensor_readings: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_status: Option<SystemStatus>,
    pub errors: Vec<TelemetryError>,
}

/// A reading about to be persisted (no row id yet)
#[derive(Debug, Clone)]
pub struct NewTelemetryReading {
    pub rover_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub battery_level: Option<f64>,
    pub temperature_c: Option<f64>,
    pub cpu_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
    pub disk_space_remaining: Option<f64>,
    pub location: Option<LocationSnapshot>,
    pub signal_strength: Option<f64>,
    pub sensor_readings: Map<String, Value>,
    pub system_status: Option<SystemStatus>,
    pub errors: Vec<TelemetryError>,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rover_status_round_trips_through_strings() {
        for status in [
            RoverStatus::Inactive,
            RoverStatus::Active,
            RoverStatus::Maintenance,
            RoverStatus::Critical,
            RoverStatus::LostSignal,
        ] {
            assert_eq!(RoverStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RoverStatus::parse("unknown"), None);
    }

    #[test]
    fn rover_status_serializes_snake_case() {
        let json = serde_json::to_string(&RoverStatus::LostSignal).unwrap();
        assert_eq!(json, "\"lost_signal\"");
    }

    #[test]
    fn battery_status_thresholds() {
        let mut rover = test_rover();
        rover.battery_level = 90.0;
        assert_eq!(rover.battery_status(), "Optimal");
        rover.battery_level = 60.0;
        assert_eq!(rover.battery_status(), "Good");
        rover.battery_level = 30.0;
        assert_eq!(rover.battery_status(), "Low");
        rover.battery_level = 10.0;
        assert_eq!(rover.battery_status(), "Critical");
    }

    #[test]
    fn mission_duration_uses_end_date_when_set() {
        let start = Utc::now();
        let mission = Mission {
            id: Uuid::new_v4(),
            name: "Ares Survey".to_string(),
            description: String::new(),
            planet: "Mars".to_string(),
            start_date: start,
            end_date: Some(start + chrono::Duration::days(12)),
            status: MissionStatus::Completed,
            objectives: Vec::new(),
            lead_scientist: LeadScientist::default(),
            created_at: start,
            updated_at: start,
        };
        assert_eq!(mission.duration_days(start + chrono::Duration::days(40)), 12);
    }

    pub(super) fn test_rover() -> Rover {
        let now = Utc::now();
        Rover {
            id: Uuid::new_v4(),
            name: "Pathfinder II".to_string(),
            model: "MK-3".to_string(),
            status: RoverStatus::Active,
            location: Location {
                coordinates: Coordinates { x: 4.5, y: -1.2 },
                planet: "Mars".to_string(),
            },
            battery_level: 100.0,
            temperature_c: 20.0,
            last_contact: now,
            mission_id: None,
            capabilities: vec![Capability::Imaging, Capability::Weather],
            telemetry_frequency: 60,
            created_at: now,
            updated_at: now,
        }
    }
}
