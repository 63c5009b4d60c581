/// Application configuration module
use anyhow::Context;
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub simulation_enabled: bool,
    pub job_intervals: JobIntervals,
}

#[derive(Clone, Debug)]
pub struct JobIntervals {
    pub battery_seconds: u64,
    pub mission_seconds: u64,
    pub health_seconds: u64,
    pub maintenance_seconds: u64,
    pub cleanup_seconds: u64,
    pub telemetry_seconds: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string());

        let simulation_enabled = env::var("ENABLE_SIMULATION")
            .map(|v| v != "false")
            .unwrap_or(true);

        let job_intervals = JobIntervals {
            battery_seconds: env_u64("BATTERY_EVERY_SECONDS", 120),
            mission_seconds: env_u64("MISSION_EVERY_SECONDS", 300),
            health_seconds: env_u64("HEALTH_EVERY_SECONDS", 180),
            maintenance_seconds: env_u64("MAINTENANCE_EVERY_SECONDS", 420),
            cleanup_seconds: env_u64("CLEANUP_EVERY_SECONDS", 900),
            telemetry_seconds: env_u64("TELEMETRY_EVERY_SECONDS", 15),
        };

        Ok(Self {
            database_url,
            bind_addr,
            simulation_enabled,
            job_intervals,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_u64_falls_back_on_missing_or_garbage() {
        assert_eq!(env_u64("FLEET_TEST_UNSET_INTERVAL", 120), 120);
        env::set_var("FLEET_TEST_BAD_INTERVAL", "not-a-number");
        assert_eq!(env_u64("FLEET_TEST_BAD_INTERVAL", 300), 300);
        env::remove_var("FLEET_TEST_BAD_INTERVAL");
    }

    #[test]
    fn env_u64_parses_valid_values() {
        env::set_var("FLEET_TEST_GOOD_INTERVAL", "45");
        assert_eq!(env_u64("FLEET_TEST_GOOD_INTERVAL", 120), 45);
        env::remove_var("FLEET_TEST_GOOD_INTERVAL");
    }
}
