//! Periodic background jobs.
//!
//! Each job is a long-lived tokio task looping on its own fixed interval.
//! Ticks run the job body inline, so a slow pass can never overlap a second
//! run of the same job. Errors are caught at the job boundary: a failed tick
//! is logged and the next tick retries naturally. `Scheduler::stop` flips a
//! watch channel and waits for every task; in-flight store operations
//! complete before the task exits.

use crate::config::JobIntervals;
use crate::errors::ApiResult;
use crate::services::{FleetService, MissionService};
use crate::simulator::SimulatorService;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Everything the background jobs need, owned explicitly rather than held
/// as ambient global state.
pub struct SchedulerContext {
    pub fleet: Arc<FleetService>,
    pub missions: Arc<MissionService>,
    pub simulator: Arc<SimulatorService>,
    pub intervals: JobIntervals,
    pub started_at: DateTime<Utc>,
    pub simulation_enabled: bool,
}

/// Owns the periodic job tasks and their shared stop signal.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn all periodic jobs.
    pub fn start(ctx: SchedulerContext) -> Self {
        info!("starting background tasks");

        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        {
            let fleet = ctx.fleet.clone();
            handles.push(spawn_job(
                "battery-updates",
                Duration::from_secs(ctx.intervals.battery_seconds),
                shutdown.subscribe(),
                move || {
                    let fleet = fleet.clone();
                    async move {
                        let mut rng = StdRng::from_os_rng();
                        fleet.update_rover_batteries(&mut rng).await.map(|_| ())
                    }
                },
            ));
        }

        {
            let missions = ctx.missions.clone();
            handles.push(spawn_job(
                "mission-progress",
                Duration::from_secs(ctx.intervals.mission_seconds),
                shutdown.subscribe(),
                move || {
                    let missions = missions.clone();
                    async move {
                        let mut rng = StdRng::from_os_rng();
                        missions.advance_active_missions(&mut rng).await.map(|_| ())
                    }
                },
            ));
        }

        {
            let fleet = ctx.fleet.clone();
            let started_at = ctx.started_at;
            handles.push(spawn_job(
                "rover-health-checks",
                Duration::from_secs(ctx.intervals.health_seconds),
                shutdown.subscribe(),
                move || {
                    let fleet = fleet.clone();
                    async move {
                        let uptime_hours =
                            (Utc::now() - started_at).num_milliseconds() as f64 / 3_600_000.0;
                        let mut rng = StdRng::from_os_rng();
                        fleet.run_health_checks(uptime_hours, &mut rng).await.map(|_| ())
                    }
                },
            ));
        }

        {
            let fleet = ctx.fleet.clone();
            handles.push(spawn_job(
                "maintenance-scheduler",
                Duration::from_secs(ctx.intervals.maintenance_seconds),
                shutdown.subscribe(),
                move || {
                    let fleet = fleet.clone();
                    async move {
                        let mut rng = StdRng::from_os_rng();
                        fleet.schedule_maintenance(&mut rng).await.map(|_| ())
                    }
                },
            ));
        }

        {
            let fleet = ctx.fleet.clone();
            handles.push(spawn_job(
                "data-cleanup",
                Duration::from_secs(ctx.intervals.cleanup_seconds),
                shutdown.subscribe(),
                move || {
                    let fleet = fleet.clone();
                    async move { fleet.run_data_cleanup().await }
                },
            ));
        }

        if ctx.simulation_enabled {
            let simulator = ctx.simulator.clone();
            handles.push(spawn_job(
                "telemetry-simulation",
                Duration::from_secs(ctx.intervals.telemetry_seconds),
                shutdown.subscribe(),
                move || {
                    let simulator = simulator.clone();
                    async move {
                        let mut rng = StdRng::from_os_rng();
                        simulator.tick(&mut rng).await.map(|_| ())
                    }
                },
            ));
        } else {
            info!("telemetry simulation disabled");
        }

        info!(jobs = handles.len(), "all background tasks started");
        Self { shutdown, handles }
    }

    /// Stop every job and wait for in-flight ticks to finish.
    pub async fn stop(self) {
        info!("stopping all background tasks");
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("all background tasks stopped");
    }
}

/// Drive one job on a fixed interval until the shutdown signal flips.
///
/// The first tick fires one full period after start. A tick that returns an
/// error is logged and swallowed; it must never take the loop down.
fn spawn_job<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut body: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ApiResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the interval fires immediately; consume that tick so the job
        // waits one full period before its first pass
        ticker.tick().await;

        info!(job = name, period_secs = period.as_secs(), "background job started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(err) = body().await {
                        error!(job = name, error = %err, "background job tick failed");
                    }
                }
            }
        }
        info!(job = name, "background job stopped");
    })
}
