//! Status rule engine: pure transition functions driven by the scheduler
//! jobs and the telemetry ingest path. Every stochastic branch draws from an
//! injected random source; given the same inputs and draws the outputs are
//! deterministic. None of these functions fail; out-of-range inputs are
//! clamped, not rejected.

use crate::domain::{
    ErrorSeverity, Mission, MissionStatus, Objective, RoverStatus, TelemetryError,
};
use crate::utils::round1;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Chance per health check that a lost-signal rover re-establishes contact.
const SIGNAL_RECOVERY_CHANCE: f64 = 0.20;
/// Chance per health check that a rover in maintenance comes back active.
const REPAIR_CHANCE: f64 = 0.30;
/// Chance per progress pass that an incomplete objective completes.
const OBJECTIVE_COMPLETION_CHANCE: f64 = 0.05;
/// Chance per pass that an active rover is pulled in for maintenance.
const MAINTENANCE_CHANCE: f64 = 0.10;

/// Hours of silence before a rover is declared lost.
const LOST_SIGNAL_AFTER_HOURS: f64 = 2.0;
/// Battery percentage below which an active rover goes critical.
const CRITICAL_BATTERY_LEVEL: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthOutcome {
    pub status: RoverStatus,
    /// Set when a stochastic signal recovery fired; the caller must refresh
    /// the rover's last-contact timestamp.
    pub contact_refreshed: bool,
}

/// Evaluate one rover's health and produce its next status.
///
/// Rules apply in order, each observing the mutations of the ones before it:
/// deterministic lost-signal recovery (fresh contact), stochastic lost-signal
/// recovery, the two-hour-silence rule, battery-critical, maintenance repair.
/// The two-hour-silence rule is suppressed until the process itself has been
/// up for two hours, so a stale `last_contact` inherited from before a
/// restart does not immediately strand the rover.
pub fn evaluate_health<R: Rng + ?Sized>(
    current: RoverStatus,
    battery_level: f64,
    hours_since_contact: f64,
    uptime_hours: f64,
    rng: &mut R,
) -> HealthOutcome {
    let battery = battery_level.clamp(0.0, 100.0);
    let mut status = current;
    let mut contact_refreshed = false;

    if status == RoverStatus::LostSignal && hours_since_contact < 1.0 {
        status = RoverStatus::Active;
    }

    if status == RoverStatus::LostSignal && rng.random_bool(SIGNAL_RECOVERY_CHANCE) {
        status = RoverStatus::Active;
        contact_refreshed = true;
    }

    let effective_silence = if contact_refreshed {
        0.0
    } else {
        hours_since_contact
    };
    if status != RoverStatus::LostSignal
        && effective_silence > LOST_SIGNAL_AFTER_HOURS
        && uptime_hours > LOST_SIGNAL_AFTER_HOURS
    {
        status = RoverStatus::LostSignal;
    }

    if status == RoverStatus::Active && battery < CRITICAL_BATTERY_LEVEL {
        status = RoverStatus::Critical;
    }

    if status == RoverStatus::Maintenance && rng.random_bool(REPAIR_CHANCE) {
        status = RoverStatus::Active;
    }

    HealthOutcome {
        status,
        contact_refreshed,
    }
}

/// Next battery level for the battery-update job.
///
/// Solar charging during hours 8..=16 adds up to 2%, otherwise the rover
/// drains up to 3%. Clamped to [0, 100], one decimal. Callers persist the
/// result only when the delta exceeds 0.1 to avoid write amplification.
pub fn next_battery_level<R: Rng + ?Sized>(current: f64, hour: u32, rng: &mut R) -> f64 {
    let current = current.clamp(0.0, 100.0);
    let change = if (8..=16).contains(&hour) {
        rng.random_range(0.0..2.0)
    } else {
        -rng.random_range(0.0..3.0)
    };
    round1((current + change).clamp(0.0, 100.0))
}

/// Threshold a battery delta must exceed before it is worth persisting.
pub const MEANINGFUL_BATTERY_DELTA: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct MissionProgress {
    pub objectives: Vec<Objective>,
    pub status: MissionStatus,
    pub end_date: Option<DateTime<Utc>>,
    /// Titles of objectives completed in this pass, for logging.
    pub newly_completed: Vec<String>,
    pub changed: bool,
}

/// Advance one mission: each incomplete objective independently completes
/// with a small probability; once every objective is complete and the
/// mission is active, the mission itself completes and the end date is
/// stamped. That transition is one-way.
pub fn advance_mission<R: Rng + ?Sized>(
    mission: &Mission,
    now: DateTime<Utc>,
    rng: &mut R,
) -> MissionProgress {
    let mut objectives = mission.objectives.clone();
    let mut newly_completed = Vec::new();

    for objective in &mut objectives {
        if !objective.completed && rng.random_bool(OBJECTIVE_COMPLETION_CHANCE) {
            objective.completed = true;
            newly_completed.push(objective.title.clone());
        }
    }

    let all_completed = !objectives.is_empty() && objectives.iter().all(|o| o.completed);

    let mut status = mission.status;
    let mut end_date = mission.end_date;
    let mut changed = !newly_completed.is_empty();

    if all_completed && mission.status == MissionStatus::Active {
        status = MissionStatus::Completed;
        end_date = Some(now);
        changed = true;
    }

    MissionProgress {
        objectives,
        status,
        end_date,
        newly_completed,
        changed,
    }
}

/// Whether an active rover should be pulled in for maintenance this pass.
pub fn should_schedule_maintenance<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.random_bool(MAINTENANCE_CHANCE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub critical: bool,
    pub message: Option<String>,
}

/// Critical-condition detection for ingested telemetry.
///
/// Checks run in a fixed order and a later message overwrites an earlier
/// one; weak signal below 15% is reported but only becomes critical below
/// 5%. Deterministic: no random source involved.
pub fn assess_reading(
    battery_level: Option<f64>,
    temperature_c: Option<f64>,
    errors: &[TelemetryError],
    signal_strength: Option<f64>,
) -> Assessment {
    let mut critical = false;
    let mut message = None;

    if let Some(battery) = battery_level {
        if battery < CRITICAL_BATTERY_LEVEL {
            message = Some("Critical battery level".to_string());
            critical = true;
        }
    }

    if let Some(temperature) = temperature_c {
        if !(-40.0..=80.0).contains(&temperature) {
            message = Some("Critical temperature".to_string());
            critical = true;
        }
    }

    if let Some(error) = errors
        .iter()
        .find(|e| e.severity == ErrorSeverity::Critical)
    {
        message = Some(format!("Critical error: {}", error.message));
        critical = true;
    }

    if let Some(signal) = signal_strength {
        if signal < 5.0 {
            message = Some("Signal loss imminent".to_string());
            critical = true;
        } else if signal < 15.0 {
            message = Some("Weak signal strength".to_string());
        }
    }

    Assessment { critical, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeadScientist, ObjectivePriority};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn lost_signal_with_fresh_contact_recovers() {
        let outcome = evaluate_health(RoverStatus::LostSignal, 80.0, 0.5, 100.0, &mut rng());
        assert_eq!(outcome.status, RoverStatus::Active);
    }

    #[test]
    fn active_rover_with_low_battery_goes_critical() {
        let outcome = evaluate_health(RoverStatus::Active, 9.9, 0.1, 100.0, &mut rng());
        assert_eq!(outcome.status, RoverStatus::Critical);
    }

    #[test]
    fn critical_battery_scenario_does_not_touch_signal_rules() {
        // battery 8%, active, heard from 30 minutes ago
        let outcome = evaluate_health(RoverStatus::Active, 8.0, 0.5, 100.0, &mut rng());
        assert_eq!(outcome.status, RoverStatus::Critical);
        assert!(!outcome.contact_refreshed);
    }

    #[test]
    fn long_silence_marks_rover_lost() {
        let outcome = evaluate_health(RoverStatus::Active, 80.0, 3.0, 100.0, &mut rng());
        assert_eq!(outcome.status, RoverStatus::LostSignal);
    }

    #[test]
    fn long_silence_is_ignored_right_after_process_start() {
        let outcome = evaluate_health(RoverStatus::Active, 80.0, 3.0, 0.2, &mut rng());
        assert_eq!(outcome.status, RoverStatus::Active);
    }

    #[test]
    fn repair_rule_is_a_noop_for_active_rovers() {
        // Whatever the draws, an active healthy rover stays active.
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = evaluate_health(RoverStatus::Active, 80.0, 0.1, 100.0, &mut rng);
            assert_eq!(outcome.status, RoverStatus::Active);
        }
    }

    #[test]
    fn maintenance_repairs_roughly_thirty_percent_of_the_time() {
        let mut rng = StdRng::seed_from_u64(99);
        let repaired = (0..10_000)
            .filter(|_| {
                evaluate_health(RoverStatus::Maintenance, 80.0, 0.1, 100.0, &mut rng).status
                    == RoverStatus::Active
            })
            .count();
        assert!(repaired > 2_700 && repaired < 3_300, "repaired {repaired}");
    }

    #[test]
    fn stochastic_signal_recovery_refreshes_contact() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut refreshed = 0;
        for _ in 0..10_000 {
            let outcome = evaluate_health(RoverStatus::LostSignal, 80.0, 5.0, 100.0, &mut rng);
            if outcome.contact_refreshed {
                assert_eq!(outcome.status, RoverStatus::Active);
                refreshed += 1;
            } else {
                assert_eq!(outcome.status, RoverStatus::LostSignal);
            }
        }
        assert!(refreshed > 1_700 && refreshed < 2_300, "refreshed {refreshed}");
    }

    #[test]
    fn out_of_range_battery_is_clamped_not_rejected() {
        let outcome = evaluate_health(RoverStatus::Active, -5.0, 0.1, 100.0, &mut rng());
        assert_eq!(outcome.status, RoverStatus::Critical);
    }

    #[test]
    fn battery_level_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(5);
        for start in [-20.0, 0.0, 0.05, 50.0, 99.95, 100.0, 140.0] {
            for hour in 0..24 {
                let next = next_battery_level(start, hour, &mut rng);
                assert!((0.0..=100.0).contains(&next), "battery {next} from {start}");
            }
        }
    }

    #[test]
    fn daytime_battery_update_charges_within_two_percent() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let next = next_battery_level(50.0, 12, &mut rng);
            assert!((50.0..=52.0).contains(&next), "daytime level {next}");
        }
    }

    #[test]
    fn nighttime_battery_update_drains_within_three_percent() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..1_000 {
            let next = next_battery_level(50.0, 2, &mut rng);
            assert!((47.0..=50.0).contains(&next), "nighttime level {next}");
        }
    }

    fn mission_with(objectives: Vec<Objective>, status: MissionStatus) -> Mission {
        let now = Utc::now();
        Mission {
            id: Uuid::new_v4(),
            name: "Valles Traverse".to_string(),
            description: String::new(),
            planet: "Mars".to_string(),
            start_date: now,
            end_date: None,
            status,
            objectives,
            lead_scientist: LeadScientist::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn objective(title: &str, completed: bool) -> Objective {
        Objective {
            title: title.to_string(),
            description: String::new(),
            completed,
            priority: ObjectivePriority::Medium,
        }
    }

    #[test]
    fn mission_completes_when_all_objectives_are_done() {
        let mission = mission_with(
            vec![objective("a", true), objective("b", true)],
            MissionStatus::Active,
        );
        let now = Utc::now();
        let progress = advance_mission(&mission, now, &mut rng());
        assert_eq!(progress.status, MissionStatus::Completed);
        assert_eq!(progress.end_date, Some(now));
        assert!(progress.changed);
    }

    #[test]
    fn mission_with_incomplete_objectives_stays_active() {
        // With p=0.05 per pass, a pass without completions shows up quickly.
        let mut rng = StdRng::seed_from_u64(2);
        let mission = mission_with(
            vec![objective("done", true), objective("pending", false)],
            MissionStatus::Active,
        );
        for _ in 0..20 {
            let progress = advance_mission(&mission, Utc::now(), &mut rng);
            if progress.newly_completed.is_empty() {
                assert_eq!(progress.status, MissionStatus::Active);
                assert!(progress.end_date.is_none());
                assert!(!progress.changed);
                return;
            }
        }
        panic!("expected at least one pass without completions");
    }

    #[test]
    fn planned_mission_never_auto_completes() {
        let mission = mission_with(vec![objective("a", true)], MissionStatus::Planned);
        let progress = advance_mission(&mission, Utc::now(), &mut rng());
        assert_eq!(progress.status, MissionStatus::Planned);
        assert!(progress.end_date.is_none());
    }

    #[test]
    fn mission_without_objectives_does_not_complete() {
        let mission = mission_with(Vec::new(), MissionStatus::Active);
        let progress = advance_mission(&mission, Utc::now(), &mut rng());
        assert_eq!(progress.status, MissionStatus::Active);
        assert!(!progress.changed);
    }

    #[test]
    fn maintenance_draw_matches_its_probability() {
        let mut rng = StdRng::seed_from_u64(21);
        let scheduled = (0..10_000)
            .filter(|_| should_schedule_maintenance(&mut rng))
            .count();
        assert!(scheduled > 800 && scheduled < 1_200, "scheduled {scheduled}");
    }

    #[test]
    fn assess_flags_critical_temperature() {
        let assessment = assess_reading(Some(60.0), Some(95.0), &[], None);
        assert!(assessment.critical);
        assert_eq!(assessment.message.as_deref(), Some("Critical temperature"));
    }

    #[test]
    fn assess_flags_low_battery() {
        let assessment = assess_reading(Some(8.0), Some(20.0), &[], Some(80.0));
        assert!(assessment.critical);
        assert_eq!(
            assessment.message.as_deref(),
            Some("Critical battery level")
        );
    }

    #[test]
    fn assess_boundary_temperatures_are_fine() {
        assert!(!assess_reading(None, Some(80.0), &[], None).critical);
        assert!(!assess_reading(None, Some(-40.0), &[], None).critical);
        assert!(assess_reading(None, Some(80.1), &[], None).critical);
    }

    #[test]
    fn assess_critical_error_carries_its_message() {
        let errors = vec![TelemetryError {
            code: "E006".to_string(),
            message: "Thermal regulation failure".to_string(),
            severity: ErrorSeverity::Critical,
            timestamp: Utc::now(),
        }];
        let assessment = assess_reading(Some(50.0), Some(20.0), &errors, None);
        assert!(assessment.critical);
        assert_eq!(
            assessment.message.as_deref(),
            Some("Critical error: Thermal regulation failure")
        );
    }

    #[test]
    fn assess_weak_signal_warns_without_critical() {
        let assessment = assess_reading(Some(50.0), Some(20.0), &[], Some(12.0));
        assert!(!assessment.critical);
        assert_eq!(assessment.message.as_deref(), Some("Weak signal strength"));
    }

    #[test]
    fn assess_signal_loss_imminent_is_critical() {
        let assessment = assess_reading(Some(50.0), Some(20.0), &[], Some(3.0));
        assert!(assessment.critical);
        assert_eq!(assessment.message.as_deref(), Some("Signal loss imminent"));
    }

    #[test]
    fn assess_clean_reading_reports_nothing() {
        let assessment = assess_reading(Some(90.0), Some(21.0), &[], Some(85.0));
        assert!(!assessment.critical);
        assert!(assessment.message.is_none());
    }
}
