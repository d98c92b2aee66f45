//! Stop lifecycle transitions.
//!
//! ```text
//! Pending --check_in--> InProgress --complete--> Completed
//!    ^                      |
//!    +------reset------ Failed <--fail--+
//! Pending/InProgress --(re-optimization only)--> Excluded
//! ```
//!
//! Every function here mutates a single `Journey` and must be called while the
//! caller holds that journey's lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::journey::{Journey, JourneyStatus, JourneyStop, Proof, StopStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub stop_id: Uuid,
    pub from: StopStatus,
    pub to: StopStatus,
}

impl Transition {
    /// Metric label, e.g. `pending_to_in_progress`.
    pub fn label(&self) -> String {
        format!("{}_to_{}", status_label(self.from), status_label(self.to))
    }
}

fn status_label(status: StopStatus) -> &'static str {
    match status {
        StopStatus::Pending => "pending",
        StopStatus::InProgress => "in_progress",
        StopStatus::Completed => "completed",
        StopStatus::Failed => "failed",
        StopStatus::Excluded => "excluded",
    }
}

pub fn start(journey: &mut Journey, now: DateTime<Utc>) -> Result<(), AppError> {
    if journey.status != JourneyStatus::Planned {
        return Err(AppError::InvalidTransition(format!(
            "journey {} is {:?}, only a planned journey can start",
            journey.id, journey.status
        )));
    }

    journey.status = JourneyStatus::InProgress;
    journey.actual_start_time = Some(now);
    refresh_status(journey, now);
    Ok(())
}

pub fn check_in(journey: &mut Journey, stop_id: Uuid, now: DateTime<Utc>) -> Result<Transition, AppError> {
    require_in_progress(journey)?;
    let position = locate(journey, stop_id)?;
    let stop = &journey.stops[position];
    expect_status(stop, StopStatus::Pending, "check in")?;

    let sequence = stop.sequence_index();
    if let Some(blocking) = journey.stops.iter().find(|other| {
        other.sequence_index() < sequence
            && other.status != StopStatus::Excluded
            && !other.status.is_resolved()
    }) {
        return Err(AppError::OutOfOrder(format!(
            "stop {} (sequence {}) must be completed or failed before stop {stop_id}",
            blocking.id(),
            blocking.sequence_index()
        )));
    }

    let stop = &mut journey.stops[position];
    stop.status = StopStatus::InProgress;
    stop.check_in_time = Some(now);

    Ok(Transition {
        stop_id,
        from: StopStatus::Pending,
        to: StopStatus::InProgress,
    })
}

pub fn complete(
    journey: &mut Journey,
    stop_id: Uuid,
    proof: Proof,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    require_in_progress(journey)?;
    let position = locate(journey, stop_id)?;
    let stop = &journey.stops[position];
    expect_status(stop, StopStatus::InProgress, "complete")?;

    let required = stop.planned.stop.proof_requirements;
    if required.signature && !proof.has_signature() {
        return Err(AppError::Validation(format!("stop {stop_id} requires a signature")));
    }
    if required.photo && !proof.has_photo() {
        return Err(AppError::Validation(format!("stop {stop_id} requires a photo")));
    }

    let stop = &mut journey.stops[position];
    stop.status = StopStatus::Completed;
    stop.check_out_time = Some(now);
    stop.proof = Some(proof);
    refresh_status(journey, now);

    Ok(Transition {
        stop_id,
        from: StopStatus::InProgress,
        to: StopStatus::Completed,
    })
}

pub fn fail(
    journey: &mut Journey,
    stop_id: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    require_in_progress(journey)?;
    let position = locate(journey, stop_id)?;
    expect_status(&journey.stops[position], StopStatus::InProgress, "fail")?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("a failure reason is required".to_string()));
    }

    let stop = &mut journey.stops[position];
    stop.status = StopStatus::Failed;
    stop.check_out_time = Some(now);
    stop.failure_reason = Some(reason.to_string());
    refresh_status(journey, now);

    Ok(Transition {
        stop_id,
        from: StopStatus::InProgress,
        to: StopStatus::Failed,
    })
}

/// Puts a failed stop back to pending for a retry. Completed stops never reset.
pub fn reset(journey: &mut Journey, stop_id: Uuid) -> Result<Transition, AppError> {
    let position = locate(journey, stop_id)?;
    expect_status(&journey.stops[position], StopStatus::Failed, "reset")?;
    if journey.status != JourneyStatus::InProgress {
        return Err(AppError::InvalidTransition(format!(
            "stop {stop_id} can only be retried while journey {} is in progress",
            journey.id
        )));
    }

    let stop = &mut journey.stops[position];
    stop.status = StopStatus::Pending;
    stop.check_in_time = None;
    stop.check_out_time = None;
    stop.failure_reason = None;
    stop.proof = None;

    Ok(Transition {
        stop_id,
        from: StopStatus::Failed,
        to: StopStatus::Pending,
    })
}

/// Removes a stop from the active plan. Only re-optimization calls this.
pub(crate) fn exclude(stop: &mut JourneyStop, reason: &str) -> Result<Transition, AppError> {
    let from = stop.status;
    if !matches!(from, StopStatus::Pending | StopStatus::InProgress) {
        return Err(AppError::InvalidTransition(format!(
            "stop {} is {from:?} and cannot be excluded",
            stop.id()
        )));
    }

    stop.status = StopStatus::Excluded;
    stop.exclusion_reason = Some(reason.to_string());

    Ok(Transition {
        stop_id: stop.id(),
        from,
        to: StopStatus::Excluded,
    })
}

/// Re-derives the journey status from its stops. Returns true on change.
pub fn refresh_status(journey: &mut Journey, now: DateTime<Utc>) -> bool {
    if journey.status != JourneyStatus::InProgress {
        return false;
    }

    let finished = journey
        .stops
        .iter()
        .filter(|stop| stop.status != StopStatus::Excluded)
        .all(|stop| stop.status.is_resolved());

    if finished {
        journey.status = JourneyStatus::Completed;
        journey.completed_at = Some(now);
    }
    finished
}

fn require_in_progress(journey: &Journey) -> Result<(), AppError> {
    if journey.status != JourneyStatus::InProgress {
        return Err(AppError::InvalidTransition(format!(
            "journey {} is {:?}, not in progress",
            journey.id, journey.status
        )));
    }
    Ok(())
}

fn locate(journey: &Journey, stop_id: Uuid) -> Result<usize, AppError> {
    journey
        .stop_position(stop_id)
        .ok_or_else(|| AppError::NotFound(format!("stop {stop_id} not found in journey {}", journey.id)))
}

fn expect_status(stop: &JourneyStop, expected: StopStatus, action: &str) -> Result<(), AppError> {
    if stop.status != expected {
        return Err(AppError::InvalidTransition(format!(
            "cannot {action} stop {}: it is {:?}",
            stop.id(),
            stop.status
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{check_in, complete, exclude, fail, reset, start};
    use crate::error::AppError;
    use crate::models::journey::{Journey, JourneyStatus, JourneyStop, Proof, StopStatus};
    use crate::models::optimization::{OptimizationMode, Tolerances};
    use crate::models::stop::{Coordinate, OptimizedStop, Priority, ProofRequirements, Stop};

    pub(crate) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    pub(crate) fn journey_with(count: u128) -> Journey {
        let stops = (1..=count)
            .map(|seed| {
                JourneyStop::pending(OptimizedStop {
                    stop: Stop {
                        id: Uuid::from_u128(seed),
                        coordinate: Coordinate::new(41.0 + seed as f64 * 0.01, 29.0),
                        priority: Priority::Normal,
                        service_time_minutes: 5,
                        time_window: None,
                        customer_ref: format!("customer-{seed}"),
                        proof_requirements: ProofRequirements::default(),
                    },
                    sequence_index: (seed - 1) as usize,
                    estimated_arrival: now() + Duration::minutes(seed as i64 * 15),
                    estimated_departure: now() + Duration::minutes(seed as i64 * 15 + 5),
                })
            })
            .collect();

        Journey {
            id: Uuid::from_u128(100),
            depot: Coordinate::new(41.0, 29.0),
            mode: OptimizationMode::Distance,
            tolerances: Tolerances::default(),
            stops,
            planned_start_time: now(),
            actual_start_time: None,
            completed_at: None,
            status: JourneyStatus::Planned,
            plan_version: 0,
            proposal: None,
            total_distance_meters: 0.0,
            total_duration_seconds: 0.0,
            created_at: now(),
            applied_commands: HashMap::new(),
        }
    }

    fn id(seed: u128) -> Uuid {
        Uuid::from_u128(seed)
    }

    fn started(count: u128) -> Journey {
        let mut journey = journey_with(count);
        start(&mut journey, now()).unwrap();
        journey
    }

    #[test]
    fn check_in_before_previous_stop_resolves_is_out_of_order() {
        let mut journey = started(2);

        let err = check_in(&mut journey, id(2), now()).unwrap_err();
        assert!(matches!(err, AppError::OutOfOrder(_)));
        assert_eq!(journey.stop(id(2)).unwrap().status, StopStatus::Pending);

        check_in(&mut journey, id(1), now()).unwrap();
        complete(&mut journey, id(1), Proof::default(), now()).unwrap();
        let transition = check_in(&mut journey, id(2), now()).unwrap();

        assert_eq!(transition.from, StopStatus::Pending);
        assert_eq!(transition.to, StopStatus::InProgress);
    }

    #[test]
    fn excluded_stops_do_not_block_check_in() {
        let mut journey = started(2);
        exclude(&mut journey.stops[0], "unreachable").unwrap();

        assert!(check_in(&mut journey, id(2), now()).is_ok());
    }

    #[test]
    fn check_in_requires_started_journey() {
        let mut journey = journey_with(1);
        let err = check_in(&mut journey, id(1), now()).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[test]
    fn missing_required_proof_blocks_completion() {
        let mut journey = started(1);
        journey.stops[0].planned.stop.proof_requirements = ProofRequirements {
            signature: true,
            photo: true,
        };
        check_in(&mut journey, id(1), now()).unwrap();

        let only_signature = Proof {
            signature_ref: Some("sig-1".to_string()),
            photo_ref: None,
        };
        let err = complete(&mut journey, id(1), only_signature, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(journey.stops[0].status, StopStatus::InProgress);

        let full = Proof {
            signature_ref: Some("sig-1".to_string()),
            photo_ref: Some("photo-1".to_string()),
        };
        complete(&mut journey, id(1), full, now()).unwrap();
        assert_eq!(journey.stops[0].status, StopStatus::Completed);
    }

    #[test]
    fn fail_requires_a_reason() {
        let mut journey = started(1);
        check_in(&mut journey, id(1), now()).unwrap();

        let err = fail(&mut journey, id(1), "   ", now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        fail(&mut journey, id(1), "customer absent", now()).unwrap();
        assert_eq!(journey.stops[0].failure_reason.as_deref(), Some("customer absent"));
    }

    #[test]
    fn failed_stop_can_be_retried_while_journey_runs() {
        let mut journey = started(2);
        check_in(&mut journey, id(1), now()).unwrap();
        fail(&mut journey, id(1), "gate locked", now()).unwrap();

        reset(&mut journey, id(1)).unwrap();

        let stop = journey.stop(id(1)).unwrap();
        assert_eq!(stop.status, StopStatus::Pending);
        assert!(stop.failure_reason.is_none());
        assert!(check_in(&mut journey, id(1), now()).is_ok());
    }

    #[test]
    fn completed_stop_never_resets() {
        let mut journey = started(2);
        check_in(&mut journey, id(1), now()).unwrap();
        complete(&mut journey, id(1), Proof::default(), now()).unwrap();

        let err = reset(&mut journey, id(1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(journey.stops[0].status, StopStatus::Completed);
    }

    #[test]
    fn completion_is_unreachable_from_failed_or_excluded() {
        let mut journey = started(3);
        check_in(&mut journey, id(1), now()).unwrap();
        fail(&mut journey, id(1), "no access", now()).unwrap();
        exclude(&mut journey.stops[1], "late").unwrap();

        for seed in [1, 2] {
            let err = complete(&mut journey, id(seed), Proof::default(), now()).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[test]
    fn journey_completes_when_every_active_stop_resolves() {
        let mut journey = started(3);
        exclude(&mut journey.stops[2], "late").unwrap();

        check_in(&mut journey, id(1), now()).unwrap();
        complete(&mut journey, id(1), Proof::default(), now()).unwrap();
        assert_eq!(journey.status, JourneyStatus::InProgress);

        check_in(&mut journey, id(2), now()).unwrap();
        fail(&mut journey, id(2), "refused", now()).unwrap();

        assert_eq!(journey.status, JourneyStatus::Completed);
        assert_eq!(journey.completed_at, Some(now()));
    }

    #[test]
    fn journey_starts_only_once() {
        let mut journey = started(1);
        assert!(start(&mut journey, now()).is_err());
        assert_eq!(journey.actual_start_time, Some(now()));
    }
}
