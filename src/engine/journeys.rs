//! Journey operations against shared state: locking, events, metrics.
//!
//! The pure logic lives in `optimizer`, `state_machine` and `reoptimize`;
//! this module only sequences it under the per-journey lock.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::optimizer::OptimizationParams;
use crate::engine::reoptimize::ReoptimizationCoordinator;
use crate::engine::state_machine::{self, Transition};
use crate::error::AppError;
use crate::models::event::{JourneyEvent, JourneyEventKind};
use crate::models::journey::{Journey, JourneyStatus, JourneyStop, Proof, ReoptimizationProposal};
use crate::models::optimization::{ExcludedStop, OptimizationMode, OptimizationResult, Tolerances};
use crate::models::stop::{Coordinate, Stop};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewJourney {
    pub depot: Coordinate,
    pub stops: Vec<Stop>,
    pub planned_start_time: DateTime<Utc>,
    #[serde(default)]
    pub mode: OptimizationMode,
    #[serde(default)]
    pub tolerances: Option<Tolerances>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOperation {
    CheckIn,
    Complete(Proof),
    Fail(String),
    Reset,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedPlan {
    pub journey: Journey,
    pub newly_excluded: Vec<ExcludedStop>,
}

/// Runs the optimizer and records its latency and outcome.
pub async fn optimize(
    state: &AppState,
    anchor: Coordinate,
    stops: &[Stop],
    params: &OptimizationParams,
) -> Result<OptimizationResult, AppError> {
    let started = Instant::now();
    let result = state.optimizer.optimize(anchor, stops, params).await;
    state
        .metrics
        .observe_optimization(result.is_ok(), started.elapsed().as_secs_f64());
    result
}

pub async fn create_journey(state: &AppState, request: NewJourney) -> Result<Journey, AppError> {
    let params = OptimizationParams {
        mode: request.mode,
        tolerances: request.tolerances.unwrap_or(state.tolerances),
        departure: request.planned_start_time,
    };
    let result = optimize(state, request.depot, &request.stops, &params).await?;

    let journey = Journey {
        id: Uuid::new_v4(),
        depot: request.depot,
        mode: params.mode,
        tolerances: params.tolerances,
        stops: result
            .ordered_stops
            .into_iter()
            .map(JourneyStop::pending)
            .collect(),
        planned_start_time: request.planned_start_time,
        actual_start_time: None,
        completed_at: None,
        status: JourneyStatus::Planned,
        plan_version: 0,
        proposal: None,
        total_distance_meters: result.total_distance_meters,
        total_duration_seconds: result.total_duration_seconds,
        created_at: Utc::now(),
        applied_commands: HashMap::new(),
    };

    state
        .journeys
        .insert(journey.id, std::sync::Arc::new(tokio::sync::Mutex::new(journey.clone())));
    state.metrics.journeys_active.inc();

    info!(
        journey_id = %journey.id,
        stops = journey.stops.len(),
        violations = result.violations.len(),
        "journey created"
    );

    Ok(journey)
}

pub async fn start_journey(state: &AppState, journey_id: Uuid) -> Result<Journey, AppError> {
    let handle = state.journey(journey_id)?;
    let mut journey = handle.lock().await;
    let now = Utc::now();

    state_machine::start(&mut journey, now)?;
    info!(journey_id = %journey_id, "journey started");
    publish_status(state, &journey, now);
    if journey.status == JourneyStatus::Completed {
        state.metrics.journeys_active.dec();
    }

    Ok(journey.clone())
}

pub async fn transition_stop(
    state: &AppState,
    journey_id: Uuid,
    stop_id: Uuid,
    operation: StopOperation,
) -> Result<Journey, AppError> {
    let handle = state.journey(journey_id)?;
    let mut journey = handle.lock().await;

    apply_stop_operation(state, &mut journey, stop_id, operation, Utc::now())?;
    Ok(journey.clone())
}

pub async fn reoptimize(
    state: &AppState,
    journey_id: Uuid,
    current_location: Coordinate,
) -> Result<ReoptimizationProposal, AppError> {
    let handle = state.journey(journey_id)?;
    let mut journey = handle.lock().await;

    reoptimize_locked(state, &mut journey, current_location, Utc::now()).await
}

pub async fn confirm_reoptimization(state: &AppState, journey_id: Uuid) -> Result<ConfirmedPlan, AppError> {
    let handle = state.journey(journey_id)?;
    let mut journey = handle.lock().await;

    let newly_excluded = confirm_locked(state, &mut journey, Utc::now())?;
    Ok(ConfirmedPlan {
        journey: journey.clone(),
        newly_excluded,
    })
}

pub(crate) fn apply_stop_operation(
    state: &AppState,
    journey: &mut Journey,
    stop_id: Uuid,
    operation: StopOperation,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    let was_completed = journey.status == JourneyStatus::Completed;

    let outcome = match operation {
        StopOperation::CheckIn => state_machine::check_in(journey, stop_id, now),
        StopOperation::Complete(proof) => state_machine::complete(journey, stop_id, proof, now),
        StopOperation::Fail(reason) => state_machine::fail(journey, stop_id, &reason, now),
        StopOperation::Reset => state_machine::reset(journey, stop_id),
    };

    let transition = outcome.inspect_err(|err| {
        warn!(
            journey_id = %journey.id,
            stop_id = %stop_id,
            kind = err.kind(),
            error = %err,
            "stop transition rejected"
        )
    })?;

    record_transition(state, journey.id, &transition, now);
    if !was_completed && journey.status == JourneyStatus::Completed {
        publish_status(state, journey, now);
        state.metrics.journeys_active.dec();
    }

    Ok(transition)
}

pub(crate) async fn reoptimize_locked(
    state: &AppState,
    journey: &mut Journey,
    current_location: Coordinate,
    now: DateTime<Utc>,
) -> Result<ReoptimizationProposal, AppError> {
    if journey.status == JourneyStatus::Completed {
        return Err(AppError::InvalidTransition(format!(
            "journey {} is already completed",
            journey.id
        )));
    }

    let started = Instant::now();
    let proposal = state
        .coordinator
        .reoptimize(journey, current_location, now)
        .await;
    state
        .metrics
        .observe_optimization(proposal.is_ok(), started.elapsed().as_secs_f64());
    let proposal = proposal?;

    state.publish(JourneyEvent {
        journey_id: journey.id,
        kind: JourneyEventKind::ReoptimizationProposed {
            excluded_stop_ids: proposal.newly_excluded.iter().map(|e| e.stop.id).collect(),
        },
        at: now,
    });

    Ok(proposal)
}

pub(crate) fn confirm_locked(
    state: &AppState,
    journey: &mut Journey,
    now: DateTime<Utc>,
) -> Result<Vec<ExcludedStop>, AppError> {
    let committed = ReoptimizationCoordinator::commit(journey, now)?;

    for transition in &committed.transitions {
        record_transition(state, journey.id, transition, now);
    }
    state
        .metrics
        .stops_excluded_total
        .inc_by(committed.transitions.len() as u64);
    state.publish(JourneyEvent {
        journey_id: journey.id,
        kind: JourneyEventKind::PlanCommitted {
            plan_version: committed.plan_version,
        },
        at: now,
    });
    if committed.journey_completed {
        publish_status(state, journey, now);
        state.metrics.journeys_active.dec();
    }

    Ok(committed.newly_excluded)
}

fn record_transition(state: &AppState, journey_id: Uuid, transition: &Transition, now: DateTime<Utc>) {
    state
        .metrics
        .stop_transitions_total
        .with_label_values(&[&transition.label()])
        .inc();

    info!(
        journey_id = %journey_id,
        stop_id = %transition.stop_id,
        from = ?transition.from,
        to = ?transition.to,
        "stop transition applied"
    );

    state.publish(JourneyEvent {
        journey_id,
        kind: JourneyEventKind::StopStatusChanged {
            stop_id: transition.stop_id,
            status: transition.to,
        },
        at: now,
    });
}

fn publish_status(state: &AppState, journey: &Journey, now: DateTime<Utc>) {
    state.publish(JourneyEvent {
        journey_id: journey.id,
        kind: JourneyEventKind::JourneyStatusChanged {
            status: journey.status,
        },
        at: now,
    });
}
