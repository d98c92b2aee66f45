use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::engine::optimizer::{OptimizationParams, RouteOptimizer};
use crate::engine::state_machine::{exclude, refresh_status, Transition};
use crate::error::AppError;
use crate::models::journey::{Journey, JourneyStop, ReoptimizationProposal, StopStatus};
use crate::models::optimization::ExcludedStop;
use crate::models::stop::{Coordinate, OptimizedStop, Stop};

pub const UNSATISFIABLE_REASON: &str = "time window unsatisfiable from new anchor";

/// Outcome of committing a proposal.
#[derive(Debug, Clone)]
pub struct CommittedPlan {
    pub plan_version: u32,
    pub newly_excluded: Vec<ExcludedStop>,
    pub transitions: Vec<Transition>,
    pub journey_completed: bool,
}

/// Re-plans the pending part of a journey from the vehicle's current position.
///
/// Planning and committing are separate steps: [`propose`](Self::propose)
/// never touches the journey, [`commit`](Self::commit) applies a stored
/// proposal once the caller confirms it.
#[derive(Clone)]
pub struct ReoptimizationCoordinator {
    optimizer: RouteOptimizer,
}

impl ReoptimizationCoordinator {
    pub fn new(optimizer: RouteOptimizer) -> Self {
        Self { optimizer }
    }

    pub async fn propose(
        &self,
        journey: &Journey,
        current_location: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<ReoptimizationProposal, AppError> {
        let pending: Vec<Stop> = journey
            .stops
            .iter()
            .filter(|stop| stop.status == StopStatus::Pending)
            .map(|stop| stop.planned.stop.clone())
            .collect();

        let params = OptimizationParams {
            mode: journey.mode,
            tolerances: journey.tolerances,
            departure: now,
        };

        let mut candidates = pending.clone();
        let mut dropped: Vec<Stop> = Vec::new();
        // each round drops one stop, so this terminates
        let mut result = loop {
            let result = self
                .optimizer
                .optimize(current_location, &candidates, &params)
                .await?;
            // violations follow visiting order; later stops may only be late
            // because of this one, so they get another chance without it
            let Some(late_id) = result.violations.first().map(|violation| violation.stop_id) else {
                break result;
            };
            let Some(position) = candidates.iter().position(|stop| stop.id == late_id) else {
                return Err(AppError::Internal(format!(
                    "violation reported for unplanned stop {late_id}"
                )));
            };
            dropped.push(candidates.remove(position));
        };

        let newly_excluded = report_exclusions(&pending, &result.ordered_stops, &dropped);
        result.excluded_stops = dropped
            .into_iter()
            .map(|stop| ExcludedStop {
                stop,
                reason: UNSATISFIABLE_REASON.to_string(),
            })
            .collect();

        info!(
            journey_id = %journey.id,
            pending = pending.len(),
            planned = result.ordered_stops.len(),
            excluded = result.excluded_stops.len(),
            "re-optimization proposed"
        );

        Ok(ReoptimizationProposal {
            base_plan_version: journey.plan_version,
            current_location,
            result,
            newly_excluded,
            proposed_at: now,
        })
    }

    /// Computes a proposal and parks it on the journey awaiting confirmation.
    pub async fn reoptimize(
        &self,
        journey: &mut Journey,
        current_location: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<ReoptimizationProposal, AppError> {
        let proposal = self.propose(journey, current_location, now).await?;
        journey.proposal = Some(proposal.clone());
        Ok(proposal)
    }

    /// Replaces the journey's pending sequence with the stored proposal.
    ///
    /// Resolved and in-progress stops keep their relative order at the front,
    /// the re-planned stops follow, then the newly excluded ones.
    pub fn commit(journey: &mut Journey, now: DateTime<Utc>) -> Result<CommittedPlan, AppError> {
        let proposal = journey
            .proposal
            .take()
            .ok_or_else(|| AppError::Conflict(format!("journey {} has no proposal to confirm", journey.id)))?;

        if proposal.base_plan_version != journey.plan_version {
            return Err(AppError::Conflict(format!(
                "proposal was computed for plan {} but journey {} is at plan {}",
                proposal.base_plan_version, journey.id, journey.plan_version
            )));
        }

        let replanned: HashSet<_> = proposal
            .result
            .ordered_stops
            .iter()
            .map(|planned| planned.stop.id)
            .chain(proposal.result.excluded_stops.iter().map(|e| e.stop.id))
            .collect();
        let still_pending: HashSet<_> = journey
            .stops
            .iter()
            .filter(|stop| stop.status == StopStatus::Pending)
            .map(JourneyStop::id)
            .collect();
        if replanned != still_pending {
            return Err(AppError::Conflict(format!(
                "stops of journey {} changed since the proposal was computed",
                journey.id
            )));
        }

        let mut previous = journey.stops.clone();
        let mut stops: Vec<JourneyStop> = previous
            .iter()
            .filter(|stop| stop.status != StopStatus::Pending)
            .cloned()
            .collect();

        stops.extend(proposal.result.ordered_stops.iter().cloned().map(JourneyStop::pending));

        let mut transitions = Vec::with_capacity(proposal.result.excluded_stops.len());
        for excluded in &proposal.result.excluded_stops {
            if let Some(stop) = previous.iter_mut().find(|stop| stop.id() == excluded.stop.id) {
                transitions.push(exclude(stop, &excluded.reason)?);
                stops.push(stop.clone());
            }
        }

        for (sequence_index, stop) in stops.iter_mut().enumerate() {
            stop.planned.sequence_index = sequence_index;
        }

        journey.stops = stops;
        journey.plan_version += 1;
        journey.total_distance_meters = proposal.result.total_distance_meters;
        journey.total_duration_seconds = proposal.result.total_duration_seconds;
        let journey_completed = refresh_status(journey, now);

        info!(
            journey_id = %journey.id,
            plan_version = journey.plan_version,
            excluded = transitions.len(),
            "re-optimized plan committed"
        );

        Ok(CommittedPlan {
            plan_version: journey.plan_version,
            newly_excluded: proposal.newly_excluded,
            transitions,
            journey_completed,
        })
    }
}

/// Stops that were pending before but whose customer no longer appears in the plan.
fn diff_by_customer(
    pending: &[Stop],
    ordered: &[OptimizedStop],
) -> Vec<ExcludedStop> {
    let kept: HashSet<&str> = ordered
        .iter()
        .map(|planned| planned.stop.customer_ref.as_str())
        .collect();

    pending
        .iter()
        .filter(|stop| !kept.contains(stop.customer_ref.as_str()))
        .map(|stop| ExcludedStop {
            stop: stop.clone(),
            reason: UNSATISFIABLE_REASON.to_string(),
        })
        .collect()
}

/// The customer diff, plus any dropped stop whose customer still has another
/// stop in the plan. Every stop `commit` excludes is reported.
fn report_exclusions(
    pending: &[Stop],
    ordered: &[OptimizedStop],
    dropped: &[Stop],
) -> Vec<ExcludedStop> {
    let mut excluded = diff_by_customer(pending, ordered);
    let reported: HashSet<_> = excluded.iter().map(|entry| entry.stop.id).collect();

    excluded.extend(
        dropped
            .iter()
            .filter(|stop| !reported.contains(&stop.id))
            .map(|stop| ExcludedStop {
                stop: stop.clone(),
                reason: UNSATISFIABLE_REASON.to_string(),
            }),
    );
    excluded
}
