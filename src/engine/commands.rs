//! Replay of commands queued while a device was offline.
//!
//! Each journey keeps a ledger of handled queue positions. Resending a command
//! the ledger already holds is acknowledged as `AlreadyApplied` without
//! touching the journey, so a queue can be resent whole. A command arriving for
//! the first time whose effect is already visible (the stop was completed
//! online, say) is acknowledged the same way.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::journeys::{apply_stop_operation, confirm_locked, reoptimize_locked, StopOperation};
use crate::error::AppError;
use crate::models::command::{CommandKey, JourneyCommand, QueuedCommand};
use crate::models::journey::{Journey, StopStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Applied,
    AlreadyApplied,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub key: CommandKey,
    pub status: CommandStatus,
    pub journey: Journey,
}

pub async fn apply_command(state: &AppState, queued: QueuedCommand) -> Result<CommandOutcome, AppError> {
    let key = queued.key();
    let handle = state.journey(key.journey_id)?;
    let mut journey = handle.lock().await;

    let recorded = journey.applied_commands.get(&key.sequence).copied();
    let status = match recorded {
        Some(recorded) if recorded == key => CommandStatus::AlreadyApplied,
        Some(recorded) => {
            return Err(AppError::Conflict(format!(
                "queue position {} of journey {} already holds {:?}",
                key.sequence, key.journey_id, recorded.operation
            )));
        }
        None => {
            let status = execute(state, &mut journey, queued.command, Utc::now()).await?;
            journey.applied_commands.insert(key.sequence, key);
            status
        }
    };

    match status {
        CommandStatus::Applied => info!(?key, "offline command applied"),
        CommandStatus::AlreadyApplied => debug!(?key, "offline command already applied"),
    }

    Ok(CommandOutcome {
        key,
        status,
        journey: journey.clone(),
    })
}

async fn execute(
    state: &AppState,
    journey: &mut Journey,
    command: JourneyCommand,
    now: DateTime<Utc>,
) -> Result<CommandStatus, AppError> {
    let status = match command {
        JourneyCommand::CheckIn { stop_id, .. } => {
            let reached = matches!(
                stop_status(journey, stop_id)?,
                StopStatus::InProgress | StopStatus::Completed | StopStatus::Failed
            );
            apply_unless(reached, || {
                apply_stop_operation(state, journey, stop_id, StopOperation::CheckIn, now)
            })?
        }
        JourneyCommand::Complete { stop_id, proof, .. } => {
            let reached = stop_status(journey, stop_id)? == StopStatus::Completed;
            apply_unless(reached, || {
                apply_stop_operation(state, journey, stop_id, StopOperation::Complete(proof), now)
            })?
        }
        JourneyCommand::Fail { stop_id, reason, .. } => {
            let reached = stop_status(journey, stop_id)? == StopStatus::Failed;
            apply_unless(reached, || {
                apply_stop_operation(state, journey, stop_id, StopOperation::Fail(reason), now)
            })?
        }
        JourneyCommand::Reset { stop_id, .. } => {
            let reached = stop_status(journey, stop_id)? == StopStatus::Pending;
            apply_unless(reached, || {
                apply_stop_operation(state, journey, stop_id, StopOperation::Reset, now)
            })?
        }
        JourneyCommand::Reoptimize {
            current_location,
            base_plan_version,
            ..
        } => {
            if plan_moved_on(journey, base_plan_version)? {
                CommandStatus::AlreadyApplied
            } else {
                reoptimize_locked(state, journey, current_location, now).await?;
                CommandStatus::Applied
            }
        }
        JourneyCommand::ConfirmReoptimization {
            base_plan_version, ..
        } => {
            // a committed plan bumps the version, so an older base means it went through
            if plan_moved_on(journey, base_plan_version)? {
                CommandStatus::AlreadyApplied
            } else {
                confirm_locked(state, journey, now)?;
                CommandStatus::Applied
            }
        }
    };

    Ok(status)
}

fn stop_status(journey: &Journey, stop_id: Uuid) -> Result<StopStatus, AppError> {
    journey
        .stop(stop_id)
        .map(|stop| stop.status)
        .ok_or_else(|| AppError::NotFound(format!("stop {stop_id} not found in journey {}", journey.id)))
}

/// True when the journey is past `base_plan_version`. A base the journey has
/// not reached yet cannot come from this journey's history.
fn plan_moved_on(journey: &Journey, base_plan_version: u32) -> Result<bool, AppError> {
    match base_plan_version.cmp(&journey.plan_version) {
        Ordering::Less => Ok(true),
        Ordering::Equal => Ok(false),
        Ordering::Greater => Err(AppError::Conflict(format!(
            "command is based on plan {base_plan_version} but journey {} is only at plan {}",
            journey.id, journey.plan_version
        ))),
    }
}

fn apply_unless<T>(
    already_reached: bool,
    apply: impl FnOnce() -> Result<T, AppError>,
) -> Result<CommandStatus, AppError> {
    if already_reached {
        return Ok(CommandStatus::AlreadyApplied);
    }
    apply()?;
    Ok(CommandStatus::Applied)
}
