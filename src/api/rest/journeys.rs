use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::commands::{apply_command, CommandOutcome};
use crate::engine::deviation::Deviation;
use crate::engine::journeys::{
    confirm_reoptimization, create_journey, reoptimize, start_journey, transition_stop, ConfirmedPlan,
    NewJourney, StopOperation,
};
use crate::error::AppError;
use crate::models::command::QueuedCommand;
use crate::models::journey::{Journey, Proof, ReoptimizationProposal};
use crate::models::stop::Coordinate;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/journeys", post(create).get(list))
        .route("/journeys/:id", get(get_one))
        .route("/journeys/:id/start", post(start))
        .route("/journeys/:id/stops/:stop_id/check-in", post(check_in))
        .route("/journeys/:id/stops/:stop_id/complete", post(complete))
        .route("/journeys/:id/stops/:stop_id/fail", post(fail))
        .route("/journeys/:id/stops/:stop_id/reset", post(reset))
        .route("/journeys/:id/deviation", get(deviation))
        .route("/journeys/:id/reoptimize", post(propose_reoptimization))
        .route("/journeys/:id/reoptimize/confirm", post(confirm))
        .route("/journeys/:id/commands", post(replay_command))
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub proof: Proof,
}

#[derive(Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct ReoptimizeRequest {
    pub current_location: Coordinate,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewJourney>,
) -> Result<Json<Journey>, AppError> {
    Ok(Json(create_journey(&state, payload).await?))
}

async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<Journey>> {
    let handles: Vec<_> = state
        .journeys
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    let mut journeys = Vec::with_capacity(handles.len());
    for handle in handles {
        journeys.push(handle.lock().await.clone());
    }
    journeys.sort_by_key(|journey| journey.created_at);

    Json(journeys)
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Journey>, AppError> {
    let handle = state.journey(id)?;
    let journey = handle.lock().await.clone();
    Ok(Json(journey))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Journey>, AppError> {
    Ok(Json(start_journey(&state, id).await?))
}

async fn check_in(
    State(state): State<Arc<AppState>>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Journey>, AppError> {
    Ok(Json(transition_stop(&state, id, stop_id, StopOperation::CheckIn).await?))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CompleteRequest>,
) -> Result<Json<Journey>, AppError> {
    let operation = StopOperation::Complete(payload.proof);
    Ok(Json(transition_stop(&state, id, stop_id, operation).await?))
}

async fn fail(
    State(state): State<Arc<AppState>>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<FailRequest>,
) -> Result<Json<Journey>, AppError> {
    let operation = StopOperation::Fail(payload.reason);
    Ok(Json(transition_stop(&state, id, stop_id, operation).await?))
}

async fn reset(
    State(state): State<Arc<AppState>>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Journey>, AppError> {
    Ok(Json(transition_stop(&state, id, stop_id, StopOperation::Reset).await?))
}

async fn deviation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deviation>, AppError> {
    let handle = state.journey(id)?;
    let journey = handle.lock().await;
    Ok(Json(state.monitor.assess(&journey, Utc::now())))
}

async fn propose_reoptimization(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReoptimizeRequest>,
) -> Result<Json<ReoptimizationProposal>, AppError> {
    payload.current_location.validate()?;
    Ok(Json(reoptimize(&state, id, payload.current_location).await?))
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfirmedPlan>, AppError> {
    Ok(Json(confirm_reoptimization(&state, id).await?))
}

async fn replay_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(queued): Json<QueuedCommand>,
) -> Result<Json<CommandOutcome>, AppError> {
    let target = queued.command.journey_id();
    if target != id {
        return Err(AppError::Validation(format!(
            "command targets journey {target} but was posted to {id}"
        )));
    }

    Ok(Json(apply_command(&state, queued).await?))
}
