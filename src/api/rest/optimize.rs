use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::journeys::optimize;
use crate::engine::optimizer::OptimizationParams;
use crate::error::AppError;
use crate::models::optimization::{OptimizationMode, OptimizationResult, Tolerances};
use crate::models::stop::{Coordinate, Stop};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/optimize", post(optimize_route))
}

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub depot: Coordinate,
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub mode: OptimizationMode,
    pub departure: Option<DateTime<Utc>>,
    pub tolerances: Option<Tolerances>,
}

/// Plans a tour without creating a journey.
async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptimizeRequest>,
) -> Result<Json<OptimizationResult>, AppError> {
    let params = OptimizationParams {
        mode: payload.mode,
        tolerances: payload.tolerances.unwrap_or(state.tolerances),
        departure: payload.departure.unwrap_or_else(Utc::now),
    };

    let result = optimize(&state, payload.depot, &payload.stops, &params).await?;
    Ok(Json(result))
}
