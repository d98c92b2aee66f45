use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::grouping::group_by_priority;
use crate::engine::time_window::check_violations;
use crate::engine::tour::{build_tour, ANCHOR};
use crate::error::AppError;
use crate::models::optimization::{OptimizationMode, OptimizationResult, Tolerances};
use crate::models::stop::{Coordinate, OptimizedStop, Stop};
use crate::provider::{DistanceProvider, TravelMatrix};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OptimizationParams {
    pub mode: OptimizationMode,
    pub tolerances: Tolerances,
    /// When the vehicle leaves the anchor.
    pub departure: DateTime<Utc>,
}

/// Priority-tiered nearest-neighbour planner.
///
/// Stateless apart from the provider handle; safe to share across journeys.
#[derive(Clone)]
pub struct RouteOptimizer {
    provider: Arc<dyn DistanceProvider>,
}

impl RouteOptimizer {
    pub fn new(provider: Arc<dyn DistanceProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn optimize(
        &self,
        anchor: Coordinate,
        stops: &[Stop],
        params: &OptimizationParams,
    ) -> Result<OptimizationResult, AppError> {
        anchor.validate()?;
        params.tolerances.validate()?;
        validate_stops(stops)?;

        if stops.is_empty() {
            return Ok(OptimizationResult::empty(params.departure));
        }

        let locations: Vec<Coordinate> = std::iter::once(anchor)
            .chain(stops.iter().map(|stop| stop.coordinate))
            .collect();

        let matrix = self
            .provider
            .matrix(&locations, &locations)
            .await
            .inspect_err(|err| {
                warn!(provider = self.provider.name(), error = %err, "travel matrix request failed")
            })?;
        check_shape(&matrix, locations.len())?;

        let groups = group_by_priority(stops);
        let order = build_tour(&matrix, stops, &groups, params.mode);
        let (ordered_stops, total_distance_meters, total_duration_seconds) =
            schedule(&matrix, stops, &order, params.departure)?;
        let violations = check_violations(
            &ordered_stops,
            &params.tolerances,
            params.departure.date_naive(),
        );

        info!(
            provider = self.provider.name(),
            stops = stops.len(),
            violations = violations.len(),
            distance_m = total_distance_meters,
            duration_s = total_duration_seconds,
            "route optimized"
        );

        Ok(OptimizationResult {
            ordered_stops,
            excluded_stops: Vec::new(),
            total_distance_meters,
            total_duration_seconds,
            violations,
            departure: params.departure,
        })
    }
}

fn validate_stops(stops: &[Stop]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(stops.len());
    for stop in stops {
        stop.validate()?;
        if !seen.insert(stop.id) {
            return Err(AppError::Validation(format!("duplicate stop id {}", stop.id)));
        }
    }
    Ok(())
}

fn check_shape(matrix: &TravelMatrix, size: usize) -> Result<(), AppError> {
    if matrix.len() != size || matrix.iter().any(|row| row.len() != size) {
        return Err(AppError::ProviderUnavailable(format!(
            "expected a {size}x{size} travel matrix"
        )));
    }
    Ok(())
}

/// Walks the tour accumulating ETAs. Arrival never waits for a window to open.
fn schedule(
    matrix: &TravelMatrix,
    stops: &[Stop],
    order: &[usize],
    departure: DateTime<Utc>,
) -> Result<(Vec<OptimizedStop>, f64, f64), AppError> {
    let mut ordered = Vec::with_capacity(order.len());
    let mut previous = ANCHOR;
    let mut leaving_at = departure;
    let mut total_distance = 0.0;
    let mut total_duration = 0.0;

    for (sequence_index, &index) in order.iter().enumerate() {
        let stop = &stops[index];
        let leg = &matrix[previous][index + 1];
        total_distance += leg.distance_meters;
        total_duration += leg.duration_seconds;

        let estimated_arrival = seconds(leg.duration_seconds)
            .and_then(|travel| leaving_at.checked_add_signed(travel))
            .ok_or_else(|| {
                AppError::ProviderUnavailable(format!(
                    "travel time of {}s to stop {} is out of range",
                    leg.duration_seconds, stop.id
                ))
            })?;
        let estimated_departure = Duration::try_minutes(i64::from(stop.service_time_minutes))
            .and_then(|service| estimated_arrival.checked_add_signed(service))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "service time of stop {} is out of range",
                    stop.id
                ))
            })?;

        ordered.push(OptimizedStop {
            stop: stop.clone(),
            sequence_index,
            estimated_arrival,
            estimated_departure,
        });

        previous = index + 1;
        leaving_at = estimated_departure;
    }

    Ok((ordered, total_distance, total_duration))
}

fn seconds(value: f64) -> Option<Duration> {
    if !value.is_finite() {
        return None;
    }
    Duration::try_milliseconds((value.max(0.0) * 1000.0).round() as i64)
}
