use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::deviation::DeviationMonitor;
use crate::engine::optimizer::RouteOptimizer;
use crate::engine::reoptimize::ReoptimizationCoordinator;
use crate::error::AppError;
use crate::models::event::JourneyEvent;
use crate::models::journey::Journey;
use crate::models::optimization::Tolerances;
use crate::observability::metrics::Metrics;
use crate::provider::DistanceProvider;

/// Journeys are individually locked: transitions and re-optimization of one
/// journey are serialized, different journeys proceed independently.
pub type JourneyHandle = Arc<Mutex<Journey>>;

pub struct AppState {
    pub journeys: DashMap<Uuid, JourneyHandle>,
    pub optimizer: RouteOptimizer,
    pub coordinator: ReoptimizationCoordinator,
    pub monitor: DeviationMonitor,
    pub tolerances: Tolerances,
    pub events_tx: broadcast::Sender<JourneyEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, provider: Arc<dyn DistanceProvider>) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let optimizer = RouteOptimizer::new(provider);

        Self {
            journeys: DashMap::new(),
            coordinator: ReoptimizationCoordinator::new(optimizer.clone()),
            optimizer,
            monitor: DeviationMonitor::new(config.reoptimize_threshold_minutes),
            tolerances: config.tolerances,
            events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn journey(&self, id: Uuid) -> Result<JourneyHandle, AppError> {
        self.journeys
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("journey {id} not found")))
    }

    /// Fire-and-forget: having no subscribers is fine.
    pub fn publish(&self, event: JourneyEvent) {
        let _ = self.events_tx.send(event);
    }
}
