//! Travel matrix providers.
//!
//! The optimizer only depends on [`DistanceProvider`]; concrete providers are
//! picked at startup from configuration.

mod haversine;
mod osrm;
mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use haversine::HaversineProvider;
pub use osrm::{OsrmConfig, OsrmProvider};
pub use retry::RetryingProvider;

use crate::config::{Config, ProviderKind};
use crate::error::AppError;
use crate::models::optimization::TravelCost;
use crate::models::stop::Coordinate;

/// Row-major matrix: `matrix[i][j]` is the cost from origin `i` to destination `j`.
pub type TravelMatrix = Vec<Vec<TravelCost>>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Worth retrying: timeouts, refused connections, 5xx.
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider rejected the request: {0}")]
    Definitive(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::ProviderUnavailable(err.to_string())
    }
}

#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// Pairwise travel costs between every origin and every destination.
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<TravelMatrix, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Builds the configured provider, wrapped in bounded retries.
pub fn from_config(config: &Config) -> Result<Arc<dyn DistanceProvider>, AppError> {
    let backoff = Duration::from_millis(config.provider_backoff_base_ms);

    let provider: Arc<dyn DistanceProvider> = match config.distance_provider {
        ProviderKind::Haversine => Arc::new(HaversineProvider::new(
            config.haversine_speed_kmh,
            config.haversine_road_coefficient,
        )),
        ProviderKind::Osrm => {
            let osrm = OsrmProvider::new(OsrmConfig {
                base_url: config.osrm_base_url.clone(),
                profile: config.osrm_profile.clone(),
                timeout_secs: config.provider_timeout_secs,
            })?;
            Arc::new(RetryingProvider::new(osrm, config.provider_max_attempts, backoff))
        }
    };

    Ok(provider)
}
