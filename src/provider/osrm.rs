//! OSRM table service adapter.
//!
//! API reference: http://project-osrm.org/docs/v5.24.0/api/#table-service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{DistanceProvider, ProviderError, TravelMatrix};
use crate::error::AppError;
use crate::models::optimization::TravelCost;
use crate::models::stop::Coordinate;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmProvider {
    config: OsrmConfig,
    client: Client,
}

impl OsrmProvider {
    pub fn new(config: OsrmConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self { config, client })
    }

    fn table_url(&self, origins: &[Coordinate], destinations: &[Coordinate]) -> String {
        let coords = origins
            .iter()
            .chain(destinations)
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        let sources = index_list(0..origins.len());
        let targets = index_list(origins.len()..origins.len() + destinations.len());

        format!(
            "{}/table/v1/{}/{}?sources={}&destinations={}&annotations=distance,duration",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords,
            sources,
            targets
        )
    }
}

fn index_list(range: std::ops::Range<usize>) -> String {
    range.map(|i| i.to_string()).collect::<Vec<_>>().join(";")
}

fn classify(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProviderError::Transient(err.to_string())
    } else {
        ProviderError::Definitive(err.to_string())
    }
}

#[async_trait]
impl DistanceProvider for OsrmProvider {
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<TravelMatrix, ProviderError> {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(vec![Vec::new(); origins.len()]);
        }

        let url = self.table_url(origins, destinations);
        debug!(
            origins = origins.len(),
            destinations = destinations.len(),
            "requesting osrm table"
        );

        let response = self.client.get(&url).send().await.map_err(classify)?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Transient(format!("osrm returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Definitive(format!("osrm returned {status}: {body}")));
        }

        let body: OsrmTableResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Definitive(format!("malformed osrm response: {err}")))?;

        body.into_matrix(origins.len(), destinations.len())
    }

    fn name(&self) -> &str {
        "osrm"
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_matrix(self, rows: usize, cols: usize) -> Result<TravelMatrix, ProviderError> {
        if self.code != "Ok" {
            return Err(ProviderError::Definitive(format!(
                "osrm status {}: {}",
                self.code,
                self.message.unwrap_or_default()
            )));
        }

        let durations = self
            .durations
            .ok_or_else(|| ProviderError::Definitive("osrm response has no durations".to_string()))?;
        let distances = self
            .distances
            .ok_or_else(|| ProviderError::Definitive("osrm response has no distances".to_string()))?;

        if durations.len() != rows || distances.len() != rows {
            return Err(ProviderError::Definitive("osrm matrix has wrong row count".to_string()));
        }

        durations
            .into_iter()
            .zip(distances)
            .enumerate()
            .map(|(i, (duration_row, distance_row))| {
                if duration_row.len() != cols || distance_row.len() != cols {
                    return Err(ProviderError::Definitive(
                        "osrm matrix has wrong column count".to_string(),
                    ));
                }
                duration_row
                    .into_iter()
                    .zip(distance_row)
                    .enumerate()
                    .map(|(j, cell)| match cell {
                        (Some(duration_seconds), Some(distance_meters)) => Ok(TravelCost {
                            distance_meters,
                            duration_seconds,
                        }),
                        _ => Err(ProviderError::Definitive(format!(
                            "no route between origin {i} and destination {j}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }
}
