use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::Validation(format!(
                "coordinate ({}, {}) is out of range",
                self.lat, self.lng
            )));
        }
        Ok(())
    }
}

/// Allowed arrival interval, as times of day. Overnight windows are not supported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.start > self.end {
            return Err(AppError::Validation(format!(
                "time window {}..{} ends before it starts",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Scheduling priority. The derived order is the visiting order: `High` first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofRequirements {
    #[serde(default)]
    pub signature: bool,
    #[serde(default)]
    pub photo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stop {
    pub id: Uuid,
    pub coordinate: Coordinate,
    pub priority: Priority,
    #[serde(default)]
    pub service_time_minutes: u32,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    pub customer_ref: String,
    #[serde(default)]
    pub proof_requirements: ProofRequirements,
}

impl Stop {
    pub fn validate(&self) -> Result<(), AppError> {
        self.coordinate.validate()?;
        if let Some(window) = &self.time_window {
            window.validate()?;
        }
        if self.customer_ref.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "stop {} has an empty customer reference",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizedStop {
    #[serde(flatten)]
    pub stop: Stop,
    pub sequence_index: usize,
    pub estimated_arrival: DateTime<Utc>,
    pub estimated_departure: DateTime<Utc>,
}
