use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::stop::{OptimizedStop, Priority, Stop};

/// One week. Anything longer is a configuration mistake, not a grace period.
pub const MAX_TOLERANCE_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OptimizationMode {
    #[default]
    Distance,
    Duration,
}

/// Grace period in minutes past a window's end before lateness is a violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tolerances {
    pub high: i64,
    pub normal: i64,
    pub low: i64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            high: 30,
            normal: 60,
            low: 120,
        }
    }
}

impl Tolerances {
    pub fn for_priority(&self, priority: Priority) -> i64 {
        match priority {
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for priority in Priority::ALL {
            let minutes = self.for_priority(priority);
            if !(0..=MAX_TOLERANCE_MINUTES).contains(&minutes) {
                return Err(AppError::Validation(format!(
                    "{priority:?} tolerance must be between 0 and {MAX_TOLERANCE_MINUTES} minutes, got {minutes}"
                )));
            }
        }
        Ok(())
    }
}

/// One cell of a travel matrix.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TravelCost {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub stop_id: Uuid,
    pub message: String,
    pub delay_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExcludedStop {
    pub stop: Stop,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationResult {
    pub ordered_stops: Vec<OptimizedStop>,
    pub excluded_stops: Vec<ExcludedStop>,
    pub total_distance_meters: f64,
    pub total_duration_seconds: f64,
    pub violations: Vec<Violation>,
    pub departure: DateTime<Utc>,
}

impl OptimizationResult {
    pub fn empty(departure: DateTime<Utc>) -> Self {
        Self {
            ordered_stops: Vec::new(),
            excluded_stops: Vec::new(),
            total_distance_meters: 0.0,
            total_duration_seconds: 0.0,
            violations: Vec::new(),
            departure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Tolerances, MAX_TOLERANCE_MINUTES};

    #[test]
    fn tolerances_must_be_non_negative_and_bounded() {
        assert!(Tolerances::default().validate().is_ok());

        let negative = Tolerances {
            normal: -5,
            ..Tolerances::default()
        };
        assert_eq!(negative.validate().unwrap_err().kind(), "validation_error");

        let huge = Tolerances {
            high: i64::MAX,
            ..Tolerances::default()
        };
        assert!(huge.validate().is_err());

        let edge = Tolerances {
            low: MAX_TOLERANCE_MINUTES,
            ..Tolerances::default()
        };
        assert!(edge.validate().is_ok());
    }
}
