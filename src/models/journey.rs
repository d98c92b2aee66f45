use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::command::CommandKey;
use crate::models::optimization::{ExcludedStop, OptimizationMode, OptimizationResult, Tolerances};
use crate::models::stop::{Coordinate, OptimizedStop};

/// Stop lifecycle. Legacy spellings are accepted on input and normalised here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StopStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "in_progress", alias = "inprogress")]
    InProgress,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "failed")]
    Failed,
    #[serde(alias = "excluded")]
    Excluded,
}

impl StopStatus {
    pub fn is_resolved(self) -> bool {
        matches!(self, StopStatus::Completed | StopStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JourneyStatus {
    Planned,
    InProgress,
    Completed,
}

/// References to captured proof. Only presence is checked, never content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Proof {
    #[serde(default)]
    pub signature_ref: Option<String>,
    #[serde(default)]
    pub photo_ref: Option<String>,
}

impl Proof {
    pub fn has_signature(&self) -> bool {
        present(&self.signature_ref)
    }

    pub fn has_photo(&self) -> bool {
        present(&self.photo_ref)
    }
}

fn present(reference: &Option<String>) -> bool {
    reference.as_deref().is_some_and(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JourneyStop {
    #[serde(flatten)]
    pub planned: OptimizedStop,
    pub status: StopStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub exclusion_reason: Option<String>,
    pub proof: Option<Proof>,
}

impl JourneyStop {
    pub fn pending(planned: OptimizedStop) -> Self {
        Self {
            planned,
            status: StopStatus::Pending,
            check_in_time: None,
            check_out_time: None,
            failure_reason: None,
            exclusion_reason: None,
            proof: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.planned.stop.id
    }

    pub fn sequence_index(&self) -> usize {
        self.planned.sequence_index
    }
}

/// A re-optimized plan awaiting caller confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReoptimizationProposal {
    pub base_plan_version: u32,
    pub current_location: Coordinate,
    pub result: OptimizationResult,
    pub newly_excluded: Vec<ExcludedStop>,
    pub proposed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journey {
    pub id: Uuid,
    pub depot: Coordinate,
    pub mode: OptimizationMode,
    pub tolerances: Tolerances,
    pub stops: Vec<JourneyStop>,
    pub planned_start_time: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JourneyStatus,
    pub plan_version: u32,
    pub proposal: Option<ReoptimizationProposal>,
    pub total_distance_meters: f64,
    pub total_duration_seconds: f64,
    pub created_at: DateTime<Utc>,
    /// Offline commands already handled, by queue sequence.
    #[serde(skip)]
    pub applied_commands: HashMap<u64, CommandKey>,
}

impl Journey {
    pub fn stop(&self, stop_id: Uuid) -> Option<&JourneyStop> {
        self.stops.iter().find(|stop| stop.id() == stop_id)
    }

    pub fn stop_position(&self, stop_id: Uuid) -> Option<usize> {
        self.stops.iter().position(|stop| stop.id() == stop_id)
    }
}
