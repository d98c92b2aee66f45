use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::journey::{JourneyStatus, StopStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JourneyEventKind {
    StopStatusChanged { stop_id: Uuid, status: StopStatus },
    JourneyStatusChanged { status: JourneyStatus },
    ReoptimizationProposed { excluded_stop_ids: Vec<Uuid> },
    PlanCommitted { plan_version: u32 },
    ReoptimizationSuggested { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JourneyEvent {
    pub journey_id: Uuid,
    #[serde(flatten)]
    pub kind: JourneyEventKind,
    pub at: DateTime<Utc>,
}
