use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::event::{JourneyEvent, JourneyEventKind};
use crate::models::journey::{Journey, JourneyStatus};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deviation {
    pub should_reoptimize: bool,
    pub drift_minutes: i64,
    pub reason: Option<String>,
}

/// Decides when committed ETAs have gone stale.
#[derive(Debug, Clone, Copy)]
pub struct DeviationMonitor {
    threshold: Duration,
}

impl DeviationMonitor {
    pub fn new(threshold_minutes: i64) -> Self {
        Self {
            threshold: Duration::minutes(threshold_minutes),
        }
    }

    pub fn should_reoptimize(&self, journey: &Journey, now: DateTime<Utc>) -> bool {
        self.assess(journey, now).should_reoptimize
    }

    pub fn assess(&self, journey: &Journey, now: DateTime<Utc>) -> Deviation {
        let (reference, label) = match (journey.status, journey.actual_start_time) {
            (JourneyStatus::Planned, _) => (journey.planned_start_time, "planned start"),
            (JourneyStatus::InProgress, Some(started)) => (started, "actual start"),
            _ => {
                return Deviation {
                    should_reoptimize: false,
                    drift_minutes: 0,
                    reason: None,
                };
            }
        };

        let drift = now - reference;
        let should_reoptimize = drift.abs() > self.threshold;

        Deviation {
            should_reoptimize,
            drift_minutes: drift.num_minutes(),
            reason: should_reoptimize.then(|| {
                format!(
                    "{} min from {label}, threshold is {} min",
                    drift.num_minutes().abs(),
                    self.threshold.num_minutes()
                )
            }),
        }
    }
}

/// Periodically flags journeys whose plan has drifted. Suggests once per plan
/// version and never mutates a journey.
pub async fn run_deviation_monitor(state: Arc<AppState>, every: std::time::Duration) {
    info!(every_secs = every.as_secs(), "deviation monitor started");

    let mut ticker = interval(every);
    let mut suggested: HashSet<(Uuid, u32)> = HashSet::new();

    loop {
        ticker.tick().await;
        let now = Utc::now();

        let handles: Vec<_> = state
            .journeys
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut live = HashMap::with_capacity(handles.len());
        for handle in handles {
            let journey = handle.lock().await;
            if journey.status != JourneyStatus::Completed {
                live.insert(journey.id, journey.plan_version);
            }
            let deviation = state.monitor.assess(&journey, now);
            let Some(reason) = deviation.reason else {
                continue;
            };
            if !suggested.insert((journey.id, journey.plan_version)) {
                continue;
            }

            debug!(journey_id = %journey.id, %reason, "re-optimization suggested");
            state.publish(JourneyEvent {
                journey_id: journey.id,
                kind: JourneyEventKind::ReoptimizationSuggested { reason },
                at: now,
            });
        }

        forget_settled(&mut suggested, &live);
    }
}

/// Keeps only suggestions for journeys still running on the same plan.
fn forget_settled(suggested: &mut HashSet<(Uuid, u32)>, live: &HashMap<Uuid, u32>) {
    suggested.retain(|(journey_id, plan_version)| live.get(journey_id) == Some(plan_version));
}
