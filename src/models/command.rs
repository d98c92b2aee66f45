use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::journey::Proof;
use crate::models::stop::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    CheckIn,
    Complete,
    Fail,
    Reset,
    Reoptimize,
    ConfirmReoptimization,
}

/// Replay identity of a queued command. `sequence` is the command's position
/// in the device's offline queue, so a stop checked in twice (before and after
/// a reset) yields two distinct keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub journey_id: Uuid,
    pub stop_id: Option<Uuid>,
    pub operation: OperationType,
    pub sequence: u64,
}

/// A command as the offline queue sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedCommand {
    pub sequence: u64,
    #[serde(flatten)]
    pub command: JourneyCommand,
}

impl QueuedCommand {
    pub fn key(&self) -> CommandKey {
        let (stop_id, operation) = self.command.target();
        CommandKey {
            journey_id: self.command.journey_id(),
            stop_id,
            operation,
            sequence: self.sequence,
        }
    }
}

/// A state-machine operation recorded while offline, replayable once connected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum JourneyCommand {
    CheckIn {
        journey_id: Uuid,
        stop_id: Uuid,
    },
    Complete {
        journey_id: Uuid,
        stop_id: Uuid,
        #[serde(default)]
        proof: Proof,
    },
    Fail {
        journey_id: Uuid,
        stop_id: Uuid,
        reason: String,
    },
    Reset {
        journey_id: Uuid,
        stop_id: Uuid,
    },
    Reoptimize {
        journey_id: Uuid,
        current_location: Coordinate,
        base_plan_version: u32,
    },
    ConfirmReoptimization {
        journey_id: Uuid,
        base_plan_version: u32,
    },
}

impl JourneyCommand {
    pub fn journey_id(&self) -> Uuid {
        match self {
            JourneyCommand::CheckIn { journey_id, .. }
            | JourneyCommand::Complete { journey_id, .. }
            | JourneyCommand::Fail { journey_id, .. }
            | JourneyCommand::Reset { journey_id, .. }
            | JourneyCommand::Reoptimize { journey_id, .. }
            | JourneyCommand::ConfirmReoptimization { journey_id, .. } => *journey_id,
        }
    }

    pub fn target(&self) -> (Option<Uuid>, OperationType) {
        match self {
            JourneyCommand::CheckIn { stop_id, .. } => (Some(*stop_id), OperationType::CheckIn),
            JourneyCommand::Complete { stop_id, .. } => (Some(*stop_id), OperationType::Complete),
            JourneyCommand::Fail { stop_id, .. } => (Some(*stop_id), OperationType::Fail),
            JourneyCommand::Reset { stop_id, .. } => (Some(*stop_id), OperationType::Reset),
            JourneyCommand::Reoptimize { .. } => (None, OperationType::Reoptimize),
            JourneyCommand::ConfirmReoptimization { .. } => {
                (None, OperationType::ConfirmReoptimization)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::{JourneyCommand, OperationType, QueuedCommand};

    #[test]
    fn command_decodes_from_tagged_json() {
        let journey_id = Uuid::from_u128(1);
        let stop_id = Uuid::from_u128(7);
        let queued: QueuedCommand = serde_json::from_value(json!({
            "sequence": 4,
            "operation": "complete",
            "journey_id": journey_id,
            "stop_id": stop_id,
            "proof": { "signature_ref": "sig-7" }
        }))
        .unwrap();

        assert!(matches!(queued.command, JourneyCommand::Complete { .. }));
        let key = queued.key();
        assert_eq!(key.journey_id, journey_id);
        assert_eq!(key.stop_id, Some(stop_id));
        assert_eq!(key.operation, OperationType::Complete);
        assert_eq!(key.sequence, 4);
    }
}
