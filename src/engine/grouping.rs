use crate::models::stop::{Priority, Stop};

/// Indices into the caller's stop slice that share one priority tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityGroup {
    pub priority: Priority,
    pub members: Vec<usize>,
}

/// Partitions stops into tiers, returned in visiting order (High, Normal, Low).
/// Empty tiers are omitted.
pub fn group_by_priority(stops: &[Stop]) -> Vec<PriorityGroup> {
    Priority::ALL
        .iter()
        .map(|&priority| PriorityGroup {
            priority,
            members: stops
                .iter()
                .enumerate()
                .filter(|(_, stop)| stop.priority == priority)
                .map(|(index, _)| index)
                .collect(),
        })
        .filter(|group| !group.members.is_empty())
        .collect()
}
