use crate::engine::grouping::PriorityGroup;
use crate::models::optimization::{OptimizationMode, TravelCost};
use crate::models::stop::Stop;
use crate::provider::TravelMatrix;

/// Matrix row/column of the anchor. Stop `i` lives at `i + 1`.
pub const ANCHOR: usize = 0;

pub fn leg_cost(cell: &TravelCost, mode: OptimizationMode) -> f64 {
    match mode {
        OptimizationMode::Distance => cell.distance_meters,
        OptimizationMode::Duration => cell.duration_seconds,
    }
}

/// Nearest-neighbour tour over each tier in turn, chained: a tier starts where
/// the previous one ended. Returns stop indices in visiting order.
///
/// Ties on cost go to the lowest stop id so identical inputs give identical tours.
pub fn build_tour(
    matrix: &TravelMatrix,
    stops: &[Stop],
    groups: &[PriorityGroup],
    mode: OptimizationMode,
) -> Vec<usize> {
    let mut order = Vec::with_capacity(stops.len());
    let mut current = ANCHOR;

    for group in groups {
        let mut unvisited = group.members.clone();

        loop {
            let Some((position, &next)) = unvisited
                .iter()
                .enumerate()
                .min_by(|&(_, &a), &(_, &b)| {
                    let cost_a = leg_cost(&matrix[current][a + 1], mode);
                    let cost_b = leg_cost(&matrix[current][b + 1], mode);
                    cost_a
                        .total_cmp(&cost_b)
                        .then_with(|| stops[a].id.cmp(&stops[b].id))
                })
            else {
                break;
            };

            unvisited.swap_remove(position);
            order.push(next);
            current = next + 1;
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::build_tour;
    use crate::engine::grouping::group_by_priority;
    use crate::models::optimization::{OptimizationMode, TravelCost};
    use crate::models::stop::{Coordinate, Priority, ProofRequirements, Stop};
    use crate::provider::TravelMatrix;

    fn stop(seed: u128, priority: Priority) -> Stop {
        Stop {
            id: Uuid::from_u128(seed),
            coordinate: Coordinate::new(41.0, 29.0),
            priority,
            service_time_minutes: 0,
            time_window: None,
            customer_ref: format!("customer-{seed}"),
            proof_requirements: ProofRequirements::default(),
        }
    }

    /// Points on a line: the anchor at 0, stop `i` at `positions[i]`.
    fn line_matrix(positions: &[f64]) -> TravelMatrix {
        let points: Vec<f64> = std::iter::once(0.0).chain(positions.iter().copied()).collect();
        points
            .iter()
            .map(|from| {
                points
                    .iter()
                    .map(|to| TravelCost {
                        distance_meters: (to - from).abs(),
                        duration_seconds: (to - from).abs() * 10.0,
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn visits_nearest_stop_first() {
        let stops = vec![
            stop(1, Priority::Normal),
            stop(2, Priority::Normal),
            stop(3, Priority::Normal),
        ];
        let matrix = line_matrix(&[300.0, 100.0, 200.0]);

        let order = build_tour(&matrix, &stops, &group_by_priority(&stops), OptimizationMode::Distance);

        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn tiers_are_never_interleaved() {
        let stops = vec![
            stop(1, Priority::Low),
            stop(2, Priority::High),
            stop(3, Priority::Normal),
        ];
        // the low-priority stop is closest to the anchor but still goes last
        let matrix = line_matrix(&[10.0, 500.0, 300.0]);

        let order = build_tour(&matrix, &stops, &group_by_priority(&stops), OptimizationMode::Duration);

        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn equal_costs_break_ties_by_lowest_id() {
        let stops = vec![stop(9, Priority::High), stop(4, Priority::High)];
        let matrix = line_matrix(&[100.0, 100.0]);

        let order = build_tour(&matrix, &stops, &group_by_priority(&stops), OptimizationMode::Distance);

        assert_eq!(order[0], 1);
    }
}
