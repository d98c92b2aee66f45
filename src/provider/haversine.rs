use async_trait::async_trait;

use super::{DistanceProvider, ProviderError, TravelMatrix};
use crate::geo::haversine_meters;
use crate::models::optimization::TravelCost;
use crate::models::stop::Coordinate;

/// Offline estimate: straight-line distance stretched by a road coefficient,
/// driven at a constant average speed. Never fails.
#[derive(Debug, Clone)]
pub struct HaversineProvider {
    speed_kmh: f64,
    road_coefficient: f64,
}

impl Default for HaversineProvider {
    fn default() -> Self {
        Self {
            speed_kmh: 40.0,
            road_coefficient: 1.3,
        }
    }
}

impl HaversineProvider {
    pub fn new(speed_kmh: f64, road_coefficient: f64) -> Self {
        Self {
            speed_kmh,
            road_coefficient,
        }
    }

    fn cost(&self, from: &Coordinate, to: &Coordinate) -> TravelCost {
        let distance_meters = haversine_meters(from, to) * self.road_coefficient;
        let meters_per_second = self.speed_kmh / 3.6;
        let duration_seconds = if meters_per_second > 0.0 {
            distance_meters / meters_per_second
        } else {
            0.0
        };

        TravelCost {
            distance_meters,
            duration_seconds,
        }
    }
}

#[async_trait]
impl DistanceProvider for HaversineProvider {
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<TravelMatrix, ProviderError> {
        Ok(origins
            .iter()
            .map(|from| destinations.iter().map(|to| self.cost(from, to)).collect())
            .collect())
    }

    fn name(&self) -> &str {
        "haversine"
    }
}

#[cfg(test)]
mod tests {
    use super::HaversineProvider;
    use crate::models::stop::Coordinate;
    use crate::provider::DistanceProvider;

    #[tokio::test]
    async fn matrix_has_origin_by_destination_shape() {
        let provider = HaversineProvider::default();
        let origins = [Coordinate::new(41.0, 29.0)];
        let destinations = [Coordinate::new(41.0, 29.0), Coordinate::new(41.1, 29.1)];

        let matrix = provider.matrix(&origins, &destinations).await.unwrap();

        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[0].len(), 2);
        assert!(matrix[0][0].distance_meters < 1e-6);
        assert!(matrix[0][1].duration_seconds > 0.0);
    }

    #[tokio::test]
    async fn ten_km_at_forty_kmh_takes_fifteen_minutes() {
        let provider = HaversineProvider::new(40.0, 1.0);
        let from = Coordinate::new(0.0, 0.0);
        // one degree of longitude on the equator is ~111.2 km
        let to = Coordinate::new(0.0, 10.0 / 111.195);

        let matrix = provider.matrix(&[from], &[to]).await.unwrap();

        assert!((matrix[0][0].duration_seconds - 900.0).abs() < 5.0);
    }
}
