//! Travel-time matrix providers
//!
//! OSRM for production, a haversine estimator for tests and offline runs.

mod osrm;

pub use osrm::{OsrmClient, OsrmConfig};

use anyhow::Result;
use async_trait::async_trait;

use crate::services::geo::haversine_distance;
use crate::types::GeoPoint;

/// Square matrix of integer travel times in seconds. Row `i`, column `j` is
/// the drive from point `i` to point `j`; the diagonal is zero.
#[derive(Debug, Clone)]
pub struct DurationMatrix {
    pub durations: Vec<Vec<i64>>,
    pub size: usize,
}

impl DurationMatrix {
    pub fn empty() -> Self {
        Self { durations: vec![], size: 0 }
    }

    pub fn from_rows(durations: Vec<Vec<i64>>) -> Result<Self> {
        let size = durations.len();
        for (i, row) in durations.iter().enumerate() {
            if row.len() != size {
                anyhow::bail!("matrix row {} has {} entries, expected {}", i, row.len(), size);
            }
            for (j, &value) in row.iter().enumerate() {
                if value < 0 {
                    anyhow::bail!("negative travel time {} at ({}, {})", value, i, j);
                }
            }
            if durations[i][i] != 0 {
                anyhow::bail!("non-zero diagonal at {}", i);
            }
        }
        Ok(Self { durations, size })
    }

    /// Travel time from point `from` to point `to` in seconds
    pub fn duration(&self, from: usize, to: usize) -> i64 {
        self.durations[from][to]
    }
}

/// Source of travel-time matrices between request points. The first point is
/// always the depot.
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn travel_times(&self, points: &[GeoPoint]) -> Result<DurationMatrix>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Offline provider estimating road travel time from straight-line distance.
pub struct HaversineProvider {
    /// Straight-line to road-distance stretch (default 1.3)
    road_coefficient: f64,
    /// Assumed average speed in km/h (default 40)
    average_speed_kmh: f64,
}

impl Default for HaversineProvider {
    fn default() -> Self {
        Self { road_coefficient: 1.3, average_speed_kmh: 40.0 }
    }
}

impl HaversineProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistanceProvider for HaversineProvider {
    async fn travel_times(&self, points: &[GeoPoint]) -> Result<DurationMatrix> {
        let n = points.len();
        let mut durations = vec![vec![0i64; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let road_km = haversine_distance(&points[i], &points[j]) * self.road_coefficient;
                    durations[i][j] = (road_km / self.average_speed_kmh * 3600.0).round() as i64;
                }
            }
        }

        Ok(DurationMatrix { durations, size: n })
    }

    fn name(&self) -> &str {
        "Haversine"
    }
}

/// Pick the provider from configuration: OSRM when a base URL is set, the
/// haversine estimator otherwise.
pub fn create_provider(osrm_base_url: &str) -> Box<dyn DistanceProvider> {
    if osrm_base_url.trim().is_empty() {
        Box::new(HaversineProvider::new())
    } else {
        Box::new(OsrmClient::new(OsrmConfig::new(osrm_base_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depot() -> GeoPoint {
        GeoPoint::new(77.5946, 12.9716)
    }

    fn koramangala() -> GeoPoint {
        GeoPoint::new(77.6245, 12.9352)
    }

    fn whitefield() -> GeoPoint {
        GeoPoint::new(77.7500, 12.9698)
    }

    #[tokio::test]
    async fn test_haversine_provider_empty() {
        let provider = HaversineProvider::new();
        let matrix = provider.travel_times(&[]).await.unwrap();
        assert_eq!(matrix.size, 0);
    }

    #[tokio::test]
    async fn test_haversine_provider_diagonal_zero() {
        let provider = HaversineProvider::new();
        let matrix = provider.travel_times(&[depot(), koramangala(), whitefield()]).await.unwrap();

        assert_eq!(matrix.size, 3);
        for i in 0..3 {
            assert_eq!(matrix.duration(i, i), 0);
        }
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    assert!(matrix.duration(i, j) > 0);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_haversine_provider_symmetric() {
        let provider = HaversineProvider::new();
        let matrix = provider.travel_times(&[depot(), whitefield()]).await.unwrap();
        assert_eq!(matrix.duration(0, 1), matrix.duration(1, 0));

        // ~17 km straight line, stretched and driven at 40 km/h: well under 2 h
        assert!(matrix.duration(0, 1) > 600);
        assert!(matrix.duration(0, 1) < 7200);
    }

    #[test]
    fn test_from_rows_accepts_square() {
        let matrix = DurationMatrix::from_rows(vec![vec![0, 10], vec![12, 0]]).unwrap();
        assert_eq!(matrix.size, 2);
        assert_eq!(matrix.duration(1, 0), 12);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(DurationMatrix::from_rows(vec![vec![0, 10], vec![12]]).is_err());
    }

    #[test]
    fn test_from_rows_rejects_negative() {
        assert!(DurationMatrix::from_rows(vec![vec![0, -4], vec![12, 0]]).is_err());
    }

    #[test]
    fn test_from_rows_rejects_nonzero_diagonal() {
        assert!(DurationMatrix::from_rows(vec![vec![5, 10], vec![12, 0]]).is_err());
    }

    #[test]
    fn test_create_provider_selects_mock_for_empty_url() {
        let provider = create_provider("");
        assert_eq!(provider.name(), "Haversine");
    }

    #[test]
    fn test_create_provider_selects_osrm() {
        let provider = create_provider("http://localhost:5000");
        assert_eq!(provider.name(), "OSRM");
    }
}
