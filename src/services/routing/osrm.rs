//! OSRM table service client
//!
//! OSRM table API documentation:
//! https://project-osrm.org/docs/v5.24.0/api/#table-service

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DistanceProvider, DurationMatrix};
use crate::types::GeoPoint;

/// OSRM client configuration
#[derive(Debug, Clone)]
pub struct OsrmConfig {
    /// Base URL of the OSRM server (e.g. "http://router.project-osrm.org")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://router.project-osrm.org".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl OsrmConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }
}

/// OSRM table client
pub struct OsrmClient {
    client: Client,
    config: OsrmConfig,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Build the table request URL for a list of points.
    /// OSRM wants `lon,lat` pairs joined with `;`, percent-encoded.
    fn table_url(&self, points: &[GeoPoint]) -> String {
        let coords = points
            .iter()
            .map(|p| format!("{},{}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/table/v1/driving/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&coords)
        )
    }
}

#[async_trait]
impl DistanceProvider for OsrmClient {
    async fn travel_times(&self, points: &[GeoPoint]) -> Result<DurationMatrix> {
        let n = points.len();

        if n == 0 {
            return Ok(DurationMatrix::empty());
        }
        if n == 1 {
            return Ok(DurationMatrix { durations: vec![vec![0]], size: 1 });
        }

        let url = self.table_url(points);
        debug!("Requesting OSRM table for {} points", n);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send table request to OSRM")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OSRM table returned error {}: {}", status, body);
        }

        let table: TableResponse =
            response.json().await.context("Failed to parse OSRM table response")?;

        if table.durations.len() != n {
            anyhow::bail!(
                "OSRM table has {} rows, expected {}",
                table.durations.len(),
                n
            );
        }

        let mut durations = vec![vec![0i64; n]; n];
        for (i, row) in table.durations.iter().enumerate() {
            if row.len() != n {
                anyhow::bail!("OSRM table row {} has {} entries, expected {}", i, row.len(), n);
            }
            for (j, &cell) in row.iter().enumerate() {
                let seconds =
                    cell.with_context(|| format!("no route between points {} and {}", i, j))?;
                durations[i][j] = seconds.round() as i64;
            }
        }

        debug!("Received OSRM table: {}x{}", n, n);

        DurationMatrix::from_rows(durations)
    }

    fn name(&self) -> &str {
        "OSRM"
    }
}

// OSRM API types

#[derive(Debug, Deserialize)]
struct TableResponse {
    /// Seconds; `null` where no route exists
    durations: Vec<Vec<Option<f64>>>,
}
