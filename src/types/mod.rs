//! Type definitions

pub mod api;
pub mod order;
pub mod rider;

pub use api::*;
pub use order::*;
pub use rider::*;

use serde::{Deserialize, Serialize};

/// A geographic point in the order `{longitude, latitude}` used on the wire
/// and by the distance provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// Basic range check; geocoding quality is the client's problem.
    pub fn in_range(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
    }
}
