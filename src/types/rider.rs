//! Rider and vehicle types

use serde::{Deserialize, Serialize};

/// Vehicle attached to a rider; capacity shares the unit of package volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub capacity: f64,
}

/// A rider as submitted on a start-day call: the vehicle and the earliest
/// clock (seconds since midnight) the rider may leave the depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderMeta {
    pub id: String,
    pub vehicle: Vehicle,
    pub start_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rider_wire_format() {
        let rider: RiderMeta = serde_json::from_str(
            r#"{"id":"r-1","vehicle":{"capacity":240},"startTime":32400}"#,
        )
        .unwrap();
        assert_eq!(rider.id, "r-1");
        assert_eq!(rider.start_time, 32_400);
        assert!((rider.vehicle.capacity - 240.0).abs() < 1e-9);
    }
}
