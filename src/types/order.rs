//! Order types

use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// What the rider does at the stop: drop a package off or collect one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Delivery,
    Pickup,
}

/// Package metadata; volume shares the unit of vehicle capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub volume: f64,
}

/// A delivery or pickup order as submitted by the client.
///
/// `expected_time` is seconds since midnight of day zero and may exceed
/// 86 400 for orders due on a later day. `service_time` is the dwell time at
/// the stop in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_type: OrderKind,
    pub point: GeoPoint,
    pub expected_time: i64,
    pub package: Package,
    pub service_time: i64,
}

impl Order {
    /// Load change when the stop is serviced: deliveries free space up,
    /// pickups consume it.
    pub fn signed_volume(&self) -> i64 {
        let volume = self.package.volume.round() as i64;
        match self.order_type {
            OrderKind::Delivery => volume,
            OrderKind::Pickup => -volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(kind: OrderKind, volume: f64) -> Order {
        Order {
            id: "o-1".to_string(),
            order_type: kind,
            point: GeoPoint::new(77.58, 12.97),
            expected_time: 36_000,
            package: Package { volume },
            service_time: 120,
        }
    }

    #[test]
    fn test_delivery_volume_is_positive() {
        assert_eq!(order(OrderKind::Delivery, 24.0).signed_volume(), 24);
    }

    #[test]
    fn test_pickup_volume_is_negative() {
        assert_eq!(order(OrderKind::Pickup, 28.4).signed_volume(), -28);
    }

    #[test]
    fn test_order_kind_wire_format() {
        let parsed: OrderKind = serde_json::from_str("\"pickup\"").unwrap();
        assert_eq!(parsed, OrderKind::Pickup);
        assert_eq!(serde_json::to_string(&OrderKind::Delivery).unwrap(), "\"delivery\"");
    }
}
