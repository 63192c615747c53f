//! Request and response shapes for the three planning endpoints.
//!
//! All clocks are seconds since midnight; stop timings on the wire are
//! offsets from the previous stop (the first stop of a rider's plan is offset
//! from the rider's `startTime`).

use serde::{Deserialize, Serialize};

use super::{GeoPoint, Order, RiderMeta, Vehicle};

/// The single warehouse all trips loop through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotSpec {
    pub id: String,
    pub point: GeoPoint,
}

/// One stop of a planned trip. `order_id` carries the depot id for the
/// depot stops that open and close every trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStop {
    pub order_id: String,
    pub timing: i64,
}

/// Compute an initial multi-trip plan over all orders.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDayRequest {
    pub riders: Vec<RiderMeta>,
    pub orders: Vec<Order>,
    pub depot: DepotSpec,
    /// Total solve budget in seconds; defaults to the configured time limit.
    #[serde(default)]
    pub runtime: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiderTours {
    pub id: String,
    pub tours: Vec<Vec<TourStop>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartDayResponse {
    pub riders: Vec<RiderTours>,
}

/// A rider on an update call: the day-start metadata plus the plan the
/// client currently holds. `heading_to` names the next un-visited stop of
/// the in-progress trip; absent means the rider is idle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRider {
    pub id: String,
    pub vehicle: Vehicle,
    pub start_time: i64,
    #[serde(default)]
    pub tours: Vec<Vec<TourStop>>,
    #[serde(default)]
    pub heading_to: Option<String>,
}

impl PlannedRider {
    pub fn meta(&self) -> RiderMeta {
        RiderMeta {
            id: self.id.clone(),
            vehicle: self.vehicle.clone(),
            start_time: self.start_time,
        }
    }
}

/// Insert new pickup orders into a plan already in progress.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOrderRequest {
    pub riders: Vec<PlannedRider>,
    pub orders: Vec<Order>,
    pub depot: DepotSpec,
    pub new_orders: Vec<Order>,
    pub current_time: i64,
    #[serde(default)]
    pub runtime: Option<i64>,
    /// Seeds the rider permutation for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Remove a not-yet-reached pickup from the plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrderRequest {
    pub riders: Vec<PlannedRider>,
    pub orders: Vec<Order>,
    pub depot: DepotSpec,
    pub del_order_id: String,
    pub current_time: i64,
    #[serde(default)]
    pub runtime: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRiderTours {
    pub id: String,
    pub tours: Vec<Vec<TourStop>>,
    pub updated_current_tour: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    pub riders: Vec<UpdatedRiderTours>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_day_request_parses() {
        let body = r#"{
            "riders": [{"id": "r-1", "vehicle": {"capacity": 40}, "startTime": 32400}],
            "orders": [{
                "id": "o-1",
                "orderType": "delivery",
                "point": {"longitude": 77.6, "latitude": 12.9},
                "expectedTime": 36000,
                "package": {"volume": 10},
                "serviceTime": 300
            }],
            "depot": {"id": "warehouse", "point": {"longitude": 77.58, "latitude": 12.97}},
            "runtime": 60
        }"#;
        let request: StartDayRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.riders.len(), 1);
        assert_eq!(request.orders.len(), 1);
        assert_eq!(request.runtime, Some(60));
        assert_eq!(request.depot.id, "warehouse");
    }

    #[test]
    fn test_add_order_request_defaults() {
        let body = r#"{
            "riders": [{"id": "r-1", "vehicle": {"capacity": 40}, "startTime": 32400,
                        "tours": [[{"orderId": "warehouse", "timing": 0}]]}],
            "orders": [],
            "depot": {"id": "warehouse", "point": {"longitude": 77.58, "latitude": 12.97}},
            "newOrders": [],
            "currentTime": 40000
        }"#;
        let request: AddOrderRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.runtime, None);
        assert_eq!(request.seed, None);
        assert!(request.riders[0].heading_to.is_none());
        assert_eq!(request.riders[0].tours[0][0].order_id, "warehouse");
    }

    #[test]
    fn test_update_response_wire_names() {
        let response = UpdateResponse {
            riders: vec![UpdatedRiderTours {
                id: "r-1".to_string(),
                tours: vec![vec![TourStop { order_id: "warehouse".to_string(), timing: 0 }]],
                updated_current_tour: true,
            }],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("updatedCurrentTour"));
        assert!(json.contains("orderId"));
    }
}
