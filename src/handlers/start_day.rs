//! Start-day handler
//!
//! Computes the initial multi-trip plan over the full order catalogue.

use axum::extract::State;
use axum::Json;
use tracing::info;

use super::{
    fetch_matrix, resolve_runtime, validate_depot, validate_orders, validate_rider_meta,
    validate_unique_ids, AppState,
};
use crate::error::ApiError;
use crate::services::planner::assemble::{tours_to_api, IdSpace};
use crate::services::planner::multi_trip::plan_trips;
use crate::services::planner::problem::{aged_penalties, ProblemInstance};
use crate::types::{GeoPoint, RiderTours, StartDayRequest, StartDayResponse};

pub async fn start_day(
    State(state): State<AppState>,
    Json(request): Json<StartDayRequest>,
) -> Result<Json<StartDayResponse>, ApiError> {
    validate(&request)?;
    let runtime = resolve_runtime(request.runtime, &state.constants)?;

    let points: Vec<GeoPoint> = std::iter::once(request.depot.point)
        .chain(request.orders.iter().map(|o| o.point))
        .collect();
    let matrix = fetch_matrix(&state, &points).await?;

    let instance = ProblemInstance::build(&matrix, &request.riders, &request.orders);
    let penalty = aged_penalties(&request.orders, &state.constants);

    info!(
        riders = request.riders.len(),
        orders = request.orders.len(),
        runtime,
        "planning day"
    );

    let plan = plan_trips(&instance, penalty, runtime, &state.constants);

    let ids = IdSpace::new(&request.depot, &request.orders, &[]);
    let riders = request
        .riders
        .iter()
        .enumerate()
        .map(|(v, rider)| RiderTours {
            id: rider.id.clone(),
            tours: tours_to_api(&plan.tours[v], &plan.timings[v], &ids, rider.start_time),
        })
        .collect();

    Ok(Json(StartDayResponse { riders }))
}

fn validate(request: &StartDayRequest) -> Result<(), ApiError> {
    if request.riders.is_empty() {
        return Err(ApiError::validation("riders must not be empty"));
    }
    validate_depot(&request.depot)?;
    validate_orders(&request.orders, "orders")?;
    validate_unique_ids(
        std::iter::once(request.depot.id.as_str())
            .chain(request.orders.iter().map(|o| o.id.as_str())),
    )?;
    for (i, rider) in request.riders.iter().enumerate() {
        validate_rider_meta(i, rider.vehicle.capacity, rider.start_time)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Constants;
    use crate::services::routing::HaversineProvider;
    use crate::types::{DepotSpec, Order, OrderKind, Package, RiderMeta, Vehicle};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState { constants: Constants::default(), provider: Arc::new(HaversineProvider::new()) }
    }

    fn depot() -> DepotSpec {
        DepotSpec { id: "warehouse".to_string(), point: GeoPoint::new(77.5946, 12.9716) }
    }

    fn rider(id: &str, capacity: f64) -> RiderMeta {
        RiderMeta { id: id.to_string(), vehicle: Vehicle { capacity }, start_time: 32_400 }
    }

    fn delivery(id: &str, longitude: f64, latitude: f64, volume: f64) -> Order {
        Order {
            id: id.to_string(),
            order_type: OrderKind::Delivery,
            point: GeoPoint::new(longitude, latitude),
            expected_time: 50_000,
            package: Package { volume },
            service_time: 120,
        }
    }

    fn request(riders: Vec<RiderMeta>, orders: Vec<Order>) -> StartDayRequest {
        StartDayRequest { riders, orders, depot: depot(), runtime: Some(5) }
    }

    #[tokio::test]
    async fn test_plans_every_order_once() {
        let req = request(
            vec![rider("r-1", 40.0)],
            vec![
                delivery("o-1", 77.61, 12.95, 10.0),
                delivery("o-2", 77.64, 12.93, 10.0),
                delivery("o-3", 77.60, 12.99, 10.0),
            ],
        );

        let Json(response) = start_day(State(state()), Json(req)).await.unwrap();

        assert_eq!(response.riders.len(), 1);
        let mut served: Vec<String> = response.riders[0]
            .tours
            .iter()
            .flatten()
            .filter(|s| s.order_id != "warehouse")
            .map(|s| s.order_id.clone())
            .collect();
        served.sort();
        assert_eq!(served, vec!["o-1", "o-2", "o-3"]);

        for tour in &response.riders[0].tours {
            assert_eq!(tour.first().unwrap().order_id, "warehouse");
            assert_eq!(tour.last().unwrap().order_id, "warehouse");
            for stop in tour.iter().skip(1) {
                assert!(stop.timing >= 0);
            }
        }
    }

    #[tokio::test]
    async fn test_capacity_forces_second_trip() {
        let req = request(
            vec![rider("r-1", 10.0)],
            vec![
                delivery("o-1", 77.61, 12.95, 10.0),
                delivery("o-2", 77.64, 12.93, 10.0),
            ],
        );

        let Json(response) = start_day(State(state()), Json(req)).await.unwrap();

        assert_eq!(response.riders[0].tours.len(), 2);
        for tour in &response.riders[0].tours {
            assert_eq!(tour.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_empty_orders_give_empty_plan() {
        let req = request(vec![rider("r-1", 40.0)], vec![]);
        let Json(response) = start_day(State(state()), Json(req)).await.unwrap();
        assert!(response.riders[0].tours.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_duplicate_ids() {
        let req = request(
            vec![rider("r-1", 40.0)],
            vec![delivery("o-1", 77.61, 12.95, 10.0), delivery("o-1", 77.62, 12.94, 5.0)],
        );
        let result = start_day(State(state()), Json(req)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rejects_empty_fleet() {
        let req = request(vec![], vec![delivery("o-1", 77.61, 12.95, 10.0)]);
        let result = start_day(State(state()), Json(req)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rejects_negative_volume() {
        let mut bad = delivery("o-1", 77.61, 12.95, 10.0);
        bad.package.volume = -2.0;
        let req = request(vec![rider("r-1", 40.0)], vec![bad]);
        let result = start_day(State(state()), Json(req)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
