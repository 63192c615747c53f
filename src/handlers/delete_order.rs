//! Delete-pickup handler
//!
//! Removes a not-yet-reached pickup from the submitted plan. Unknown ids,
//! non-pickups and already-visited stops echo the plan back untouched.

use axum::extract::State;
use axum::Json;
use tracing::info;

use super::{
    fetch_matrix, parse_submitted_plan, resolve_runtime, validate_depot, validate_orders,
    validate_rider_meta, validate_unique_ids, AppState,
};
use crate::error::ApiError;
use crate::services::planner::assemble::{current_tour_changed, tours_to_api, IdSpace};
use crate::services::planner::problem::ProblemInstance;
use crate::services::planner::removal::delete_pickup;
use crate::types::{
    DeleteOrderRequest, GeoPoint, OrderKind, UpdateResponse, UpdatedRiderTours,
};

pub async fn delete_order(
    State(state): State<AppState>,
    Json(request): Json<DeleteOrderRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    validate(&request)?;
    let runtime = resolve_runtime(request.runtime, &state.constants)?;

    let ids = IdSpace::new(&request.depot, &request.orders, &[]);

    // the operation is defined for catalogued pickups only; anything else
    // leaves the plan as submitted
    let target = request
        .orders
        .iter()
        .position(|o| o.id == request.del_order_id && o.order_type == OrderKind::Pickup)
        .map(|i| i + 1);
    let Some(pickup) = target else {
        info!(id = %request.del_order_id, "delete target not a known pickup, echoing plan");
        return Ok(Json(echo_unchanged(&request)));
    };

    let (submitted, tour_location) = parse_submitted_plan(&request.riders, &ids)?;

    let points: Vec<GeoPoint> = std::iter::once(request.depot.point)
        .chain(request.orders.iter().map(|o| o.point))
        .collect();
    let matrix = fetch_matrix(&state, &points).await?;

    let riders_meta: Vec<_> = request.riders.iter().map(|r| r.meta()).collect();
    let instance = ProblemInstance::build(&matrix, &riders_meta, &request.orders);

    info!(id = %request.del_order_id, node = pickup, runtime, "deleting pickup");

    let (result, changed_rider) = delete_pickup(
        &submitted,
        &instance,
        &tour_location,
        pickup,
        request.current_time,
        runtime,
        &state.constants,
    );

    let riders = request
        .riders
        .iter()
        .enumerate()
        .map(|(v, rider)| UpdatedRiderTours {
            id: rider.id.clone(),
            tours: tours_to_api(&result.tours[v], &result.timings[v], &ids, rider.start_time),
            updated_current_tour: changed_rider == Some(v)
                || current_tour_changed(&submitted, &result, v),
        })
        .collect();

    Ok(Json(UpdateResponse { riders }))
}

/// Hand the submitted tours straight back; nothing changed.
fn echo_unchanged(request: &DeleteOrderRequest) -> UpdateResponse {
    UpdateResponse {
        riders: request
            .riders
            .iter()
            .map(|rider| UpdatedRiderTours {
                id: rider.id.clone(),
                tours: rider.tours.clone(),
                updated_current_tour: false,
            })
            .collect(),
    }
}

fn validate(request: &DeleteOrderRequest) -> Result<(), ApiError> {
    if request.riders.is_empty() {
        return Err(ApiError::validation("riders must not be empty"));
    }
    if request.current_time < 0 {
        return Err(ApiError::validation("currentTime must be non-negative"));
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
    use crate::types::{DepotSpec, Order, Package, PlannedRider, TourStop, Vehicle};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState { constants: Constants::default(), provider: Arc::new(HaversineProvider::new()) }
    }

    fn depot() -> DepotSpec {
        DepotSpec { id: "warehouse".to_string(), point: GeoPoint::new(77.5946, 12.9716) }
    }

    fn order(id: &str, kind: OrderKind, longitude: f64, latitude: f64) -> Order {
        Order {
            id: id.to_string(),
            order_type: kind,
            point: GeoPoint::new(longitude, latitude),
            expected_time: 60_000,
            package: Package { volume: 8.0 },
            service_time: 60,
        }
    }

    fn stop(id: &str, timing: i64) -> TourStop {
        TourStop { order_id: id.to_string(), timing }
    }

    fn rider(tours: Vec<Vec<TourStop>>, heading_to: Option<&str>) -> PlannedRider {
        PlannedRider {
            id: "r-1".to_string(),
            vehicle: Vehicle { capacity: 40.0 },
            start_time: 32_400,
            tours,
            heading_to: heading_to.map(str::to_string),
        }
    }

    fn request(riders: Vec<PlannedRider>, del: &str) -> DeleteOrderRequest {
        DeleteOrderRequest {
            riders,
            orders: vec![
                order("o-1", OrderKind::Delivery, 77.61, 12.95),
                order("p-1", OrderKind::Pickup, 77.62, 12.94),
            ],
            depot: depot(),
            del_order_id: del.to_string(),
            current_time: 33_000,
            runtime: Some(5),
        }
    }

    fn running_tours() -> Vec<Vec<TourStop>> {
        vec![vec![
            stop("warehouse", 0),
            stop("o-1", 600),
            stop("p-1", 400),
            stop("warehouse", 500),
        ]]
    }

    #[tokio::test]
    async fn test_pickup_ahead_is_spliced_out() {
        let req = request(vec![rider(running_tours(), Some("o-1"))], "p-1");

        let Json(response) = delete_order(State(state()), Json(req)).await.unwrap();

        let ids: Vec<&str> =
            response.riders[0].tours[0].iter().map(|s| s.order_id.as_str()).collect();
        assert_eq!(ids, vec!["warehouse", "o-1", "warehouse"]);
        assert!(response.riders[0].updated_current_tour);
    }

    #[tokio::test]
    async fn test_unknown_id_echoes_plan() {
        let submitted = running_tours();
        let req = request(vec![rider(submitted.clone(), Some("o-1"))], "ghost");

        let Json(response) = delete_order(State(state()), Json(req)).await.unwrap();

        assert_eq!(response.riders[0].tours, submitted);
        assert!(!response.riders[0].updated_current_tour);
    }

    #[tokio::test]
    async fn test_delivery_id_echoes_plan() {
        let submitted = running_tours();
        let req = request(vec![rider(submitted.clone(), Some("o-1"))], "o-1");

        let Json(response) = delete_order(State(state()), Json(req)).await.unwrap();

        assert_eq!(response.riders[0].tours, submitted);
        assert!(!response.riders[0].updated_current_tour);
    }

    #[tokio::test]
    async fn test_visited_pickup_echoes_plan() {
        // p-1 sits behind the rider, who is now driving to o-1
        let visited_first = vec![vec![
            stop("warehouse", 0),
            stop("p-1", 500),
            stop("o-1", 400),
            stop("warehouse", 600),
        ]];
        let req = request(vec![rider(visited_first, Some("o-1"))], "p-1");

        let Json(response) = delete_order(State(state()), Json(req)).await.unwrap();

        let ids: Vec<&str> =
            response.riders[0].tours[0].iter().map(|s| s.order_id.as_str()).collect();
        assert_eq!(ids, vec!["warehouse", "p-1", "o-1", "warehouse"]);
        assert!(!response.riders[0].updated_current_tour);
    }
}
