//! Add-pickups handler
//!
//! Splices freshly booked pickups into the submitted plan.

use axum::extract::State;
use axum::Json;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::{
    fetch_matrix, parse_submitted_plan, resolve_runtime, validate_depot, validate_orders,
    validate_rider_meta, validate_unique_ids, AppState,
};
use crate::error::ApiError;
use crate::services::planner::assemble::{current_tour_changed, tours_to_api, IdSpace};
use crate::services::planner::insertion::add_pickups;
use crate::services::planner::problem::{aged_penalties, ProblemInstance};
use crate::types::{
    AddOrderRequest, GeoPoint, Order, OrderKind, UpdateResponse, UpdatedRiderTours,
};

pub async fn add_order(
    State(state): State<AppState>,
    Json(request): Json<AddOrderRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    validate(&request)?;
    let runtime = resolve_runtime(request.runtime, &state.constants)?;

    // new pickups join the catalogue behind the existing orders
    let mut catalogue: Vec<Order> = request.orders.clone();
    catalogue.extend(request.new_orders.iter().cloned());

    let ids = IdSpace::new(&request.depot, &request.orders, &request.new_orders);
    let (submitted, tour_location) = parse_submitted_plan(&request.riders, &ids)?;

    let points: Vec<GeoPoint> = std::iter::once(request.depot.point)
        .chain(catalogue.iter().map(|o| o.point))
        .collect();
    let matrix = fetch_matrix(&state, &points).await?;

    let riders_meta: Vec<_> = request.riders.iter().map(|r| r.meta()).collect();
    let instance = ProblemInstance::build(&matrix, &riders_meta, &catalogue);
    let penalty = aged_penalties(&catalogue, &state.constants);

    let pickup_points: Vec<usize> =
        (1 + request.orders.len()..1 + catalogue.len()).collect();

    info!(
        riders = request.riders.len(),
        pickups = pickup_points.len(),
        runtime,
        "inserting pickups"
    );

    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let result = add_pickups(
        &submitted,
        &instance,
        penalty,
        &tour_location,
        pickup_points,
        request.current_time,
        runtime,
        &state.constants,
        &mut rng,
    );

    let riders = request
        .riders
        .iter()
        .enumerate()
        .map(|(v, rider)| UpdatedRiderTours {
            id: rider.id.clone(),
            tours: tours_to_api(&result.tours[v], &result.timings[v], &ids, rider.start_time),
            updated_current_tour: current_tour_changed(&submitted, &result, v),
        })
        .collect();

    Ok(Json(UpdateResponse { riders }))
}

fn validate(request: &AddOrderRequest) -> Result<(), ApiError> {
    if request.riders.is_empty() {
        return Err(ApiError::validation("riders must not be empty"));
    }
    if request.current_time < 0 {
        return Err(ApiError::validation("currentTime must be non-negative"));
    }
    validate_depot(&request.depot)?;
    validate_orders(&request.orders, "orders")?;
    validate_orders(&request.new_orders, "newOrders")?;
    for (i, order) in request.new_orders.iter().enumerate() {
        if order.order_type != OrderKind::Pickup {
            return Err(ApiError::validation(format!(
                "newOrders[{}] must be a pickup",
                i
            )));
        }
    }
    validate_unique_ids(
        std::iter::once(request.depot.id.as_str())
            .chain(request.orders.iter().map(|o| o.id.as_str()))
            .chain(request.new_orders.iter().map(|o| o.id.as_str())),
    )?;
    for (i, rider) in request.riders.iter().enumerate() {
        validate_rider_meta(i, rider.vehicle.capacity, rider.start_time)?;
    }
    Ok(())
}
