//! HTTP handlers
//!
//! One module per endpoint; shared request validation and plan parsing live
//! here. Handlers follow the same shape throughout: validate, fetch the
//! travel-time matrix, build the problem, run the engine, project back.

pub mod add_order;
pub mod delete_order;
pub mod start_day;

use std::collections::HashSet;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::config::Constants;
use crate::error::ApiError;
use crate::services::planner::assemble::{tours_from_api, IdSpace};
use crate::services::planner::PlanState;
use crate::services::routing::{DistanceProvider, DurationMatrix};
use crate::types::{DepotSpec, GeoPoint, Order, PlannedRider};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub constants: Constants,
    pub provider: Arc<dyn DistanceProvider>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/startday/", post(start_day::start_day))
        .route("/addorder/", post(add_order::add_order))
        .route("/delorder/", post(delete_order::delete_order))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

// ==========================================================================
// Shared validation
// ==========================================================================

pub(crate) fn validate_depot(depot: &DepotSpec) -> Result<(), ApiError> {
    if !depot.point.in_range() {
        return Err(ApiError::validation("depot.point is out of range"));
    }
    Ok(())
}

pub(crate) fn validate_orders(orders: &[Order], field: &str) -> Result<(), ApiError> {
    for (i, order) in orders.iter().enumerate() {
        if !order.point.in_range() {
            return Err(ApiError::validation(format!("{}[{}].point is out of range", field, i)));
        }
        if !order.package.volume.is_finite() || order.package.volume < 0.0 {
            return Err(ApiError::validation(format!(
                "{}[{}].package.volume must be non-negative",
                field, i
            )));
        }
        if order.service_time < 0 {
            return Err(ApiError::validation(format!(
                "{}[{}].serviceTime must be non-negative",
                field, i
            )));
        }
        if order.expected_time < 0 {
            return Err(ApiError::validation(format!(
                "{}[{}].expectedTime must be non-negative",
                field, i
            )));
        }
    }
    Ok(())
}

/// Ids must be unique across the depot and every order of the request.
pub(crate) fn validate_unique_ids<'a>(
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ApiError::validation(format!("duplicate id {:?}", id)));
        }
    }
    Ok(())
}

pub(crate) fn validate_rider_meta(
    index: usize,
    capacity: f64,
    start_time: i64,
) -> Result<(), ApiError> {
    if !capacity.is_finite() || capacity < 0.0 {
        return Err(ApiError::validation(format!(
            "riders[{}].vehicle.capacity must be non-negative",
            index
        )));
    }
    if start_time < 0 {
        return Err(ApiError::validation(format!(
            "riders[{}].startTime must be non-negative",
            index
        )));
    }
    Ok(())
}

pub(crate) fn resolve_runtime(
    runtime: Option<i64>,
    constants: &Constants,
) -> Result<i64, ApiError> {
    let runtime = runtime.unwrap_or(constants.default_time_limit);
    if runtime <= 0 {
        return Err(ApiError::validation("runtime must be positive"));
    }
    Ok(runtime)
}

// ==========================================================================
// Shared plumbing
// ==========================================================================

pub(crate) async fn fetch_matrix(
    state: &AppState,
    points: &[GeoPoint],
) -> Result<DurationMatrix, ApiError> {
    let matrix = state
        .provider
        .travel_times(points)
        .await
        .map_err(ApiError::upstream)?;
    if matrix.size != points.len() {
        return Err(ApiError::Upstream(format!(
            "provider returned a {}x{} matrix for {} points",
            matrix.size,
            matrix.size,
            points.len()
        )));
    }
    Ok(matrix)
}

/// Parse submitted plans back into index space and locate each rider within
/// its running trip (-1 when idle).
pub(crate) fn parse_submitted_plan(
    riders: &[PlannedRider],
    ids: &IdSpace,
) -> Result<(PlanState, Vec<i64>), ApiError> {
    let mut plan = PlanState::with_riders(riders.len());
    let mut tour_location = Vec::with_capacity(riders.len());
    let mut seen_orders = HashSet::new();

    for (i, rider) in riders.iter().enumerate() {
        let (tours, timings) = tours_from_api(&rider.tours, ids, rider.start_time)
            .map_err(|e| ApiError::validation(format!("riders[{}]: {:#}", i, e)))?;

        // an order may be planned at most once across the whole fleet
        for &node in tours.iter().flatten() {
            if node != 0 && !seen_orders.insert(node) {
                return Err(ApiError::validation(format!(
                    "riders[{}]: order {:?} is planned more than once",
                    i,
                    ids.id_of(node)
                )));
            }
        }

        let current_len = tours.first().map(Vec::len).unwrap_or(0);
        let location = match &rider.heading_to {
            None => {
                if current_len > 0 {
                    return Err(ApiError::validation(format!(
                        "riders[{}]: headingTo is required while a tour is in progress",
                        i
                    )));
                }
                -1
            }
            Some(heading) => {
                let Some(node) = ids.node_of(heading) else {
                    return Err(ApiError::validation(format!(
                        "riders[{}].headingTo references unknown id {:?}",
                        i, heading
                    )));
                };
                let Some(position) =
                    tours.first().and_then(|trip| trip.iter().position(|&loc| loc == node))
                else {
                    return Err(ApiError::validation(format!(
                        "riders[{}].headingTo {:?} is not on the current tour",
                        i, heading
                    )));
                };
                position as i64
            }
        };

        plan.tours[i] = tours;
        plan.timings[i] = timings;
        tour_location.push(location);
    }

    Ok((plan, tour_location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderKind, Package, TourStop, Vehicle};

    fn depot() -> DepotSpec {
        DepotSpec { id: "warehouse".to_string(), point: GeoPoint::new(77.58, 12.97) }
    }

    fn order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            order_type: OrderKind::Delivery,
            point: GeoPoint::new(77.6, 12.9),
            expected_time: 36_000,
            package: Package { volume: 10.0 },
            service_time: 60,
        }
    }

    fn planned_rider(tours: Vec<Vec<TourStop>>, heading_to: Option<&str>) -> PlannedRider {
        PlannedRider {
            id: "r-1".to_string(),
            vehicle: Vehicle { capacity: 40.0 },
            start_time: 32_400,
            tours,
            heading_to: heading_to.map(str::to_string),
        }
    }

    fn stop(id: &str, timing: i64) -> TourStop {
        TourStop { order_id: id.to_string(), timing }
    }

    #[test]
    fn test_unique_ids_rejects_duplicates() {
        assert!(validate_unique_ids(["warehouse", "o-1", "o-2"]).is_ok());
        assert!(validate_unique_ids(["warehouse", "o-1", "o-1"]).is_err());
    }

    #[test]
    fn test_order_validation() {
        let mut bad = order("o-1");
        bad.package.volume = -1.0;
        assert!(validate_orders(&[bad], "orders").is_err());

        let mut bad = order("o-2");
        bad.service_time = -5;
        assert!(validate_orders(&[bad], "orders").is_err());

        assert!(validate_orders(&[order("o-3")], "orders").is_ok());
    }

    #[test]
    fn test_runtime_defaults_and_bounds() {
        let constants = Constants::default();
        assert_eq!(resolve_runtime(None, &constants).unwrap(), 300);
        assert_eq!(resolve_runtime(Some(20), &constants).unwrap(), 20);
        assert!(resolve_runtime(Some(0), &constants).is_err());
        assert!(resolve_runtime(Some(-3), &constants).is_err());
    }

    #[test]
    fn test_parse_plan_resolves_heading() {
        let ids = IdSpace::new(&depot(), &[order("o-1")], &[]);
        let rider = planned_rider(
            vec![vec![stop("warehouse", 0), stop("o-1", 600), stop("warehouse", 700)]],
            Some("o-1"),
        );

        let (plan, location) = parse_submitted_plan(&[rider], &ids).unwrap();

        assert_eq!(plan.tours[0][0], vec![0, 1, 0]);
        assert_eq!(plan.timings[0][0], vec![32_400, 33_000, 33_700]);
        assert_eq!(location, vec![1]);
    }

    #[test]
    fn test_parse_plan_depot_heading_means_not_departed() {
        let ids = IdSpace::new(&depot(), &[order("o-1")], &[]);
        let rider = planned_rider(
            vec![vec![stop("warehouse", 0), stop("o-1", 600), stop("warehouse", 700)]],
            Some("warehouse"),
        );

        let (_, location) = parse_submitted_plan(&[rider], &ids).unwrap();
        assert_eq!(location, vec![0]);
    }

    #[test]
    fn test_parse_plan_idle_rider() {
        let ids = IdSpace::new(&depot(), &[order("o-1")], &[]);
        let rider = planned_rider(vec![], None);

        let (plan, location) = parse_submitted_plan(&[rider], &ids).unwrap();
        assert!(plan.tours[0].is_empty());
        assert_eq!(location, vec![-1]);
    }

    #[test]
    fn test_parse_plan_requires_heading_for_running_tour() {
        let ids = IdSpace::new(&depot(), &[order("o-1")], &[]);
        let rider = planned_rider(
            vec![vec![stop("warehouse", 0), stop("o-1", 600), stop("warehouse", 700)]],
            None,
        );

        assert!(parse_submitted_plan(&[rider], &ids).is_err());
    }

    #[test]
    fn test_parse_plan_rejects_unknown_ids() {
        let ids = IdSpace::new(&depot(), &[order("o-1")], &[]);
        let rider = planned_rider(vec![vec![stop("ghost", 0)]], Some("ghost"));
        assert!(parse_submitted_plan(&[rider], &ids).is_err());
    }
}
