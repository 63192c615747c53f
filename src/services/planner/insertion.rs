//! Pickup insertion engine
//!
//! Splices freshly booked pickups into a plan already being driven. Riders
//! are visited in random order; each gets its remaining current trip
//! re-solved together with the outstanding pickups under a fairness cap on
//! how many it may absorb. Whatever no rider takes joins the future-trip
//! orders and the whole remainder is re-planned through the multi-trip
//! driver.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::multi_trip::plan_trips;
use super::problem::{restrict_penalty, ProblemInstance};
use super::solver::{SolveOptions, TripSolver, VehicleSpec};
use super::PlanState;
use crate::config::Constants;

/// Where each rider stands in its current trip: the index of the next
/// un-visited stop, or -1 when the rider is idle.
pub type TourLocation = i64;

/// Insert `pickup_points` (instance node indices) into `plan`. `penalty` is
/// the full aged vector over the instance; `runtime` budgets the future-trip
/// re-plan. The rider permutation draws from `rng`.
#[allow(clippy::too_many_arguments)]
pub fn add_pickups(
    plan: &PlanState,
    instance: &ProblemInstance,
    mut penalty: Vec<i64>,
    tour_location: &[TourLocation],
    mut pickup_points: Vec<usize>,
    cur_time: i64,
    runtime: i64,
    constants: &Constants,
    rng: &mut StdRng,
) -> PlanState {
    let num_vehicles = plan.num_riders();
    let mut plan = plan.clone();
    plan.ensure_current_trip();

    // A pickup is worth almost a day-0 delivery, but all of them together
    // must stay below the cost of bumping one.
    let cur_day_penalty =
        pickup_points.first().map(|&p| penalty[p]).unwrap_or(constants.miss_penalty);
    if !pickup_points.is_empty() {
        let insert_penalty = (cur_day_penalty - 1) / pickup_points.len() as i64;
        for &p in &pickup_points {
            penalty[p] = insert_penalty;
        }
    }

    // orders already parked in future trips; they get re-planned wholesale
    let mut further_points: Vec<usize> = Vec::new();
    for v in 0..num_vehicles {
        for trip in plan.tours[v].iter().skip(1) {
            further_points.extend(trip.iter().copied().filter(|&loc| loc != 0));
        }
        for &loc in &plan.tours[v][0] {
            if loc != 0 {
                penalty[loc] = cur_day_penalty;
            }
        }
    }

    let mut begin_next_journey_at: Vec<i64> = (0..num_vehicles)
        .map(|v| {
            if tour_location[v] == -1 {
                cur_time
            } else {
                plan.timings[v][0].last().copied().unwrap_or(cur_time)
                    + constants.wait_time_at_warehouse
            }
        })
        .collect();

    let mut rider_order: Vec<usize> = (0..num_vehicles).collect();
    rider_order.shuffle(rng);

    let mut current_tour: Vec<Vec<usize>> = (0..num_vehicles).map(|v| plan.tours[v][0].clone()).collect();
    let mut current_timings: Vec<Vec<i64>> =
        (0..num_vehicles).map(|v| plan.timings[v][0].clone()).collect();

    for (visited_riders, &v) in rider_order.iter().enumerate() {
        if pickup_points.is_empty() {
            break;
        }

        // remaining stops of the running trip become the sub-problem core
        let mut tour_idx: Vec<usize> = Vec::new();
        let mut seed: Vec<usize> = Vec::new();
        let mut cur_free = instance.capacity[v];
        let start_idx;
        let trip_start;
        let cur_clock;

        if tour_location[v] == -1 {
            start_idx = 0;
            trip_start = cur_time;
            cur_clock = cur_time;
        } else {
            let s = tour_location[v] as usize;
            let trip = &plan.tours[v][0];
            for i in s..trip.len() {
                let node = trip[i];
                if node != 0 {
                    tour_idx.push(node);
                    if i != s {
                        seed.push(tour_idx.len() - 1);
                    }
                    cur_free -= instance.package_volume[node].max(0);
                }
            }
            start_idx = s;
            trip_start = plan.timings[v][0][0];
            cur_clock = plan.timings[v][0][s];
        }

        tour_idx.push(0);
        let end_local = tour_idx.len() - 1;
        tour_idx.extend(pickup_points.iter().copied());

        // a rider committed to its next stop starts there; otherwise the
        // whole remaining trip re-plans from the depot
        let start_local = if start_idx == 0 { end_local } else { 0 };

        let remaining_riders = num_vehicles - visited_riders;
        let expected_share =
            (remaining_riders + pickup_points.len() - 1) / pickup_points.len();
        let route_length = (seed.len() + 1 + expected_share + 2) as i64;

        let sub_instance = instance.restrict(&tour_idx, &[v], vec![trip_start]);
        let sub_penalty = restrict_penalty(&penalty, &tour_idx);
        let vehicle = VehicleSpec {
            start: start_local,
            end: end_local,
            capacity: instance.capacity[v],
            depart_at: cur_clock,
            deadline: constants.global_end_time.min(trip_start + constants.max_trip_time),
            initial_free: Some(cur_free.max(0)),
        };

        let solver = TripSolver::new(
            &sub_instance,
            &sub_penalty,
            vec![vehicle],
            constants.late_delivery_penalty_per_sec,
        );
        let assignment = solver.solve(&SolveOptions {
            route_length: Some(route_length),
            seed_route: (!seed.is_empty()).then(|| seed.clone()),
            budget: Duration::from_secs(constants.trip_replan_time_limit as u64),
            ..Default::default()
        });

        if assignment.is_empty() {
            // clock has outrun this trip; leave the rider untouched and let
            // the remaining pickups roll to the other riders
            debug!(rider = v, "current trip not re-solvable, keeping as submitted");
            continue;
        }

        begin_next_journey_at[v] =
            assignment.return_time[0] + constants.wait_time_at_warehouse;

        // visited prefix stays word-for-word; the solve output follows it
        let mut new_trip: Vec<usize> = plan.tours[v][0][..start_idx].to_vec();
        let mut new_times: Vec<i64> = plan.timings[v][0][..start_idx].to_vec();
        for (k, &loc) in assignment.routes[0].iter().enumerate() {
            new_trip.push(tour_idx[loc]);
            new_times.push(assignment.timings[0][k]);
        }
        current_tour[v] = new_trip;
        current_timings[v] = new_times;

        let mut still_unassigned: Vec<usize> = Vec::new();
        for &loc in &assignment.dropped {
            let node = tour_idx[loc];
            if instance.package_volume[node] > 0 {
                // a delivery bumped off the running trip waits for a later one
                further_points.push(node);
            } else {
                still_unassigned.push(node);
            }
        }
        debug!(
            rider = v,
            inserted = pickup_points.len() - still_unassigned.len(),
            remaining = still_unassigned.len(),
            "rider pass complete"
        );
        pickup_points = still_unassigned;
    }

    // pickups nobody took ride along with the future orders at full weight
    for &p in &pickup_points {
        penalty[p] = cur_day_penalty;
        further_points.push(p);
    }

    let mut upcoming_points = vec![0usize];
    upcoming_points.extend(further_points.iter().copied());

    let upcoming_instance = instance.restrict(
        &upcoming_points,
        &(0..num_vehicles).collect::<Vec<_>>(),
        begin_next_journey_at,
    );
    let upcoming_penalty = vec![constants.miss_penalty; upcoming_points.len()];
    let upcoming = plan_trips(&upcoming_instance, upcoming_penalty, runtime, constants);

    // stitch: the rewritten current trip first, then the re-planned future
    let mut result = PlanState::with_riders(num_vehicles);
    for v in 0..num_vehicles {
        if !current_tour[v].is_empty() {
            result.tours[v].push(current_tour[v].clone());
            result.timings[v].push(current_timings[v].clone());
        }
        for (trip, times) in upcoming.tours[v].iter().zip(&upcoming.timings[v]) {
            result.tours[v].push(trip.iter().map(|&loc| upcoming_points[loc]).collect());
            result.timings[v].push(times.clone());
        }
    }

    result
}
