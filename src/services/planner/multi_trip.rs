//! Multi-trip driver
//!
//! Plans a whole day by peeling one trip layer at a time: solve a round over
//! the residual instance, keep every non-empty trip, push each rider's next
//! availability past the depot turnaround, then shrink the instance to the
//! depot plus whatever still carries a drop penalty. Terminates when a round
//! makes no progress or nothing is left owed.

use std::time::Duration;

use tracing::debug;

use super::problem::ProblemInstance;
use super::solver::{SolveOptions, TripSolver, VehicleSpec};
use super::PlanState;
use crate::config::Constants;

/// Plan all remaining trips for the fleet. `drop_penalty` weighs the first
/// round; later rounds re-weigh the residual with the flat miss penalty.
/// `runtime` seconds are split evenly across the estimated trip count.
pub fn plan_trips(
    instance: &ProblemInstance,
    drop_penalty: Vec<i64>,
    runtime: i64,
    constants: &Constants,
) -> PlanState {
    let num_vehicles = instance.num_vehicles();
    let mut plan = PlanState::with_riders(num_vehicles);

    if instance.num_locations() <= 1 {
        return plan;
    }

    let round_budget = Duration::from_secs(round_budget_secs(instance, runtime) as u64);

    let mut current = instance.clone();
    let mut penalty = drop_penalty;
    // maps residual indices back to the caller's instance space
    let mut points_to_map: Vec<usize> = (0..instance.num_locations()).collect();

    loop {
        let vehicles: Vec<VehicleSpec> = (0..num_vehicles)
            .map(|v| {
                let start_time = current.start_time[v];
                VehicleSpec {
                    start: 0,
                    end: 0,
                    capacity: current.capacity[v],
                    depart_at: start_time,
                    deadline: constants.global_end_time.min(start_time + constants.max_trip_time),
                    initial_free: None,
                }
            })
            .collect();

        let solver =
            TripSolver::new(&current, &penalty, vehicles, constants.late_delivery_penalty_per_sec);
        let assignment =
            solver.solve(&SolveOptions { budget: round_budget, ..Default::default() });

        if assignment.is_empty() {
            debug!("round produced no assignment, stopping");
            break;
        }

        let mut produced = false;
        for v in 0..num_vehicles {
            if assignment.routes[v].len() > 2 {
                produced = true;
                plan.tours[v]
                    .push(assignment.routes[v].iter().map(|&loc| points_to_map[loc]).collect());
                plan.timings[v].push(assignment.timings[v].clone());
            }
        }

        let next_start: Vec<i64> = assignment
            .return_time
            .iter()
            .map(|&t| (t + constants.wait_time_at_warehouse).min(constants.global_end_time))
            .collect();

        // residual: the depot plus everything still owed
        let mut points_to_take = vec![0usize];
        let mut next_map = vec![points_to_map[0]];
        for &loc in &assignment.dropped {
            if penalty[loc] > 0 {
                points_to_take.push(loc);
                next_map.push(points_to_map[loc]);
            }
        }

        debug!(
            residual = points_to_take.len() - 1,
            produced, "round complete"
        );

        if !produced || points_to_take.len() <= 1 {
            break;
        }

        penalty = vec![constants.miss_penalty; points_to_take.len()];
        current = current.restrict(
            &points_to_take,
            &(0..num_vehicles).collect::<Vec<_>>(),
            next_start,
        );
        points_to_map = next_map;
    }

    plan
}

/// Budget per round: the total runtime split across the estimated number of
/// trips, `K = max(1, ceil(total demand / fleet capacity))`.
fn round_budget_secs(instance: &ProblemInstance, runtime: i64) -> i64 {
    let demand: i64 = instance.package_volume.iter().map(|&v| v.max(0)).sum();
    let fleet: i64 = instance.capacity.iter().sum();
    let trips = if fleet > 0 { (demand + fleet - 1) / fleet } else { 1 }.max(1);
    ((runtime + trips - 1) / trips).max(1)
}
