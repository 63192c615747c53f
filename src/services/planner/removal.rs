//! Pickup removal engine
//!
//! Cancels a pickup that no rider has reached yet. When the pickup sits on a
//! running trip the stop is spliced out and every later clock of that rider
//! moves earlier by the saved transit. When it only exists in future trips,
//! the future work is re-planned without it. A pickup that is unknown,
//! already visited, or the very stop being driven to leaves the plan alone.

use tracing::debug;

use super::insertion::TourLocation;
use super::multi_trip::plan_trips;
use super::problem::ProblemInstance;
use super::PlanState;
use crate::config::Constants;

/// Remove `pickup` (an instance node index) from the plan. Returns the
/// edited plan and the rider whose running trip changed, if any.
pub fn delete_pickup(
    plan: &PlanState,
    instance: &ProblemInstance,
    tour_location: &[TourLocation],
    pickup: usize,
    cur_time: i64,
    runtime: i64,
    constants: &Constants,
) -> (PlanState, Option<usize>) {
    let num_vehicles = plan.num_riders();
    let mut plan = plan.clone();
    plan.ensure_current_trip();

    // a stop at or before tour_location is already history
    for v in 0..num_vehicles {
        let trip = &plan.tours[v][0];
        let scan_from = ((tour_location[v] + 1).max(0) as usize).min(trip.len());
        let Some(offset) = trip[scan_from..].iter().position(|&loc| loc == pickup) else {
            continue;
        };
        let idx = scan_from + offset;

        let prev = trip[idx - 1];
        let next = trip[idx + 1];
        let saved = instance.time_matrix[prev][pickup]
            + instance.time_matrix[pickup][next]
            + instance.service_time[pickup]
            - instance.time_matrix[prev][next];

        debug!(rider = v, position = idx, saved, "splicing pickup out of running trip");

        plan.tours[v][0].remove(idx);
        plan.timings[v][0].remove(idx);
        for j in idx..plan.timings[v][0].len() {
            plan.timings[v][0][j] -= saved;
        }
        // the rider's later trips all shift earlier with it
        for trip_no in 1..plan.timings[v].len() {
            for clock in plan.timings[v][trip_no].iter_mut() {
                *clock -= saved;
            }
        }

        strip_empty_trips(&mut plan);
        return (plan, Some(v));
    }

    let in_future = plan
        .tours
        .iter()
        .any(|trips| trips.iter().skip(1).flatten().any(|&loc| loc == pickup));
    if !in_future {
        debug!("pickup not ahead of any rider, returning plan unchanged");
        strip_empty_trips(&mut plan);
        return (plan, None);
    }

    // rebuild the future from everything still owed except the pickup;
    // running trips are kept word-for-word
    let mut points = vec![0usize];
    for trips in &plan.tours {
        for trip in trips.iter().skip(1) {
            points.extend(trip.iter().copied().filter(|&loc| loc != 0 && loc != pickup));
        }
    }

    let start_time: Vec<i64> = (0..num_vehicles)
        .map(|v| {
            plan.timings[v][0]
                .last()
                .map(|&t| t + constants.wait_time_at_warehouse)
                .unwrap_or(cur_time)
        })
        .collect();

    let upcoming_instance =
        instance.restrict(&points, &(0..num_vehicles).collect::<Vec<_>>(), start_time);
    let upcoming_penalty = vec![constants.miss_penalty; points.len()];
    let upcoming = plan_trips(&upcoming_instance, upcoming_penalty, runtime, constants);

    let mut result = PlanState::with_riders(num_vehicles);
    for v in 0..num_vehicles {
        if !plan.tours[v][0].is_empty() {
            result.tours[v].push(plan.tours[v][0].clone());
            result.timings[v].push(plan.timings[v][0].clone());
        }
        for (trip, times) in upcoming.tours[v].iter().zip(&upcoming.timings[v]) {
            result.tours[v].push(trip.iter().map(|&loc| points[loc]).collect());
            result.timings[v].push(times.clone());
        }
    }

    (result, None)
}

/// Drop the empty placeholder trips [`PlanState::ensure_current_trip`] adds
/// for idle riders so responses mirror what was submitted.
fn strip_empty_trips(plan: &mut PlanState) {
    for v in 0..plan.tours.len() {
        let mut tours = Vec::with_capacity(plan.tours[v].len());
        let mut timings = Vec::with_capacity(plan.timings[v].len());
        for (trip, times) in plan.tours[v].iter().zip(&plan.timings[v]) {
            if !trip.is_empty() {
                tours.push(trip.clone());
                timings.push(times.clone());
            }
        }
        plan.tours[v] = tours;
        plan.timings[v] = timings;
    }
}
