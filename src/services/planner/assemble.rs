//! Result assembly
//!
//! Projects engine output (instance node indices, absolute clocks) onto the
//! wire shape (order ids, per-stop offsets) and back. Offsets are measured
//! from the previous stop across trip boundaries; the very first stop of a
//! rider's plan is offset from the rider's start time, which makes the two
//! directions exact inverses of each other.

use std::collections::HashMap;

use anyhow::{bail, Result};

use super::PlanState;
use crate::types::{DepotSpec, Order, TourStop};

/// Node-index to id projection for one request. Index 0 is the depot;
/// orders follow in wire order, then any freshly added ones.
#[derive(Debug, Clone)]
pub struct IdSpace {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl IdSpace {
    pub fn new(depot: &DepotSpec, orders: &[Order], new_orders: &[Order]) -> Self {
        let mut ids = Vec::with_capacity(1 + orders.len() + new_orders.len());
        ids.push(depot.id.clone());
        ids.extend(orders.iter().map(|o| o.id.clone()));
        ids.extend(new_orders.iter().map(|o| o.id.clone()));
        let index = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Self { ids, index }
    }

    pub fn id_of(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn node_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn num_nodes(&self) -> usize {
        self.ids.len()
    }
}

/// Render one rider's trips as wire tours with relative timings.
pub fn tours_to_api(
    tours: &[Vec<usize>],
    timings: &[Vec<i64>],
    ids: &IdSpace,
    rider_start_time: i64,
) -> Vec<Vec<TourStop>> {
    let mut previous = rider_start_time;
    tours
        .iter()
        .zip(timings)
        .map(|(trip, clocks)| {
            trip.iter()
                .zip(clocks)
                .map(|(&node, &clock)| {
                    let stop = TourStop {
                        order_id: ids.id_of(node).to_string(),
                        timing: clock - previous,
                    };
                    previous = clock;
                    stop
                })
                .collect()
        })
        .collect()
}

/// Reconstruct one rider's trips from submitted wire tours: node indices and
/// absolute clocks. Fails on ids outside the catalogue.
pub fn tours_from_api(
    tours: &[Vec<TourStop>],
    ids: &IdSpace,
    rider_start_time: i64,
) -> Result<(Vec<Vec<usize>>, Vec<Vec<i64>>)> {
    let mut nodes = Vec::with_capacity(tours.len());
    let mut clocks = Vec::with_capacity(tours.len());
    let mut previous = rider_start_time;
    for trip in tours {
        let mut trip_nodes = Vec::with_capacity(trip.len());
        let mut trip_clocks = Vec::with_capacity(trip.len());
        for stop in trip {
            let Some(node) = ids.node_of(&stop.order_id) else {
                bail!("unknown order id {:?} in submitted tours", stop.order_id);
            };
            previous += stop.timing;
            trip_nodes.push(node);
            trip_clocks.push(previous);
        }
        nodes.push(trip_nodes);
        clocks.push(trip_clocks);
    }
    Ok((nodes, clocks))
}

/// The current tour counts as updated when its stop-id sequence changed.
/// A rider with no current trip on either side is unchanged.
pub fn current_tour_changed(submitted: &PlanState, result: &PlanState, rider: usize) -> bool {
    let before = submitted.tours[rider].first().map(Vec::as_slice).unwrap_or(&[]);
    let after = result.tours[rider].first().map(Vec::as_slice).unwrap_or(&[]);
    before != after
}
