//! Numeric problem instance
//!
//! Normalises client input: point 0 is the depot, points 1..N are orders in
//! input order. Deliveries carry positive volume, pickups negative. The
//! depot has zero service time, zero volume and a zero due time.

use crate::config::Constants;
use crate::services::routing::DurationMatrix;
use crate::types::{Order, RiderMeta};

/// One routing problem over a fixed point set and rider fleet. Instances are
/// request-scoped values: each solve round derives a smaller instance with
/// [`ProblemInstance::restrict`] rather than mutating shared state.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    /// Travel seconds between points; non-negative, zero diagonal
    pub time_matrix: Vec<Vec<i64>>,
    /// Dwell seconds per point; zero at the depot
    pub service_time: Vec<i64>,
    /// Signed load change per point: +delivery, -pickup, zero at the depot
    pub package_volume: Vec<i64>,
    /// Expected completion clock per point
    pub delivery_time: Vec<i64>,
    /// Vehicle capacity per rider
    pub capacity: Vec<i64>,
    /// Clock each rider becomes available
    pub start_time: Vec<i64>,
}

impl ProblemInstance {
    pub fn num_locations(&self) -> usize {
        self.time_matrix.len()
    }

    pub fn num_vehicles(&self) -> usize {
        self.capacity.len()
    }

    /// Assemble the day's instance from request data. `orders` lists every
    /// catalogued order in wire order; the matrix covers depot + orders with
    /// matching indices.
    pub fn build(matrix: &DurationMatrix, riders: &[RiderMeta], orders: &[Order]) -> Self {
        let mut service_time = vec![0i64];
        let mut package_volume = vec![0i64];
        let mut delivery_time = vec![0i64];
        for order in orders {
            service_time.push(order.service_time);
            package_volume.push(order.signed_volume());
            delivery_time.push(order.expected_time);
        }

        let n = matrix.size;
        Self {
            time_matrix: (0..n)
                .map(|i| (0..n).map(|j| matrix.duration(i, j)).collect())
                .collect(),
            service_time,
            package_volume,
            delivery_time,
            capacity: riders.iter().map(|r| r.vehicle.capacity.round() as i64).collect(),
            start_time: riders.iter().map(|r| r.start_time).collect(),
        }
    }

    /// Project the instance onto `points` (instance indices, depot first) and
    /// the given rider subset, replacing their availability clocks. Produces
    /// a fresh instance; the source is left untouched.
    pub fn restrict(&self, points: &[usize], vehicles: &[usize], start_time: Vec<i64>) -> Self {
        let time_matrix = points
            .iter()
            .map(|&src| points.iter().map(|&dst| self.time_matrix[src][dst]).collect())
            .collect();

        Self {
            time_matrix,
            service_time: points.iter().map(|&p| self.service_time[p]).collect(),
            package_volume: points.iter().map(|&p| self.package_volume[p]).collect(),
            delivery_time: points.iter().map(|&p| self.delivery_time[p]).collect(),
            capacity: vehicles.iter().map(|&v| self.capacity[v]).collect(),
            start_time,
        }
    }
}

/// Per-point drop penalties for a fresh day. An order due `d` whole days out
/// weighs `miss_penalty / reducer^d`, floored at 1 so it can never silently
/// leave the residual. The depot keeps the full miss penalty.
pub fn aged_penalties(orders: &[Order], constants: &Constants) -> Vec<i64> {
    let mut penalty = vec![constants.miss_penalty];
    for order in orders {
        penalty.push(aged_penalty(order.expected_time, constants));
    }
    penalty
}

fn aged_penalty(expected_time: i64, constants: &Constants) -> i64 {
    let days_out = expected_time.max(0) / 86_400;
    let mut penalty = constants.miss_penalty;
    for _ in 0..days_out {
        penalty /= constants.miss_penalty_reducer;
        if penalty <= 1 {
            return 1;
        }
    }
    penalty.max(1)
}

/// Project a penalty vector onto a residual point set.
pub fn restrict_penalty(penalty: &[i64], points: &[usize]) -> Vec<i64> {
    points.iter().map(|&p| penalty[p]).collect()
}
