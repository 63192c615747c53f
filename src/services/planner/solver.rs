//! Single-trip constrained VRP solver
//!
//! Models one trip per vehicle under four constraints: a signed free-space
//! accumulator bounded by [0, capacity], a no-wait clock fixed at the start
//! node and capped per vehicle, a soft per-second lateness charge past each
//! order's expected time, and per-node drop penalties. An optional stop-count
//! cap bounds how many stops one vehicle may take on.
//!
//! The search is cheapest-insertion construction followed by local search
//! (relocate, 2-opt, Or-opt segment moves, reinsertion of dropped nodes) and
//! a seeded eject-and-reinsert loop while the wall-clock budget lasts. The
//! best assignment found so far is returned on expiry.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::problem::ProblemInstance;

/// One vehicle's boundary conditions for a trip solve.
#[derive(Debug, Clone)]
pub struct VehicleSpec {
    /// Node the route must begin at; its clock is fixed to `depart_at`
    pub start: usize,
    /// Node the route must finish at (the depot in every flow)
    pub end: usize,
    pub capacity: i64,
    /// Clock at the start node
    pub depart_at: i64,
    /// Hard ceiling on every stop clock: min(global end, trip start + max trip)
    pub deadline: i64,
    /// Free space when leaving for the start node; `None` lets the solver
    /// pick any feasible loading (fresh trips from the depot)
    pub initial_free: Option<i64>,
}

/// Knobs for one solve. A closed record: everything the flows may tune is a
/// named field here.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Cap on non-end stops per route (pickup insertion fairness bound)
    pub route_length: Option<i64>,
    /// Already-committed stops of vehicle 0, as instance node indices in
    /// visit order; seeds the search
    pub seed_route: Option<Vec<usize>>,
    /// Wall-clock budget for the whole solve
    pub budget: Duration,
    /// Seed for the eject-and-reinsert loop
    pub rng_seed: u64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            route_length: None,
            seed_route: None,
            budget: Duration::from_secs(5),
            rng_seed: 0x1ade,
        }
    }
}

/// Solver output. `routes[v]` runs from the start node to the end node;
/// `timings[v]` carries the matching absolute clocks. Nodes the solver chose
/// to leave unserved are listed in `dropped`. When not even the bare
/// start-to-end hop is feasible, every route is empty and every droppable
/// node is dropped.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub routes: Vec<Vec<usize>>,
    pub timings: Vec<Vec<i64>>,
    pub dropped: Vec<usize>,
    pub return_time: Vec<i64>,
}

impl Assignment {
    pub fn is_empty(&self) -> bool {
        self.routes.iter().all(|r| r.is_empty())
    }
}

#[derive(Debug, Clone)]
struct RouteEval {
    times: Vec<i64>,
    cost: i64,
}

pub struct TripSolver<'a> {
    instance: &'a ProblemInstance,
    penalty: &'a [i64],
    vehicles: Vec<VehicleSpec>,
    late_penalty_per_sec: i64,
}

impl<'a> TripSolver<'a> {
    pub fn new(
        instance: &'a ProblemInstance,
        penalty: &'a [i64],
        vehicles: Vec<VehicleSpec>,
        late_penalty_per_sec: i64,
    ) -> Self {
        Self { instance, penalty, vehicles, late_penalty_per_sec }
    }

    pub fn solve(&self, options: &SolveOptions) -> Assignment {
        let deadline = Instant::now() + options.budget;

        let mut routes: Vec<Vec<usize>> = self
            .vehicles
            .iter()
            .map(|v| vec![v.start, v.end])
            .collect();

        // Bare start-to-end infeasibility means the clock has already run
        // out for this vehicle; the caller handles the all-dropped signal.
        if routes
            .iter()
            .enumerate()
            .any(|(v, route)| self.evaluate(v, route, options.route_length).is_none())
        {
            debug!("no feasible base route, dropping all nodes");
            return self.empty_assignment();
        }

        let mut pending = self.droppable_nodes();

        if let Some(seed) = &options.seed_route {
            let mut seeded = Vec::with_capacity(seed.len() + 2);
            seeded.push(self.vehicles[0].start);
            seeded.extend_from_slice(seed);
            seeded.push(self.vehicles[0].end);
            if self.evaluate(0, &seeded, options.route_length).is_some() {
                for node in seed {
                    pending.remove(node);
                }
                routes[0] = seeded;
            }
        }

        let mut evals: Vec<RouteEval> = routes
            .iter()
            .enumerate()
            .map(|(v, route)| {
                self.evaluate(v, route, options.route_length)
                    .expect("base routes checked feasible")
            })
            .collect();

        self.construct(&mut routes, &mut evals, &mut pending, options, deadline);
        self.improve(&mut routes, &mut evals, &mut pending, options, deadline);
        self.perturb(&mut routes, &mut evals, &mut pending, options, deadline);

        let dropped: Vec<usize> = pending.into_iter().collect();
        let timings: Vec<Vec<i64>> = evals.iter().map(|e| e.times.clone()).collect();
        let return_time: Vec<i64> =
            timings.iter().map(|t| *t.last().expect("routes have an end stop")).collect();

        Assignment { routes, timings, dropped, return_time }
    }

    fn empty_assignment(&self) -> Assignment {
        let num = self.vehicles.len();
        Assignment {
            routes: vec![Vec::new(); num],
            timings: vec![Vec::new(); num],
            dropped: self.droppable_nodes().into_iter().collect(),
            return_time: self.vehicles.iter().map(|v| v.depart_at).collect(),
        }
    }

    /// Every node that is not a start or end of some vehicle may be dropped
    /// at its penalty.
    fn droppable_nodes(&self) -> BTreeSet<usize> {
        let mut reserved = BTreeSet::new();
        for vehicle in &self.vehicles {
            reserved.insert(vehicle.start);
            reserved.insert(vehicle.end);
        }
        (0..self.instance.num_locations()).filter(|n| !reserved.contains(n)).collect()
    }

    /// Checks all hard constraints and prices a route. `None` means
    /// infeasible. The cost is arc time (travel plus service of the departed
    /// stop) plus soft lateness at every non-end stop.
    fn evaluate(&self, v: usize, route: &[usize], route_length: Option<i64>) -> Option<RouteEval> {
        let vehicle = &self.vehicles[v];
        let matrix = &self.instance.time_matrix;

        if let Some(cap) = route_length {
            if route.len() as i64 - 1 > cap {
                return None;
            }
        }

        let mut times = Vec::with_capacity(route.len());
        let mut clock = vehicle.depart_at;
        if clock > vehicle.deadline {
            return None;
        }
        times.push(clock);
        for k in 1..route.len() {
            let (from, to) = (route[k - 1], route[k]);
            clock += matrix[from][to] + self.instance.service_time[from];
            if clock > vehicle.deadline {
                return None;
            }
            times.push(clock);
        }

        // Free space when leaving stop k is s + prefix(k); s is the value at
        // departure. Both bounds must hold at every stop for some (or the
        // fixed) s in [0, capacity].
        let mut prefix = 0i64;
        let mut min_prefix = 0i64;
        let mut max_prefix = 0i64;
        for k in 0..route.len().saturating_sub(1) {
            prefix += self.instance.package_volume[route[k]];
            min_prefix = min_prefix.min(prefix);
            max_prefix = max_prefix.max(prefix);
        }
        match vehicle.initial_free {
            Some(s) => {
                if s < 0 || s > vehicle.capacity || s + min_prefix < 0 || s + max_prefix > vehicle.capacity {
                    return None;
                }
            }
            None => {
                let lowest = (-min_prefix).max(0);
                let highest = (vehicle.capacity - max_prefix).min(vehicle.capacity);
                if lowest > highest {
                    return None;
                }
            }
        }

        let mut cost = 0i64;
        for k in 1..route.len() {
            cost += matrix[route[k - 1]][route[k]] + self.instance.service_time[route[k - 1]];
        }
        for (k, &node) in route.iter().enumerate() {
            if node != vehicle.end {
                let late = (times[k] - self.instance.delivery_time[node]).max(0);
                cost += late * self.late_penalty_per_sec;
            }
        }

        Some(RouteEval { times, cost })
    }

    /// Cheapest-insertion construction: repeatedly take the globally
    /// cheapest feasible insertion whose detour is still worth more than the
    /// node's drop penalty.
    fn construct(
        &self,
        routes: &mut [Vec<usize>],
        evals: &mut [RouteEval],
        pending: &mut BTreeSet<usize>,
        options: &SolveOptions,
        deadline: Instant,
    ) {
        loop {
            let mut best: Option<(i64, usize, usize, usize)> = None;
            for &node in pending.iter() {
                for v in 0..routes.len() {
                    for pos in 1..routes[v].len() {
                        let mut candidate = routes[v].clone();
                        candidate.insert(pos, node);
                        if let Some(eval) = self.evaluate(v, &candidate, options.route_length) {
                            let delta = eval.cost - evals[v].cost;
                            if delta < self.penalty[node]
                                && best.map_or(true, |(b, ..)| delta < b)
                            {
                                best = Some((delta, node, v, pos));
                            }
                        }
                    }
                }
            }

            let Some((_, node, v, pos)) = best else { break };
            routes[v].insert(pos, node);
            evals[v] = self
                .evaluate(v, &routes[v], options.route_length)
                .expect("accepted insertion is feasible");
            pending.remove(&node);

            if Instant::now() >= deadline {
                break;
            }
        }
    }

    /// Local search to a fixed point: best relocate, first-improvement
    /// 2-opt and Or-opt, then reinsertion attempts for dropped nodes.
    fn improve(
        &self,
        routes: &mut [Vec<usize>],
        evals: &mut [RouteEval],
        pending: &mut BTreeSet<usize>,
        options: &SolveOptions,
        deadline: Instant,
    ) {
        let mut improved = true;
        while improved && Instant::now() < deadline {
            improved = false;
            improved |= self.relocate_pass(routes, evals, options);
            improved |= self.two_opt_pass(routes, evals, options);
            improved |= self.or_opt_pass(routes, evals, options);
            improved |= self.reinsert_pass(routes, evals, pending, options);
        }
    }

    /// Move one node to its best other position, within or across routes.
    fn relocate_pass(
        &self,
        routes: &mut [Vec<usize>],
        evals: &mut [RouteEval],
        options: &SolveOptions,
    ) -> bool {
        let mut best: Option<(i64, usize, usize, usize, usize)> = None;

        for from_v in 0..routes.len() {
            for idx in 1..routes[from_v].len().saturating_sub(1) {
                let node = routes[from_v][idx];
                let mut removed = routes[from_v].clone();
                removed.remove(idx);
                let Some(removed_eval) = self.evaluate(from_v, &removed, options.route_length)
                else {
                    continue;
                };

                for to_v in 0..routes.len() {
                    let base = if to_v == from_v { &removed } else { &routes[to_v] };
                    for pos in 1..base.len() {
                        let mut candidate = base.clone();
                        candidate.insert(pos, node);
                        let Some(eval) = self.evaluate(to_v, &candidate, options.route_length)
                        else {
                            continue;
                        };
                        let delta = if to_v == from_v {
                            eval.cost - evals[from_v].cost
                        } else {
                            (removed_eval.cost + eval.cost) - (evals[from_v].cost + evals[to_v].cost)
                        };
                        if delta < 0 && best.map_or(true, |(b, ..)| delta < b) {
                            best = Some((delta, from_v, idx, to_v, pos));
                        }
                    }
                }
            }
        }

        let Some((_, from_v, idx, to_v, pos)) = best else { return false };
        let node = routes[from_v].remove(idx);
        routes[to_v].insert(pos, node);
        for v in [from_v, to_v] {
            evals[v] = self
                .evaluate(v, &routes[v], options.route_length)
                .expect("accepted relocate is feasible");
        }
        true
    }

    /// Segment reversals inside each route.
    fn two_opt_pass(
        &self,
        routes: &mut [Vec<usize>],
        evals: &mut [RouteEval],
        options: &SolveOptions,
    ) -> bool {
        let mut any = false;
        for v in 0..routes.len() {
            let len = routes[v].len();
            if len < 4 {
                continue;
            }
            for i in 1..len - 2 {
                for j in i + 1..len - 1 {
                    let mut candidate = routes[v].clone();
                    candidate[i..=j].reverse();
                    if let Some(eval) = self.evaluate(v, &candidate, options.route_length) {
                        if eval.cost < evals[v].cost {
                            routes[v] = candidate;
                            evals[v] = eval;
                            any = true;
                        }
                    }
                }
            }
        }
        any
    }

    /// Move short segments (2-3 stops) to another position in their route.
    fn or_opt_pass(
        &self,
        routes: &mut [Vec<usize>],
        evals: &mut [RouteEval],
        options: &SolveOptions,
    ) -> bool {
        let mut any = false;
        for v in 0..routes.len() {
            for seg_len in 2..=3usize {
                let len = routes[v].len();
                if len < seg_len + 3 {
                    continue;
                }
                'segments: for start in 1..len - seg_len {
                    let mut removed = routes[v].clone();
                    let segment: Vec<usize> =
                        removed.splice(start..start + seg_len, std::iter::empty()).collect();
                    // positions are in the reduced route; `start` is a no-op
                    for pos in 1..removed.len() {
                        if pos == start {
                            continue;
                        }
                        let mut candidate = removed.clone();
                        candidate.splice(pos..pos, segment.iter().copied());
                        if let Some(eval) = self.evaluate(v, &candidate, options.route_length) {
                            if eval.cost < evals[v].cost {
                                routes[v] = candidate;
                                evals[v] = eval;
                                any = true;
                                continue 'segments;
                            }
                        }
                    }
                }
            }
        }
        any
    }

    /// Give dropped nodes another chance once routes have been reshaped.
    fn reinsert_pass(
        &self,
        routes: &mut [Vec<usize>],
        evals: &mut [RouteEval],
        pending: &mut BTreeSet<usize>,
        options: &SolveOptions,
    ) -> bool {
        let mut best: Option<(i64, usize, usize, usize)> = None;
        for &node in pending.iter() {
            for v in 0..routes.len() {
                for pos in 1..routes[v].len() {
                    let mut candidate = routes[v].clone();
                    candidate.insert(pos, node);
                    if let Some(eval) = self.evaluate(v, &candidate, options.route_length) {
                        let delta = eval.cost - evals[v].cost;
                        if delta < self.penalty[node] && best.map_or(true, |(b, ..)| delta < b) {
                            best = Some((delta, node, v, pos));
                        }
                    }
                }
            }
        }
        let Some((_, node, v, pos)) = best else { return false };
        routes[v].insert(pos, node);
        evals[v] = self
            .evaluate(v, &routes[v], options.route_length)
            .expect("accepted reinsertion is feasible");
        pending.remove(&node);
        true
    }

    /// Eject-and-reinsert: kick one or two random stops out, rebuild, keep
    /// the result only when the full objective (including drop penalties)
    /// improves. Runs while the budget lasts, bailing out once the search
    /// goes stale.
    fn perturb(
        &self,
        routes: &mut Vec<Vec<usize>>,
        evals: &mut Vec<RouteEval>,
        pending: &mut BTreeSet<usize>,
        options: &SolveOptions,
        deadline: Instant,
    ) {
        const MAX_STALE_ROUNDS: u32 = 24;

        let mut rng = StdRng::seed_from_u64(options.rng_seed);
        let mut stale = 0u32;

        while stale < MAX_STALE_ROUNDS && Instant::now() < deadline {
            let mut positions: Vec<(usize, usize)> = Vec::new();
            for (v, route) in routes.iter().enumerate() {
                for idx in 1..route.len().saturating_sub(1) {
                    positions.push((v, idx));
                }
            }
            if positions.is_empty() {
                break;
            }

            let snapshot_routes = routes.clone();
            let snapshot_evals = evals.clone();
            let snapshot_pending = pending.clone();
            let before = self.objective(evals, pending);

            positions.shuffle(&mut rng);
            let eject = 1 + rng.gen_range(0..2usize).min(positions.len() - 1);
            let mut chosen: Vec<(usize, usize)> = positions.into_iter().take(eject).collect();
            // remove higher indices first so lower ones stay valid
            chosen.sort_by(|a, b| b.cmp(a));
            let mut feasible = true;
            for (v, idx) in chosen {
                let node = routes[v].remove(idx);
                pending.insert(node);
                // a non-metric matrix can make even a removal infeasible
                match self.evaluate(v, &routes[v], options.route_length) {
                    Some(eval) => evals[v] = eval,
                    None => {
                        feasible = false;
                        break;
                    }
                }
            }
            if !feasible {
                *routes = snapshot_routes;
                *evals = snapshot_evals;
                *pending = snapshot_pending;
                stale += 1;
                continue;
            }

            self.construct(routes, evals, pending, options, deadline);
            self.improve(routes, evals, pending, options, deadline);

            if self.objective(evals, pending) >= before {
                *routes = snapshot_routes;
                *evals = snapshot_evals;
                *pending = snapshot_pending;
                stale += 1;
            } else {
                stale = 0;
            }
        }
    }

    fn objective(&self, evals: &[RouteEval], pending: &BTreeSet<usize>) -> i64 {
        let route_cost: i64 = evals.iter().map(|e| e.cost).sum();
        let drop_cost: i64 = pending.iter().map(|&n| self.penalty[n]).sum();
        route_cost + drop_cost
    }
}
