#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Discounted value propagation over path maps.
//!
//! A [`PayoffMap`] walks the shortest-path tree of one agent and accumulates
//! the discounted value of every cell along the way, so that the payoff of a
//! cell is what the agent collects by walking straight to it. Routes are grown
//! one round-trip detour at a time through [`PayoffMap::choose_best_or_none`].

use pellet_rush_core::{discount, GridBounds, Position};
use pellet_rush_world::{navigation::PathMap, query, Beliefs};

/// Snapshot of expected pellet values that planners consume and clear.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueMap {
    bounds: GridBounds,
    values: Vec<f64>,
}

impl ValueMap {
    /// Creates a snapshot where every cell is worth nothing.
    #[must_use]
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            bounds,
            values: vec![0.0; bounds.cell_count()],
        }
    }

    /// Captures the expected value of every cell from the beliefs.
    #[must_use]
    pub fn from_beliefs(beliefs: &Beliefs) -> Self {
        let bounds = query::bounds(beliefs);
        let values = (0..bounds.cell_count())
            .map(|index| {
                bounds
                    .position(index)
                    .map_or(0.0, |cell| query::expected_value(beliefs, cell))
            })
            .collect();
        Self { bounds, values }
    }

    /// Value of the cell. Cells outside the grid are worth nothing.
    #[must_use]
    pub fn value(&self, cell: Position) -> f64 {
        self.bounds
            .index(cell)
            .and_then(|index| self.values.get(index).copied())
            .unwrap_or(0.0)
    }

    /// Overrides the value of a single cell.
    pub fn set(&mut self, cell: Position, value: f64) {
        if let Some(slot) = self.bounds.index(cell).and_then(|index| self.values.get_mut(index)) {
            *slot = value;
        }
    }

    /// Zeroes every cell along the path, as if it had been walked.
    pub fn clear(&mut self, path: &[Position]) {
        for &cell in path {
            self.set(cell, 0.0);
        }
    }
}

/// Ordered walk made of round-trip detours from a fixed origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    origin: Position,
    path: Vec<Position>,
    targets: Vec<Position>,
    payoff: f64,
    length: u32,
}

impl Route {
    /// Route that stays at the origin and collects nothing.
    #[must_use]
    pub const fn empty(origin: Position) -> Self {
        Self {
            origin,
            path: Vec::new(),
            targets: Vec::new(),
            payoff: 0.0,
            length: 0,
        }
    }

    /// Cell the route starts from.
    #[must_use]
    pub const fn origin(&self) -> Position {
        self.origin
    }

    /// Cells walked in order, excluding the origin at the start.
    #[must_use]
    pub fn path(&self) -> &[Position] {
        &self.path
    }

    /// Targets visited in order.
    #[must_use]
    pub fn targets(&self) -> &[Position] {
        &self.targets
    }

    /// Total discounted value the route is expected to collect.
    #[must_use]
    pub const fn payoff(&self) -> f64 {
        self.payoff
    }

    /// Number of steps in the route.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Reports whether the route visits no target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Cells leading from the origin up to and including the first target.
    #[must_use]
    pub fn first_leg(&self) -> &[Position] {
        let Some(&first) = self.targets.first() else {
            return &[];
        };
        let end = self
            .path
            .iter()
            .position(|&cell| cell == first)
            .map_or(self.path.len(), |at| at + 1);
        &self.path[..end]
    }

    fn with_detour(&self, outbound: Vec<Position>, cost: u32, payoff: f64) -> Self {
        let Some(&target) = outbound.last() else {
            return self.clone();
        };

        let mut path = outbound;
        let mut length = cost;
        if !self.is_empty() {
            let back: Vec<Position> = path.iter().rev().skip(1).copied().collect();
            path.extend(back);
            path.push(self.origin);
            path.extend(self.path.iter().copied());
            length = cost.saturating_mul(2).saturating_add(self.length);
        }

        let mut targets = Vec::with_capacity(self.targets.len() + 1);
        targets.push(target);
        targets.extend(self.targets.iter().copied());

        Self {
            origin: self.origin,
            path,
            targets,
            payoff,
            length,
        }
    }
}

/// Accumulated discounted value of walking from a path map's source to each cell.
#[derive(Clone, Debug)]
pub struct PayoffMap<'m> {
    path_map: &'m PathMap,
    discount_rate: f64,
    payoffs: Vec<Option<f64>>,
    candidates: Vec<Position>,
}

impl<'m> PayoffMap<'m> {
    /// Propagates payoffs down the shortest-path tree, up to `horizon` steps.
    #[must_use]
    pub fn generate(
        path_map: &'m PathMap,
        values: &ValueMap,
        horizon: u32,
        discount_rate: f64,
    ) -> Self {
        let bounds = path_map.bounds();
        let source = path_map.source();
        let mut payoffs: Vec<Option<f64>> = vec![None; bounds.cell_count()];
        let mut candidates = Vec::new();

        for cell in path_map.forward().breadth_first() {
            let (Some(index), Some(cost)) = (bounds.index(cell), path_map.cost(cell)) else {
                continue;
            };
            if cost > horizon {
                continue;
            }
            if cell == source {
                payoffs[index] = Some(0.0);
                continue;
            }

            let inherited = path_map
                .predecessor(cell)
                .and_then(|previous| bounds.index(previous))
                .and_then(|previous| payoffs[previous])
                .unwrap_or(0.0);
            let payoff = inherited + discount(values.value(cell), discount_rate, cost);
            payoffs[index] = Some(payoff);

            if payoff > 0.0 {
                candidates.push(cell);
            }
        }

        Self {
            path_map,
            discount_rate,
            payoffs,
            candidates,
        }
    }

    /// Payoff of walking to the cell, if it lies within the horizon.
    #[must_use]
    pub fn payoff(&self, cell: Position) -> Option<f64> {
        let index = self.path_map.bounds().index(cell)?;
        self.payoffs.get(index).copied().flatten()
    }

    /// Cells worth walking to, in breadth-first order.
    #[must_use]
    pub fn candidates(&self) -> &[Position] {
        &self.candidates
    }

    /// Extends `previous` with the most profitable round-trip detour.
    ///
    /// A detour to a candidate is worth the candidate's payoff plus the
    /// previous route's payoff, delayed by the time spent going out and
    /// coming back. The best detour is accepted only if it beats the previous
    /// route outright; otherwise `None` is returned.
    #[must_use]
    pub fn choose_best_or_none(&self, previous: &Route) -> Option<Route> {
        let mut best: Option<(Position, u32, f64)> = None;
        for &target in &self.candidates {
            let (Some(cost), Some(payoff)) = (self.path_map.cost(target), self.payoff(target))
            else {
                continue;
            };

            let resumed = discount(
                previous.payoff(),
                self.discount_rate,
                cost.saturating_mul(2),
            );
            let total = payoff + resumed;
            if total <= previous.payoff() {
                continue;
            }
            if best.map_or(true, |(_, _, best_total)| total > best_total) {
                best = Some((target, cost, total));
            }
        }

        let (target, cost, total) = best?;
        Some(previous.with_detour(self.path_map.path_to(target), cost, total))
    }
}
