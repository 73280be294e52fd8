#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-bounded search for non-conflicting collection routes.
//!
//! Agents are planned one after another in a random order. Each agent takes
//! the best route it can find, clears the pellets along it, and blocks its
//! first step so that teammates later in the order route around it. Orders
//! are sampled until the turn budget runs out and the most valuable plan wins.

use std::time::{Duration, Instant};

use pellet_rush_core::{traverse, AgentKey, GridBounds, PlannerParams, Position};
use pellet_rush_system_occupancy::OccupantMap;
use pellet_rush_system_payoff::{PayoffMap, Route, ValueMap};
use pellet_rush_world::{navigation::PathMap, query, AgentBelief};
use rand::{seq::SliceRandom, Rng};
use tracing::debug;

/// Wall-clock allowance for one planning call.
#[derive(Clone, Copy, Debug)]
pub struct SearchBudget {
    started: Instant,
    limit: Duration,
    max_iterations: Option<usize>,
}

impl SearchBudget {
    /// Budget of `limit` measured from `started`.
    #[must_use]
    pub const fn new(started: Instant, limit: Duration) -> Self {
        Self {
            started,
            limit,
            max_iterations: None,
        }
    }

    /// Additionally caps the number of orderings evaluated.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Time spent since the budget started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Cancellable stream of random orderings.
///
/// The first ordering is always produced. Later ones are produced only while
/// the slowest iteration seen so far would still finish inside the budget.
/// A single item has exactly one ordering.
#[derive(Debug)]
pub struct Permutations<'r, T, R> {
    items: Vec<T>,
    rng: &'r mut R,
    budget: SearchBudget,
    yielded: usize,
    last_yield: Option<Instant>,
    slowest: Duration,
}

impl<'r, T, R> Permutations<'r, T, R>
where
    T: Clone,
    R: Rng,
{
    /// Samples orderings of `items` until `budget` is spent.
    pub fn new(items: Vec<T>, budget: SearchBudget, rng: &'r mut R) -> Self {
        Self {
            items,
            rng,
            budget,
            yielded: 0,
            last_yield: None,
            slowest: Duration::ZERO,
        }
    }

    fn exhausted(&self) -> bool {
        if self.yielded == 0 {
            return false;
        }
        if self.items.len() <= 1 {
            return true;
        }
        if self
            .budget
            .max_iterations
            .is_some_and(|max_iterations| self.yielded >= max_iterations)
        {
            return true;
        }
        self.budget.elapsed().saturating_add(self.slowest) > self.budget.limit
    }
}

impl<T, R> Iterator for Permutations<'_, T, R>
where
    T: Clone,
    R: Rng,
{
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let now = Instant::now();
        if let Some(last_yield) = self.last_yield {
            self.slowest = self.slowest.max(now.duration_since(last_yield));
        }
        if self.exhausted() {
            return None;
        }

        self.items.shuffle(&mut *self.rng);
        self.yielded += 1;
        self.last_yield = Some(now);
        Some(self.items.clone())
    }
}

/// Move assigned to one agent.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedMove {
    /// Agent receiving the move.
    pub agent: AgentKey,
    /// Furthest cell the agent can head toward in a straight line.
    pub target: Position,
    /// Full route the move starts.
    pub route: Route,
}

/// Best assignment found within the budget.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectPlan {
    /// Moves ordered by agent.
    pub moves: Vec<PlannedMove>,
    /// Sum of the payoffs of every route.
    pub total_payoff: f64,
    /// Number of orderings evaluated.
    pub iterations: usize,
}

/// Planner that assigns collection routes to own agents.
#[derive(Clone, Debug)]
pub struct CollectPlanner<'a> {
    occupancy: OccupantMap<'a>,
    values: ValueMap,
    params: PlannerParams,
}

impl<'a> CollectPlanner<'a> {
    /// Prepares a planner over the provided occupancy and its beliefs.
    #[must_use]
    pub fn new(occupancy: OccupantMap<'a>, params: &PlannerParams) -> Self {
        let values = ValueMap::from_beliefs(occupancy.beliefs());
        Self {
            occupancy,
            values,
            params: params.clone(),
        }
    }

    /// Samples agent orderings within `budget` and returns the best plan.
    pub fn choose<R: Rng>(
        &self,
        agents: &[&AgentBelief],
        budget: SearchBudget,
        rng: &mut R,
    ) -> CollectPlan {
        if agents.is_empty() {
            return CollectPlan::default();
        }

        let mut best: Option<CollectPlan> = None;
        let mut iterations = 0;
        for order in Permutations::new(agents.to_vec(), budget, rng) {
            iterations += 1;
            let plan = self.evaluate(&order);
            if best
                .as_ref()
                .map_or(true, |best| plan.total_payoff > best.total_payoff)
            {
                best = Some(plan);
            }
        }

        let mut plan = best.unwrap_or_default();
        plan.iterations = iterations;
        debug!(
            iterations,
            total_payoff = plan.total_payoff,
            moves = plan.moves.len(),
            elapsed_us = budget.elapsed().as_micros(),
            "collect plan chosen"
        );
        plan
    }

    fn evaluate(&self, order: &[&AgentBelief]) -> CollectPlan {
        let mut occupancy = self.occupancy.clone();
        let mut values = self.values.clone();
        let bounds = query::bounds(occupancy.beliefs());
        let mut plan = CollectPlan::default();

        for agent in order {
            let path_map = occupancy.pathfind(agent);
            let route = self.grow_route(&path_map, &values);
            if route.is_empty() {
                continue;
            }

            values.clear(route.path());
            if let Some(&step) = route.path().first() {
                occupancy.block(step, agent);
            }

            let Some(target) = straight_run_target(agent.position(), route.first_leg(), bounds)
            else {
                continue;
            };
            plan.total_payoff += route.payoff();
            plan.moves.push(PlannedMove {
                agent: agent.key(),
                target,
                route,
            });
        }

        plan.moves.sort_by_key(|planned| planned.agent);
        plan
    }

    fn grow_route(&self, path_map: &PathMap, shared: &ValueMap) -> Route {
        let mut values = shared.clone();
        let mut route = Route::empty(path_map.source());
        let mut horizon = self.params.first_target_horizon;

        for _ in 0..self.params.max_route_targets {
            let payoffs =
                PayoffMap::generate(path_map, &values, horizon, self.params.discount_rate);
            let Some(next) = payoffs.choose_best_or_none(&route) else {
                break;
            };
            values.clear(next.path());
            route = next;
            horizon = self.params.extension_horizon;
        }
        route
    }
}

/// Furthest cell of the straight run that opens `leg`.
///
/// Heading for the end of a straight corridor rather than the next cell lets
/// the contest's own pathing carry a sped-up agent two cells per turn.
#[must_use]
pub fn straight_run_target(
    origin: Position,
    leg: &[Position],
    bounds: GridBounds,
) -> Option<Position> {
    let (&first, rest) = leg.split_first()?;
    let Some(heading) = traverse::direction_between(origin, first, bounds) else {
        return Some(first);
    };

    let mut target = first;
    for &cell in rest {
        if traverse::direction_between(target, cell, bounds) != Some(heading) {
            break;
        }
        target = cell;
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn roomy_budget() -> SearchBudget {
        SearchBudget::new(Instant::now(), Duration::from_secs(30))
    }

    #[test]
    fn straight_run_stops_at_the_first_turn() {
        let bounds = GridBounds::new(9, 9);
        let leg = [
            Position::new(2, 1),
            Position::new(3, 1),
            Position::new(4, 1),
            Position::new(4, 2),
        ];
        assert_eq!(
            straight_run_target(Position::new(1, 1), &leg, bounds),
            Some(Position::new(4, 1))
        );
    }

    #[test]
    fn straight_run_follows_wrap_around() {
        let bounds = GridBounds::new(5, 3);
        let leg = [Position::new(4, 1), Position::new(3, 1)];
        assert_eq!(
            straight_run_target(Position::new(0, 1), &leg, bounds),
            Some(Position::new(3, 1))
        );
    }

    #[test]
    fn straight_run_of_empty_leg_is_none() {
        let bounds = GridBounds::new(5, 3);
        assert_eq!(straight_run_target(Position::new(0, 1), &[], bounds), None);
    }

    #[test]
    fn single_item_yields_exactly_one_ordering() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let orderings: Vec<_> = Permutations::new(vec![7], roomy_budget(), &mut rng).collect();
        assert_eq!(orderings, vec![vec![7]]);
    }

    #[test]
    fn spent_budget_still_yields_one_ordering() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let budget = SearchBudget::new(Instant::now(), Duration::ZERO);
        let orderings: Vec<_> = Permutations::new(vec![1, 2, 3], budget, &mut rng).collect();
        assert_eq!(orderings.len(), 1);
    }

    #[test]
    fn iteration_cap_is_respected_and_orderings_are_permutations() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let budget = roomy_budget().with_max_iterations(5);
        let orderings: Vec<_> = Permutations::new(vec![1, 2, 3, 4], budget, &mut rng).collect();

        assert_eq!(orderings.len(), 5);
        for mut ordering in orderings {
            ordering.sort_unstable();
            assert_eq!(ordering, vec![1, 2, 3, 4]);
        }
    }
}
