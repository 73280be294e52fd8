#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Turn-level decision making for the own team.
//!
//! The actor runs the systems in priority order: ready abilities are spent
//! on threats first, the remaining agents are routed toward pellets, and
//! whoever is left over waits.

use std::time::Instant;

use pellet_rush_core::{Action, Intent, PlannerParams};
use pellet_rush_system_collect::{CollectPlanner, SearchBudget};
use pellet_rush_system_occupancy::OccupantMap;
use pellet_rush_system_threat::{ThreatActor, ThreatModel};
use pellet_rush_world::{query, AgentBelief, Beliefs};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Decides one intent per controllable agent each turn.
#[derive(Clone, Debug)]
pub struct Actor {
    params: PlannerParams,
    rng: ChaCha8Rng,
}

impl Actor {
    /// Creates an actor whose sampling is seeded from `params.rng_seed`.
    #[must_use]
    pub fn new(params: PlannerParams) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(params.rng_seed);
        Self { params, rng }
    }

    /// Parameters the actor plans with.
    #[must_use]
    pub const fn params(&self) -> &PlannerParams {
        &self.params
    }

    /// Intents for every controllable agent, ordered by agent id.
    ///
    /// `started` marks when the turn's input arrived; the planning budget is
    /// measured from it.
    pub fn choose(&mut self, beliefs: &Beliefs, started: Instant) -> Vec<Intent> {
        let tick = query::tick(beliefs);
        let agents = query::controllable_agents(beliefs);

        let mut occupancy = OccupantMap::generate(beliefs, &self.params);
        occupancy.precompute(&agents);

        let model = ThreatModel::generate(beliefs, &self.params);
        let mut intents = ThreatActor::new(&self.params).choose(&model, &mut occupancy, &agents);

        let idle: Vec<&AgentBelief> = agents
            .iter()
            .copied()
            .filter(|agent| !intents.iter().any(|intent| intent.agent == agent.key().id()))
            .collect();

        let budget = SearchBudget::new(started, self.params.move_budget(tick));
        let plan =
            CollectPlanner::new(occupancy, &self.params).choose(&idle, budget, &mut self.rng);

        for agent in &idle {
            let intent = match plan.moves.iter().find(|planned| planned.agent == agent.key()) {
                Some(planned) => Intent::new(
                    agent.key().id(),
                    Action::Move {
                        target: planned.target,
                    },
                )
                .annotated(format!("{:.2}", planned.route.payoff())),
                None => Intent::new(agent.key().id(), Action::Wait),
            };
            intents.push(intent);
        }

        intents.sort_by_key(|intent| intent.agent);
        debug!(
            tick,
            intents = intents.len(),
            iterations = plan.iterations,
            total_payoff = plan.total_payoff,
            "turn decided"
        );
        intents
    }
}
