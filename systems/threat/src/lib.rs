#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Threat assessment and the defensive use of agent abilities.
//!
//! Recently seen enemies are projected forward at their best possible speed.
//! An own agent that an enemy could already reach switches to the form that
//! beats it; an agent with nothing nearby spends its ability on speed.

use pellet_rush_core::{traverse, Action, AgentKey, Form, Intent, PlannerParams, Position, Team};
use pellet_rush_system_occupancy::OccupantMap;
use pellet_rush_world::{navigation::PathMap, query, AgentBelief, Beliefs};
use tracing::debug;

/// Enemy that could reach an own agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Threat {
    /// Enemy posing the threat.
    pub enemy: AgentKey,
    /// Form the enemy was last seen in.
    pub enemy_form: Form,
    /// Ticks until the enemy could be on the agent, zero when it already can.
    pub arrival_ticks: u32,
}

/// Enemies recent enough to be worth worrying about.
#[derive(Clone, Debug)]
pub struct ThreatModel<'a> {
    tick: u32,
    enemies: Vec<&'a AgentBelief>,
}

impl<'a> ThreatModel<'a> {
    /// Collects every live enemy seen within `recent_enemy_ticks`.
    #[must_use]
    pub fn generate(beliefs: &'a Beliefs, params: &PlannerParams) -> Self {
        let tick = query::tick(beliefs);
        let enemies = query::agents(beliefs)
            .filter(|agent| agent.team() == Team::Enemy)
            .filter(|enemy| enemy.is_alive())
            .filter(|enemy| tick.saturating_sub(enemy.seen_tick()) < params.recent_enemy_ticks)
            .collect();
        Self { tick, enemies }
    }

    /// Enemies the model tracks.
    #[must_use]
    pub fn enemies(&self) -> &[&'a AgentBelief] {
        &self.enemies
    }

    /// Threats against `agent`, closest first.
    pub fn threats(&self, occupancy: &mut OccupantMap<'_>, agent: &AgentBelief) -> Vec<Threat> {
        let path_map = occupancy.pathfind(agent);
        let mut threats: Vec<Threat> = self
            .enemies
            .iter()
            .filter_map(|enemy| {
                let cost = approach_cost(&path_map, enemy.position())?;
                let elapsed = self.tick.saturating_sub(enemy.seen_tick()).saturating_add(1);
                let reach = elapsed.saturating_mul(enemy.max_speed(self.tick));
                Some(Threat {
                    enemy: enemy.key(),
                    enemy_form: enemy.form(),
                    arrival_ticks: cost.saturating_sub(reach),
                })
            })
            .collect();
        threats.sort_by_key(|threat| (threat.arrival_ticks, threat.enemy));
        threats
    }
}

/// Path cost to the enemy's cell, going through its cheapest neighbour when
/// the cell itself is held.
fn approach_cost(path_map: &PathMap, cell: Position) -> Option<u32> {
    path_map.cost(cell).or_else(|| {
        traverse::neighbors(cell, path_map.bounds())
            .filter_map(|neighbor| path_map.cost(neighbor))
            .min()
            .map(|cost| cost.saturating_add(1))
    })
}

/// Spends ready abilities on form switches or speed.
#[derive(Clone, Copy, Debug)]
pub struct ThreatActor<'p> {
    params: &'p PlannerParams,
}

impl<'p> ThreatActor<'p> {
    /// Actor governed by the given parameters.
    #[must_use]
    pub const fn new(params: &'p PlannerParams) -> Self {
        Self { params }
    }

    /// Intents for the agents whose ability is ready.
    pub fn choose(
        &self,
        model: &ThreatModel<'_>,
        occupancy: &mut OccupantMap<'_>,
        agents: &[&AgentBelief],
    ) -> Vec<Intent> {
        let tick = model.tick;
        let mut intents = Vec::new();

        for agent in agents {
            if !agent.ability_ready(tick) {
                continue;
            }

            let threats = model.threats(occupancy, agent);
            if let Some(closest) = threats.first() {
                let counter = closest.enemy_form.dominator();
                if closest.arrival_ticks == 0 && agent.form() != counter {
                    debug!(
                        agent = %agent.key(),
                        enemy = %closest.enemy,
                        to = %counter,
                        "switching form"
                    );
                    intents.push(
                        Intent::new(agent.key().id(), Action::Switch { form: counter })
                            .annotated(format!("counter {}", closest.enemy_form)),
                    );
                    continue;
                }
            }

            let safe = threats
                .iter()
                .all(|threat| threat.arrival_ticks > self.params.safety_window_ticks);
            if self.params.use_speed && safe {
                intents.push(Intent::new(agent.key().id(), Action::Speed).annotated("speed"));
            }
        }
        intents
    }
}
