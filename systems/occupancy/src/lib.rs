#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Occupancy model that decides which cells each agent may path through.
//!
//! The map is built once per turn from the beliefs and then cloned freely by
//! the planners. Every clone shares the per-agent [`PathMap`] cache through
//! reference counting; a clone only copies a path map when a committed move
//! forces it to be reevaluated.

use std::{collections::BTreeMap, rc::Rc};

use pellet_rush_core::{traverse, AgentKey, PlannerParams, Position};
use pellet_rush_world::{
    navigation::{PassabilityDelta, PathMap},
    query, AgentBelief, Beliefs,
};

/// Reason a cell is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occupant {
    /// The cell is part of the maze walls.
    Wall,
    /// The cell is held, or contested, by an agent.
    Agent(AgentKey),
}

/// Reports whether `agent` may walk into `enemy` this tick with a guaranteed win.
///
/// The enemy must be alive and visible right now, `agent` must already hold
/// the form that beats it, and the enemy must be unable to switch in response.
#[must_use]
pub fn safely_dominates(agent: &AgentBelief, enemy: &AgentBelief, tick: u32) -> bool {
    enemy.team() != agent.team()
        && enemy.is_alive()
        && enemy.is_visible(tick)
        && agent.form() == enemy.form().dominator()
        && !enemy.ability_ready(tick)
}

#[derive(Clone, Debug)]
struct CachedPath {
    map: Rc<PathMap>,
    pending: PassabilityDelta,
}

/// Per-cell occupants plus a cache of path maps keyed by agent.
#[derive(Clone, Debug)]
pub struct OccupantMap<'a> {
    beliefs: &'a Beliefs,
    teammate_ignore_range: u32,
    occupants: Vec<Option<Occupant>>,
    paths: BTreeMap<AgentKey, CachedPath>,
}

impl<'a> OccupantMap<'a> {
    /// Builds the occupancy for the current tick.
    ///
    /// Walls and every live agent seen this tick occupy their cell. A free
    /// cell that both an own agent could enter this turn and a visible enemy
    /// could step into is treated as held by that enemy.
    #[must_use]
    pub fn generate(beliefs: &'a Beliefs, params: &PlannerParams) -> Self {
        let bounds = query::bounds(beliefs);
        let tick = query::tick(beliefs);

        let mut occupants: Vec<Option<Occupant>> = traverse::all(bounds)
            .map(|cell| query::is_wall(beliefs, cell).then_some(Occupant::Wall))
            .collect();

        for agent in query::agents(beliefs) {
            if !agent.is_alive() || !agent.is_visible(tick) {
                continue;
            }
            if let Some(index) = bounds.index(agent.position()) {
                occupants[index] = Some(Occupant::Agent(agent.key()));
            }
        }

        let mut within_reach = vec![false; bounds.cell_count()];
        for agent in query::controllable_agents(beliefs) {
            for cell in traverse::within_range(agent.position(), agent.max_speed(tick), bounds) {
                if let Some(index) = bounds.index(cell) {
                    within_reach[index] = true;
                }
            }
        }

        for enemy in query::visible_enemies(beliefs) {
            for cell in traverse::neighbors(enemy.position(), bounds) {
                let Some(index) = bounds.index(cell) else {
                    continue;
                };
                if within_reach[index] && occupants[index].is_none() {
                    occupants[index] = Some(Occupant::Agent(enemy.key()));
                }
            }
        }

        Self {
            beliefs,
            teammate_ignore_range: params.teammate_ignore_range,
            occupants,
            paths: BTreeMap::new(),
        }
    }

    /// Beliefs the map was generated from.
    #[must_use]
    pub const fn beliefs(&self) -> &'a Beliefs {
        self.beliefs
    }

    /// Occupant recorded for the cell.
    #[must_use]
    pub fn occupant(&self, cell: Position) -> Option<Occupant> {
        let index = query::bounds(self.beliefs).index(cell)?;
        self.occupants.get(index).copied().flatten()
    }

    /// Reports whether `agent` may path through the cell.
    #[must_use]
    pub fn is_passable(&self, cell: Position, agent: &AgentBelief) -> bool {
        passable_for(
            self.beliefs,
            &self.occupants,
            self.teammate_ignore_range,
            agent,
            cell,
        )
    }

    /// Path map rooted at the agent under the current occupancy.
    ///
    /// Cached maps are returned as-is, or reevaluated incrementally when moves
    /// were committed since they were built.
    pub fn pathfind(&mut self, agent: &AgentBelief) -> Rc<PathMap> {
        let beliefs = self.beliefs;
        let range = self.teammate_ignore_range;
        let occupants: &[Option<Occupant>] = &self.occupants;
        let passable = |cell: Position| passable_for(beliefs, occupants, range, agent, cell);

        match self.paths.get_mut(&agent.key()) {
            Some(cached) if cached.map.source() == agent.position() => {
                if !cached.pending.is_empty() {
                    Rc::make_mut(&mut cached.map).reevaluate(&cached.pending, passable);
                    cached.pending.clear();
                }
                Rc::clone(&cached.map)
            }
            _ => {
                let map = Rc::new(PathMap::generate(
                    agent.position(),
                    query::bounds(beliefs),
                    None,
                    passable,
                ));
                let _ = self.paths.insert(
                    agent.key(),
                    CachedPath {
                        map: Rc::clone(&map),
                        pending: PassabilityDelta::default(),
                    },
                );
                map
            }
        }
    }

    /// Commits `agent` to the cell and records the change in every other
    /// cached map.
    ///
    /// A committed cell usually closes for the others, but it opens for
    /// teammates beyond the ignore range when it was held by an enemy they
    /// could not pass.
    pub fn block(&mut self, cell: Position, agent: &AgentBelief) {
        let Some(index) = query::bounds(self.beliefs).index(cell) else {
            return;
        };
        let committed = Some(Occupant::Agent(agent.key()));
        let previous = std::mem::replace(&mut self.occupants[index], committed);

        let beliefs = self.beliefs;
        let range = self.teammate_ignore_range;
        for (key, cached) in &mut self.paths {
            if *key == agent.key() {
                continue;
            }
            let Some(other) = query::agent(beliefs, *key) else {
                cached.pending.close(cell);
                continue;
            };
            let was_passable = admits(beliefs, previous, range, other, cell);
            let is_passable = admits(beliefs, committed, range, other, cell);
            match (was_passable, is_passable) {
                (false, true) => cached.pending.open(cell),
                (true, false) => cached.pending.close(cell),
                _ => {}
            }
        }
    }

    /// Builds and caches path maps for every agent ahead of planning.
    pub fn precompute(&mut self, agents: &[&AgentBelief]) {
        for agent in agents {
            let _ = self.pathfind(agent);
        }
    }
}

fn passable_for(
    beliefs: &Beliefs,
    occupants: &[Option<Occupant>],
    teammate_ignore_range: u32,
    agent: &AgentBelief,
    cell: Position,
) -> bool {
    let Some(index) = query::bounds(beliefs).index(cell) else {
        return false;
    };
    let occupant = occupants.get(index).copied().flatten();
    admits(beliefs, occupant, teammate_ignore_range, agent, cell)
}

fn admits(
    beliefs: &Beliefs,
    occupant: Option<Occupant>,
    teammate_ignore_range: u32,
    agent: &AgentBelief,
    cell: Position,
) -> bool {
    let bounds = query::bounds(beliefs);
    match occupant {
        None => true,
        Some(Occupant::Wall) => false,
        Some(Occupant::Agent(key)) if key == agent.key() => true,
        Some(Occupant::Agent(key)) => match query::agent(beliefs, key) {
            Some(other) if other.team() == agent.team() => {
                bounds.distance(agent.position(), cell) > teammate_ignore_range
            }
            Some(enemy) => safely_dominates(agent, enemy, query::tick(beliefs)),
            None => false,
        },
    }
}
