#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Belief state for Pellet Rush.
//!
//! The contest only reveals what the bot's own agents can see, so the world
//! keeps a belief per cell and per agent rather than ground truth. Sensor
//! snapshots are folded in through [`apply`]; planning systems read the result
//! through the [`query`] module and never mutate it.

use std::collections::{btree_map::Entry, BTreeMap};

use pellet_rush_core::{
    traverse, AgentKey, Direction, Form, GridBounds, GridLayout, PlannerParams, Position,
    Sighting, Team, TurnSnapshot,
};
use tracing::debug;

pub mod navigation;

use navigation::PathMap;

/// Belief about the contents of a single cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeliefCell {
    wall: bool,
    value: u32,
    seen_tick: u32,
    still_available: f64,
}

impl BeliefCell {
    const fn unobserved(wall: bool) -> Self {
        Self {
            wall,
            value: if wall { 0 } else { 1 },
            seen_tick: 0,
            still_available: 1.0,
        }
    }

    /// Reports whether the cell is a wall.
    #[must_use]
    pub const fn is_wall(&self) -> bool {
        self.wall
    }

    /// Pellet value last observed, or assumed, in the cell.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Last tick the cell was directly observed.
    #[must_use]
    pub const fn seen_tick(&self) -> u32 {
        self.seen_tick
    }

    /// Confidence that the pellet has not been eaten since it was observed.
    #[must_use]
    pub const fn still_available(&self) -> f64 {
        self.still_available
    }

    /// Value weighted by the probability that it is still there.
    #[must_use]
    pub fn expected_value(&self) -> f64 {
        f64::from(self.value) * self.still_available
    }

    fn observe(&mut self, tick: u32, value: u32) {
        self.value = value;
        self.seen_tick = self.seen_tick.max(tick);
        self.still_available = 1.0;
    }
}

/// Last known state of an agent from either team.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentBelief {
    key: AgentKey,
    position: Position,
    form: Form,
    alive: bool,
    seen_tick: u32,
    ability_ready_tick: u32,
    speed_until_tick: u32,
    rings_decayed: u32,
}

impl AgentBelief {
    fn from_sighting(sighting: &Sighting, tick: u32) -> Self {
        let mut agent = Self {
            key: sighting.key,
            position: sighting.position,
            form: sighting.form.unwrap_or(Form::Rock),
            alive: true,
            seen_tick: tick,
            ability_ready_tick: tick,
            speed_until_tick: tick,
            rings_decayed: 0,
        };
        agent.record(sighting, tick);
        agent
    }

    fn record(&mut self, sighting: &Sighting, tick: u32) {
        if tick < self.seen_tick {
            return;
        }

        self.position = sighting.position;
        match sighting.form {
            Some(form) => {
                if form != self.form {
                    debug!(agent = %self.key, from = %self.form, to = %form, "form changed");
                }
                self.form = form;
            }
            None => self.alive = false,
        }
        self.seen_tick = tick;
        self.ability_ready_tick = tick.saturating_add(sighting.ability_cooldown);
        self.speed_until_tick = tick.saturating_add(sighting.speed_turns_left);
        self.rings_decayed = 0;
    }

    /// Team and identifier of the agent.
    #[must_use]
    pub const fn key(&self) -> AgentKey {
        self.key
    }

    /// Team the agent plays for.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.key.team()
    }

    /// Cell the agent was last seen in.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Form the agent was last seen in.
    #[must_use]
    pub const fn form(&self) -> Form {
        self.form
    }

    /// Whether the agent has not been reported eliminated.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Tick the agent was last observed.
    #[must_use]
    pub const fn seen_tick(&self) -> u32 {
        self.seen_tick
    }

    /// First tick at which the agent may trigger an ability again.
    #[must_use]
    pub const fn ability_ready_tick(&self) -> u32 {
        self.ability_ready_tick
    }

    /// Tick at which the agent's speed boost wears off.
    #[must_use]
    pub const fn speed_until_tick(&self) -> u32 {
        self.speed_until_tick
    }

    /// Whether the agent was observed on the provided tick.
    #[must_use]
    pub const fn is_visible(&self, tick: u32) -> bool {
        self.seen_tick == tick
    }

    /// Whether the agent's speed boost is active on the provided tick.
    #[must_use]
    pub const fn is_speeding(&self, tick: u32) -> bool {
        tick < self.speed_until_tick
    }

    /// Whether the agent may trigger an ability on the provided tick.
    #[must_use]
    pub const fn ability_ready(&self, tick: u32) -> bool {
        self.ability_ready_tick <= tick
    }

    /// Upper bound on the cells the agent can cover in one tick.
    ///
    /// Enemies whose ability is off cooldown are assumed to be able to speed
    /// up at any moment.
    #[must_use]
    pub const fn max_speed(&self, tick: u32) -> u32 {
        let enemy_may_boost = matches!(self.key.team(), Team::Enemy) && self.ability_ready(tick);
        if self.is_speeding(tick) || enemy_may_boost {
            2
        } else {
            1
        }
    }
}

/// Beliefs about the maze, its pellets, and every agent seen so far.
#[derive(Clone, Debug)]
pub struct Beliefs {
    bounds: GridBounds,
    tick: u32,
    own_score: u32,
    enemy_score: u32,
    cells: Vec<BeliefCell>,
    agents: BTreeMap<AgentKey, AgentBelief>,
    mirror_enemy_start: bool,
    initialised: bool,
}

impl Beliefs {
    /// Creates beliefs for a fresh game on the provided layout.
    ///
    /// Every floor cell starts out assumed to hold a pellet worth one point.
    #[must_use]
    pub fn new(layout: &GridLayout, params: &PlannerParams) -> Self {
        let bounds = layout.bounds();
        let cells = traverse::all(bounds)
            .map(|cell| BeliefCell::unobserved(layout.is_wall(cell)))
            .collect();

        Self {
            bounds,
            tick: 0,
            own_score: 0,
            enemy_score: 0,
            cells,
            agents: BTreeMap::new(),
            mirror_enemy_start: params.mirror_enemy_start,
            initialised: false,
        }
    }

    fn cell_mut(&mut self, position: Position) -> Option<&mut BeliefCell> {
        let index = self.bounds.index(position)?;
        self.cells.get_mut(index)
    }

    fn is_wall(&self, position: Position) -> bool {
        self.bounds
            .index(position)
            .and_then(|index| self.cells.get(index))
            .map_or(true, BeliefCell::is_wall)
    }

    fn record_sighting(&mut self, sighting: &Sighting, tick: u32) {
        match self.agents.entry(sighting.key) {
            Entry::Vacant(entry) => {
                let _ = entry.insert(AgentBelief::from_sighting(sighting, tick));
            }
            Entry::Occupied(mut entry) => entry.get_mut().record(sighting, tick),
        }
    }

    fn mirror_enemies(&mut self, snapshot: &TurnSnapshot) {
        let width = self.bounds.width();
        for sighting in &snapshot.sightings {
            if sighting.key.team() != Team::Own || sighting.form.is_none() {
                continue;
            }

            let key = AgentKey::new(Team::Enemy, sighting.key.id());
            let mirrored = Position::new(
                width.saturating_sub(sighting.position.x()).saturating_sub(1),
                sighting.position.y(),
            );
            if self.agents.contains_key(&key) || self.is_wall(mirrored) {
                continue;
            }

            let mut enemy = AgentBelief::from_sighting(sighting, snapshot.tick);
            enemy.key = key;
            enemy.position = mirrored;
            let _ = self.agents.insert(key, enemy);
        }
    }

    fn observe_line_of_sight(&mut self) {
        let tick = self.tick;
        let viewers: Vec<Position> = self
            .agents
            .values()
            .filter(|agent| agent.team() == Team::Own && agent.alive && agent.is_visible(tick))
            .map(AgentBelief::position)
            .collect();

        for viewer in viewers {
            for direction in Direction::ALL {
                for cell in traverse::ray(self.bounds, viewer, direction) {
                    let Some(belief) = self.cell_mut(cell) else {
                        break;
                    };
                    if belief.wall {
                        break;
                    }
                    belief.observe(tick, 0);
                }
            }
        }
    }

    /// Spreads each hidden enemy over the cells it could have reached since
    /// it was last seen, lowering the odds that pellets there survived.
    fn decay_behind_hidden_enemies(&mut self) {
        let tick = self.tick;
        let hidden: Vec<AgentKey> = self
            .agents
            .values()
            .filter(|agent| agent.team() == Team::Enemy && agent.alive && !agent.is_visible(tick))
            .map(AgentBelief::key)
            .collect();

        for key in hidden {
            let Some(enemy) = self.agents.get(&key) else {
                continue;
            };
            let age = tick.saturating_sub(enemy.seen_tick);
            let first_ring = enemy.rings_decayed;
            if first_ring > age {
                continue;
            }
            let origin = enemy.position;
            let seen_tick = enemy.seen_tick;

            let bounds = self.bounds;
            let cells = &self.cells;
            let map = PathMap::generate(origin, bounds, Some(age), |cell| {
                bounds
                    .index(cell)
                    .and_then(|index| cells.get(index))
                    .is_some_and(|belief| !belief.wall)
            });

            let skip = usize::try_from(first_ring).unwrap_or(usize::MAX);
            for (ring_cost, ring) in map.isochrones(age).into_iter().enumerate().skip(skip) {
                if ring.is_empty() {
                    continue;
                }
                let presence = 1.0 / ring.len() as f64;
                let ring_cost = u32::try_from(ring_cost).unwrap_or(u32::MAX);
                let arrival = seen_tick.saturating_add(ring_cost);
                for cell in ring {
                    if let Some(belief) = self.cell_mut(cell) {
                        if belief.seen_tick < arrival {
                            belief.still_available *= 1.0 - presence;
                        }
                    }
                }
            }

            if let Some(enemy) = self.agents.get_mut(&key) {
                enemy.rings_decayed = age.saturating_add(1);
            }
        }
    }
}

/// Folds a sensor snapshot into the beliefs.
///
/// Agents are refreshed first, then every cell an own agent can see down a
/// straight corridor is marked empty, visible pellets are recorded, and
/// finally cells that hidden enemies might have swept are discounted.
pub fn apply(beliefs: &mut Beliefs, snapshot: &TurnSnapshot) {
    beliefs.tick = beliefs.tick.max(snapshot.tick);
    beliefs.own_score = snapshot.own_score;
    beliefs.enemy_score = snapshot.enemy_score;

    for sighting in &snapshot.sightings {
        beliefs.record_sighting(sighting, snapshot.tick);
    }
    if !beliefs.initialised && beliefs.mirror_enemy_start {
        beliefs.mirror_enemies(snapshot);
    }
    beliefs.initialised = true;

    beliefs.observe_line_of_sight();
    for pellet in &snapshot.pellets {
        let tick = beliefs.tick;
        if let Some(cell) = beliefs.cell_mut(pellet.position) {
            if !cell.wall {
                cell.observe(tick, pellet.value);
            }
        }
    }

    beliefs.decay_behind_hidden_enemies();

    debug!(
        tick = beliefs.tick,
        agents = beliefs.agents.len(),
        pellets = snapshot.pellets.len(),
        "beliefs updated"
    );
}

/// Query functions that provide read-only access to the beliefs.
pub mod query {
    use super::{AgentBelief, BeliefCell, Beliefs};
    use pellet_rush_core::{AgentKey, GridBounds, Position, Team};

    /// Latest tick folded into the beliefs.
    #[must_use]
    pub fn tick(beliefs: &Beliefs) -> u32 {
        beliefs.tick
    }

    /// Dimensions of the maze.
    #[must_use]
    pub fn bounds(beliefs: &Beliefs) -> GridBounds {
        beliefs.bounds
    }

    /// Latest scores as `(own, enemy)`.
    #[must_use]
    pub fn scores(beliefs: &Beliefs) -> (u32, u32) {
        (beliefs.own_score, beliefs.enemy_score)
    }

    /// Belief held about the provided cell.
    #[must_use]
    pub fn cell(beliefs: &Beliefs, position: Position) -> Option<&BeliefCell> {
        let index = beliefs.bounds.index(position)?;
        beliefs.cells.get(index)
    }

    /// Reports whether the cell is a wall. Cells outside the maze count as walls.
    #[must_use]
    pub fn is_wall(beliefs: &Beliefs, position: Position) -> bool {
        beliefs.is_wall(position)
    }

    /// Expected pellet value of the cell.
    #[must_use]
    pub fn expected_value(beliefs: &Beliefs, position: Position) -> f64 {
        cell(beliefs, position).map_or(0.0, BeliefCell::expected_value)
    }

    /// Belief held about the provided agent.
    #[must_use]
    pub fn agent(beliefs: &Beliefs, key: AgentKey) -> Option<&AgentBelief> {
        beliefs.agents.get(&key)
    }

    /// Every agent ever seen, ordered by team and identifier.
    pub fn agents(beliefs: &Beliefs) -> impl Iterator<Item = &AgentBelief> {
        beliefs.agents.values()
    }

    /// Own agents that are alive and reported this tick, ordered by identifier.
    #[must_use]
    pub fn controllable_agents(beliefs: &Beliefs) -> Vec<&AgentBelief> {
        beliefs
            .agents
            .values()
            .filter(|agent| {
                agent.team() == Team::Own && agent.is_alive() && agent.is_visible(beliefs.tick)
            })
            .collect()
    }

    /// Live enemies reported this tick.
    #[must_use]
    pub fn visible_enemies(beliefs: &Beliefs) -> Vec<&AgentBelief> {
        beliefs
            .agents
            .values()
            .filter(|agent| {
                agent.team() == Team::Enemy && agent.is_alive() && agent.is_visible(beliefs.tick)
            })
            .collect()
    }
}
