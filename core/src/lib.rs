#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Pellet Rush bot.
//!
//! This crate defines the vocabulary that connects the transport adapter, the
//! belief world, and the pure planning systems. The adapter turns the contest
//! line protocol into a [`GridLayout`] once and a [`TurnSnapshot`] every turn,
//! the world folds snapshots into beliefs, and the systems answer with
//! [`Intent`] values that the adapter serialises back onto the wire.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod traverse;

/// Errors raised while interpreting raw observations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A form tag did not name any of the three known forms.
    #[error("unknown form `{0}`")]
    UnknownForm(String),
    /// A layout row did not match the width announced for the grid.
    #[error("layout row {row} is {found} cells wide, expected {expected}")]
    RaggedLayout {
        /// Zero-based row that failed validation.
        row: usize,
        /// Width of the offending row.
        found: usize,
        /// Width shared by every row.
        expected: usize,
    },
    /// The layout contained no cells at all.
    #[error("layout must contain at least one row and one column")]
    EmptyLayout,
}

/// Location of a single cell on the toroidal grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    x: u32,
    y: u32,
}

impl Position {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Computes the planar Manhattan distance, ignoring wrap-around.
    #[must_use]
    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal movement directions on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// Every heading in the order traversal helpers enumerate them.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Column and row delta of a single step.
    #[must_use]
    pub const fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// Dimensions of the toroidal grid together with flat indexing helpers.
///
/// Every grid-shaped structure in the bot is a flat vector addressed through
/// [`GridBounds::index`], so a single bounds value describes all of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    width: u32,
    height: u32,
}

impl GridBounds {
    /// Creates bounds for a grid with the provided dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells, or zero if the product overflows `usize`.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let width = usize::try_from(self.width).unwrap_or(0);
        let height = usize::try_from(self.height).unwrap_or(0);
        width.checked_mul(height).unwrap_or(0)
    }

    /// Reports whether the position lies inside the grid.
    #[must_use]
    pub const fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    /// Flat row-major index of the position.
    #[must_use]
    pub fn index(&self, position: Position) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }

        let row = usize::try_from(position.y).ok()?;
        let column = usize::try_from(position.x).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Position addressed by a flat row-major index.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<Position> {
        if index >= self.cell_count() {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let x = u32::try_from(index % width).ok()?;
        let y = u32::try_from(index / width).ok()?;
        Some(Position::new(x, y))
    }

    /// Translates the position by an arbitrary delta, wrapping on both axes.
    #[must_use]
    pub fn offset(&self, position: Position, dx: i64, dy: i64) -> Position {
        if self.width == 0 || self.height == 0 {
            return position;
        }

        let width = i64::from(self.width);
        let height = i64::from(self.height);
        let x = (i64::from(position.x) + dx).rem_euclid(width);
        let y = (i64::from(position.y) + dy).rem_euclid(height);
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) => Position::new(x, y),
            _ => position,
        }
    }

    /// Neighbouring position one step away in the provided direction.
    #[must_use]
    pub fn step(&self, position: Position, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        self.offset(position, dx, dy)
    }

    /// Manhattan distance measured the short way around the torus.
    #[must_use]
    pub fn distance(&self, a: Position, b: Position) -> u32 {
        let dx = a.x.abs_diff(b.x);
        let dy = a.y.abs_diff(b.y);
        dx.min(self.width.saturating_sub(dx)) + dy.min(self.height.saturating_sub(dy))
    }
}

/// Side an agent plays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Agents controlled by this bot.
    Own,
    /// Agents controlled by the opponent.
    Enemy,
}

/// Identifier assigned to an agent by the contest, unique within a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Globally unique agent key combining team and identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentKey {
    team: Team,
    id: AgentId,
}

impl AgentKey {
    /// Creates a key for the agent with the provided team and identifier.
    #[must_use]
    pub const fn new(team: Team, id: AgentId) -> Self {
        Self { team, id }
    }

    /// Key for one of this bot's agents.
    #[must_use]
    pub const fn own(id: u32) -> Self {
        Self::new(Team::Own, AgentId::new(id))
    }

    /// Key for one of the opponent's agents.
    #[must_use]
    pub const fn enemy(id: u32) -> Self {
        Self::new(Team::Enemy, AgentId::new(id))
    }

    /// Team the agent belongs to.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Identifier of the agent within its team.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let team = match self.team {
            Team::Own => "own",
            Team::Enemy => "enemy",
        };
        write!(f, "{team}:{}", self.id.get())
    }
}

/// Rock-paper-scissors form carried by every live agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    /// Beats scissors.
    Rock,
    /// Beats rock.
    Paper,
    /// Beats paper.
    Scissors,
}

impl Form {
    /// Form that beats `self`.
    #[must_use]
    pub const fn dominator(self) -> Form {
        match self {
            Form::Scissors => Form::Rock,
            Form::Paper => Form::Scissors,
            Form::Rock => Form::Paper,
        }
    }

    /// Reports whether `self` wins a collision against `other`.
    #[must_use]
    pub fn beats(self, other: Form) -> bool {
        other.dominator() == self
    }

    /// Wire tag used by the contest protocol.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Form::Rock => "ROCK",
            Form::Paper => "PAPER",
            Form::Scissors => "SCISSORS",
        }
    }
}

impl FromStr for Form {
    type Err = CoreError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "ROCK" => Ok(Form::Rock),
            "PAPER" => Ok(Form::Paper),
            "SCISSORS" => Ok(Form::Scissors),
            other => Err(CoreError::UnknownForm(other.to_owned())),
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Static description of the maze received before the first turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    bounds: GridBounds,
    walls: Vec<bool>,
}

impl GridLayout {
    /// Parses a layout from text rows where `#` marks a wall.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, CoreError> {
        let Some(first) = rows.first() else {
            return Err(CoreError::EmptyLayout);
        };
        let expected = first.as_ref().chars().count();
        if expected == 0 {
            return Err(CoreError::EmptyLayout);
        }

        let mut walls = Vec::with_capacity(expected * rows.len());
        for (row, text) in rows.iter().enumerate() {
            let found = text.as_ref().chars().count();
            if found != expected {
                return Err(CoreError::RaggedLayout {
                    row,
                    found,
                    expected,
                });
            }
            walls.extend(text.as_ref().chars().map(|cell| cell == '#'));
        }

        let width = u32::try_from(expected).map_err(|_| CoreError::EmptyLayout)?;
        let height = u32::try_from(rows.len()).map_err(|_| CoreError::EmptyLayout)?;
        Ok(Self {
            bounds: GridBounds::new(width, height),
            walls,
        })
    }

    /// Dimensions of the layout.
    #[must_use]
    pub const fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Reports whether the cell is a wall. Positions outside the grid count as walls.
    #[must_use]
    pub fn is_wall(&self, position: Position) -> bool {
        self.bounds
            .index(position)
            .and_then(|index| self.walls.get(index).copied())
            .unwrap_or(true)
    }
}

/// Observation of a single agent reported for the current turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Agent that was observed.
    pub key: AgentKey,
    /// Cell the agent occupies.
    pub position: Position,
    /// Current form, or `None` once the agent has been eliminated.
    pub form: Option<Form>,
    /// Remaining turns of the active speed boost.
    pub speed_turns_left: u32,
    /// Turns until the agent may trigger an ability again.
    pub ability_cooldown: u32,
}

/// Observation of a pellet visible this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PelletSighting {
    /// Cell holding the pellet.
    pub position: Position,
    /// Points awarded for collecting the pellet.
    pub value: u32,
}

/// Everything the sensor reports for one turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Zero-based turn counter.
    pub tick: u32,
    /// Score of this bot's team.
    pub own_score: u32,
    /// Score of the opponent.
    pub enemy_score: u32,
    /// Agents visible this turn, including eliminated ones.
    pub sightings: Vec<Sighting>,
    /// Pellets visible this turn.
    pub pellets: Vec<PelletSighting>,
}

/// Action requested for a single agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Walk toward the target cell.
    Move {
        /// Cell the agent should head toward.
        target: Position,
    },
    /// Change form.
    Switch {
        /// Form to adopt.
        form: Form,
    },
    /// Trigger the speed boost.
    Speed,
    /// Stay in place.
    Wait,
}

/// Action addressed to one agent together with an optional annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intent {
    /// Agent receiving the action.
    pub agent: AgentId,
    /// Requested action.
    pub action: Action,
    /// Free-text label echoed by the contest viewer.
    pub annotation: Option<String>,
}

impl Intent {
    /// Creates an intent without annotation.
    #[must_use]
    pub const fn new(agent: AgentId, action: Action) -> Self {
        Self {
            agent,
            action,
            annotation: None,
        }
    }

    /// Attaches an annotation to the intent.
    #[must_use]
    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

/// Value of a reward collected `ticks` turns from now, divided by `rate` per turn.
#[must_use]
pub fn discount(value: f64, rate: f64, ticks: u32) -> f64 {
    value / rate.powf(f64::from(ticks))
}

/// Tuning knobs consumed by the planning systems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerParams {
    /// Per-tick divisor applied to value collected in the future.
    pub discount_rate: f64,
    /// Search radius, in path cost, when choosing an agent's first target.
    pub first_target_horizon: u32,
    /// Search radius, in path cost, when extending an existing route.
    pub extension_horizon: u32,
    /// Maximum number of targets a single route may chain.
    pub max_route_targets: u32,
    /// Enemies seen within this many ticks are considered threats.
    pub recent_enemy_ticks: u32,
    /// Threats arriving within this many ticks suppress the speed ability.
    pub safety_window_ticks: u32,
    /// Teammates further than this wrapped distance never block a path.
    pub teammate_ignore_range: u32,
    /// Whether idle abilities are spent on speed boosts.
    pub use_speed: bool,
    /// Wall-clock budget for an ordinary turn, in milliseconds.
    pub move_timeout_ms: u64,
    /// Wall-clock budget for the first turn, in milliseconds.
    pub first_turn_timeout_ms: u64,
    /// Whether the opponent is assumed to start mirrored across the vertical axis.
    pub mirror_enemy_start: bool,
    /// Seed for the planner's permutation sampler.
    pub rng_seed: u64,
}

impl PlannerParams {
    /// Discounts a value collected `ticks` turns from now.
    #[must_use]
    pub fn discount(&self, value: f64, ticks: u32) -> f64 {
        discount(value, self.discount_rate, ticks)
    }

    /// Wall-clock budget available for deciding the provided tick.
    #[must_use]
    pub fn move_budget(&self, tick: u32) -> Duration {
        if tick == 0 {
            Duration::from_millis(self.first_turn_timeout_ms)
        } else {
            Duration::from_millis(self.move_timeout_ms)
        }
    }
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            discount_rate: 1.07,
            first_target_horizon: 30,
            extension_horizon: 15,
            max_route_targets: 6,
            recent_enemy_ticks: 3,
            safety_window_ticks: 3,
            teammate_ignore_range: 8,
            use_speed: true,
            move_timeout_ms: 40,
            first_turn_timeout_ms: 800,
            mirror_enemy_start: true,
            rng_seed: 0x5eed_2020,
        }
    }
}
