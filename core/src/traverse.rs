//! Torus-aware enumeration helpers over a [`GridBounds`].
//!
//! None of these helpers know about walls; callers filter the cells they
//! receive through their own passability rules.

use crate::{Direction, GridBounds, Position};

/// Every cell of the grid in row-major order.
pub fn all(bounds: GridBounds) -> impl Iterator<Item = Position> {
    let width = bounds.width();
    (0..bounds.height()).flat_map(move |y| (0..width).map(move |x| Position::new(x, y)))
}

/// Distinct orthogonal neighbours of the position, wrapping across edges.
///
/// On axes one cell wide a step leads back to the origin and is dropped; on
/// axes two cells wide both headings reach the same cell and it is reported
/// once.
pub fn neighbors(position: Position, bounds: GridBounds) -> impl Iterator<Item = Position> {
    let mut cells = [position; 4];
    let mut len = 0;
    for direction in Direction::ALL {
        let next = bounds.step(position, direction);
        if next != position && !cells[..len].contains(&next) {
            cells[len] = next;
            len += 1;
        }
    }
    cells.into_iter().take(len)
}

/// Cells starting at `from` and stepping in `direction`, at most one full lap.
pub fn ray(
    bounds: GridBounds,
    from: Position,
    direction: Direction,
) -> impl Iterator<Item = Position> {
    let lap = match direction {
        Direction::North | Direction::South => bounds.height(),
        Direction::East | Direction::West => bounds.width(),
    };
    let lap = usize::try_from(lap).unwrap_or(0);
    std::iter::successors(Some(from), move |&cell| Some(bounds.step(cell, direction))).take(lap)
}

/// Distinct cells within wrapped Manhattan distance `range` of `center`.
#[must_use]
pub fn within_range(center: Position, range: u32, bounds: GridBounds) -> Vec<Position> {
    let reach = range.min(bounds.width().saturating_add(bounds.height()));
    let reach = i64::from(reach);
    let mut cells = Vec::new();
    for dy in -reach..=reach {
        let span = reach - dy.abs();
        for dx in -span..=span {
            cells.push(bounds.offset(center, dx, dy));
        }
    }
    cells.sort_unstable();
    cells.dedup();
    cells
}

/// Heading of the single wrapped step leading from `from` to `to`.
#[must_use]
pub fn direction_between(from: Position, to: Position, bounds: GridBounds) -> Option<Direction> {
    if from == to {
        return None;
    }

    Direction::ALL
        .into_iter()
        .find(|&direction| bounds.step(from, direction) == to)
}
