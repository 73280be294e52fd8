//! Incremental uniform-cost path maps over the toroidal grid.

use pellet_rush_core::{traverse, GridBounds, Position};
use tracing::error;

const UNREACHED: u32 = u32::MAX;

/// Cells whose passability changed since a [`PathMap`] was last expanded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassabilityDelta {
    opened: Vec<Position>,
    closed: Vec<Position>,
}

impl PassabilityDelta {
    /// Records a cell that became passable, superseding an earlier close.
    pub fn open(&mut self, position: Position) {
        self.closed.retain(|&cell| cell != position);
        if !self.opened.contains(&position) {
            self.opened.push(position);
        }
    }

    /// Records a cell that became impassable, superseding an earlier open.
    pub fn close(&mut self, position: Position) {
        self.opened.retain(|&cell| cell != position);
        if !self.closed.contains(&position) {
            self.closed.push(position);
        }
    }

    /// Cells that became passable.
    #[must_use]
    pub fn opened(&self) -> &[Position] {
        &self.opened
    }

    /// Cells that became impassable.
    #[must_use]
    pub fn closed(&self) -> &[Position] {
        &self.closed
    }

    /// Reports whether no change has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }

    /// Forgets every recorded change.
    pub fn clear(&mut self) {
        self.opened.clear();
        self.closed.clear();
    }
}

/// Shortest-path tree rooted at a single source cell.
///
/// Every reachable cell records its travel cost and the neighbour it is
/// entered from. Predecessors are canonical: among all reachable neighbours
/// one step cheaper, the one with the lowest flat index wins. A map that is
/// [`reevaluated`](PathMap::reevaluate) after a passability change is
/// therefore identical to one generated from scratch with the new rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMap {
    source: Position,
    bounds: GridBounds,
    max_cost: Option<u32>,
    costs: Vec<u32>,
    predecessors: Vec<Option<usize>>,
}

impl PathMap {
    /// Expands a fresh map outward from `source`.
    ///
    /// `passable` is consulted lazily for every cell the expansion tries to
    /// enter; the source itself is always part of the map. Cells costing more
    /// than `max_cost` are left unreachable. A source outside the grid yields
    /// a map with nothing reachable.
    pub fn generate<F>(
        source: Position,
        bounds: GridBounds,
        max_cost: Option<u32>,
        mut passable: F,
    ) -> Self
    where
        F: FnMut(Position) -> bool,
    {
        let cell_count = bounds.cell_count();
        let mut map = Self {
            source,
            bounds,
            max_cost,
            costs: vec![UNREACHED; cell_count],
            predecessors: vec![None; cell_count],
        };

        let Some(source_index) = bounds.index(source) else {
            return map;
        };

        map.costs[source_index] = 0;
        let mut queue = WorkQueue::default();
        queue.push(0, source_index);
        map.expand(&mut queue, &mut passable);
        map
    }

    /// Cell the map is rooted at.
    #[must_use]
    pub const fn source(&self) -> Position {
        self.source
    }

    /// Dimensions of the underlying grid.
    #[must_use]
    pub const fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Cost ceiling the map was expanded with.
    #[must_use]
    pub const fn max_cost(&self) -> Option<u32> {
        self.max_cost
    }

    /// Travel cost from the source, or `None` when the cell is unreachable.
    #[must_use]
    pub fn cost(&self, position: Position) -> Option<u32> {
        let index = self.bounds.index(position)?;
        let cost = *self.costs.get(index)?;
        (cost != UNREACHED).then_some(cost)
    }

    /// Neighbour the cell is entered from on its shortest path.
    #[must_use]
    pub fn predecessor(&self, position: Position) -> Option<Position> {
        let index = self.bounds.index(position)?;
        let previous = (*self.predecessors.get(index)?)?;
        self.bounds.position(previous)
    }

    /// Every reachable cell with its cost, in row-major order.
    pub fn reachable(&self) -> impl Iterator<Item = (Position, u32)> + '_ {
        self.costs
            .iter()
            .enumerate()
            .filter(|&(_, &cost)| cost != UNREACHED)
            .filter_map(|(index, &cost)| Some((self.bounds.position(index)?, cost)))
    }

    /// Cells walked from the source to `target`, excluding the source.
    ///
    /// An unreachable target is logged and answered with `[target]` so that
    /// callers still have a direction to head in. Asking for the source
    /// itself also yields `[target]`.
    #[must_use]
    pub fn path_to(&self, target: Position) -> Vec<Position> {
        if self.cost(target).is_none() {
            error!(source = %self.source, target = %target, "path requested to unreachable cell");
            return vec![target];
        }

        let mut path = Vec::new();
        let mut cursor = target;
        while cursor != self.source {
            path.push(cursor);
            match self.predecessor(cursor) {
                Some(previous) => cursor = previous,
                None => break,
            }
        }
        path.reverse();

        if path.is_empty() {
            path.push(target);
        }
        path
    }

    /// Reachable cells bucketed by cost, for every cost in `0..=max_cost`.
    ///
    /// The buckets partition the reachable cells whose cost does not exceed
    /// `max_cost`; buckets may be empty.
    #[must_use]
    pub fn isochrones(&self, max_cost: u32) -> Vec<Vec<Position>> {
        let ring_count = usize::try_from(max_cost).map_or(0, |cost| cost.saturating_add(1));
        let mut rings = vec![Vec::new(); ring_count];
        for (position, cost) in self.reachable() {
            if cost > max_cost {
                continue;
            }
            if let Some(ring) = usize::try_from(cost).ok().and_then(|cost| rings.get_mut(cost)) {
                ring.push(position);
            }
        }
        rings
    }

    /// Predecessor links inverted into child lists.
    #[must_use]
    pub fn forward(&self) -> ForwardTree {
        let mut children = vec![Vec::new(); self.costs.len()];
        for (index, previous) in self.predecessors.iter().enumerate() {
            if let Some(previous) = previous {
                children[*previous].push(index);
            }
        }

        ForwardTree {
            bounds: self.bounds,
            root: self.bounds.index(self.source),
            children,
        }
    }

    /// Updates the map in place after the cells in `delta` changed passability.
    ///
    /// `passable` must describe the new rules. Cells cheaper than any opened
    /// cell could now be reached at, and outside the subtrees hanging off
    /// closed cells, keep their cost. Everything else is released and
    /// re-expanded from the retained cells bordering it.
    pub fn reevaluate<F>(&mut self, delta: &PassabilityDelta, mut passable: F)
    where
        F: FnMut(Position) -> bool,
    {
        if delta.is_empty() {
            return;
        }
        let Some(source_index) = self.bounds.index(self.source) else {
            return;
        };

        let cell_count = self.costs.len();
        let mut released = vec![false; cell_count];
        let mut borders = Vec::new();

        let mut threshold = UNREACHED;
        for &cell in delta.opened() {
            let Some(index) = self.bounds.index(cell) else {
                continue;
            };
            if index == source_index {
                continue;
            }
            borders.push(index);
            for neighbor in traverse::neighbors(cell, self.bounds) {
                if let Some(cost) = self.cost(neighbor) {
                    threshold = threshold.min(cost.saturating_add(1));
                }
            }
        }

        let forward = self.forward();
        let mut subtree = Vec::new();
        for &cell in delta.closed() {
            let Some(index) = self.bounds.index(cell) else {
                continue;
            };
            if index == source_index || self.costs[index] == UNREACHED {
                continue;
            }
            forward.collect_subtree(index, &mut subtree);
        }
        for index in subtree {
            if !released[index] {
                released[index] = true;
                borders.push(index);
            }
        }

        if threshold != UNREACHED {
            for (index, &cost) in self.costs.iter().enumerate() {
                let releasable = cost != UNREACHED && cost >= threshold;
                if index != source_index && releasable && !released[index] {
                    released[index] = true;
                    borders.push(index);
                }
            }
        }

        for &index in &borders {
            if released[index] {
                self.costs[index] = UNREACHED;
                self.predecessors[index] = None;
            }
        }

        let mut queue = WorkQueue::default();
        let mut seeded = vec![false; cell_count];
        for &index in &borders {
            let Some(cell) = self.bounds.position(index) else {
                continue;
            };
            for neighbor in traverse::neighbors(cell, self.bounds) {
                let Some(neighbor_index) = self.bounds.index(neighbor) else {
                    continue;
                };
                let cost = self.costs[neighbor_index];
                if cost == UNREACHED || seeded[neighbor_index] {
                    continue;
                }
                seeded[neighbor_index] = true;
                queue.push(cost, neighbor_index);
            }
        }

        self.expand(&mut queue, &mut passable);
    }

    fn expand<F>(&mut self, queue: &mut WorkQueue, passable: &mut F)
    where
        F: FnMut(Position) -> bool,
    {
        while let Some(Frontier { cost, index }) = queue.pop() {
            if self.costs[index] != cost {
                continue;
            }
            if self.max_cost.is_some_and(|max_cost| cost >= max_cost) {
                continue;
            }
            let Some(cell) = self.bounds.position(index) else {
                continue;
            };

            let next_cost = cost + 1;
            for neighbor in traverse::neighbors(cell, self.bounds) {
                let Some(neighbor_index) = self.bounds.index(neighbor) else {
                    continue;
                };

                let known = self.costs[neighbor_index];
                if known < next_cost {
                    continue;
                }
                if known == next_cost {
                    let previous = &mut self.predecessors[neighbor_index];
                    if previous.map_or(true, |previous| index < previous) {
                        *previous = Some(index);
                    }
                    continue;
                }
                if !passable(neighbor) {
                    continue;
                }

                self.costs[neighbor_index] = next_cost;
                self.predecessors[neighbor_index] = Some(index);
                queue.push(next_cost, neighbor_index);
            }
        }
    }
}

/// Child lists derived from a [`PathMap`]'s predecessor links.
#[derive(Clone, Debug)]
pub struct ForwardTree {
    bounds: GridBounds,
    root: Option<usize>,
    children: Vec<Vec<usize>>,
}

impl ForwardTree {
    /// Cells entered directly from `position`.
    pub fn children(&self, position: Position) -> impl Iterator<Item = Position> + '_ {
        self.bounds
            .index(position)
            .and_then(|index| self.children.get(index))
            .into_iter()
            .flatten()
            .filter_map(|&child| self.bounds.position(child))
    }

    /// Every reachable cell in breadth-first order from the source, so that a
    /// cell always appears after its predecessor.
    #[must_use]
    pub fn breadth_first(&self) -> Vec<Position> {
        let mut order = Vec::new();
        let Some(root) = self.root else {
            return order;
        };

        let mut indices = vec![root];
        let mut head = 0;
        while let Some(&index) = indices.get(head) {
            head += 1;
            indices.extend(self.children[index].iter().copied());
        }

        order.extend(
            indices
                .into_iter()
                .filter_map(|index| self.bounds.position(index)),
        );
        order
    }

    fn collect_subtree(&self, root: usize, out: &mut Vec<usize>) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(self.children[index].iter().copied());
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Frontier {
    cost: u32,
    index: usize,
}

/// Pending expansions kept sorted by descending cost so the cheapest pops last.
#[derive(Debug, Default)]
struct WorkQueue {
    entries: Vec<Frontier>,
}

impl WorkQueue {
    fn push(&mut self, cost: u32, index: usize) {
        let at = self.entries.partition_point(|entry| entry.cost > cost);
        self.entries.insert(at, Frontier { cost, index });
    }

    fn pop(&mut self) -> Option<Frontier> {
        self.entries.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(_: Position) -> bool {
        true
    }

    #[test]
    fn generate_measures_wrapped_distances() {
        let bounds = GridBounds::new(5, 3);
        let map = PathMap::generate(Position::new(0, 0), bounds, None, open);

        assert_eq!(map.cost(Position::new(0, 0)), Some(0));
        assert_eq!(map.cost(Position::new(4, 0)), Some(1));
        assert_eq!(map.cost(Position::new(2, 1)), Some(3));
        assert_eq!(map.cost(Position::new(3, 2)), Some(3));
    }

    #[test]
    fn generate_respects_walls() {
        let bounds = GridBounds::new(3, 1);
        let wall = Position::new(1, 0);
        let map = PathMap::generate(Position::new(0, 0), bounds, None, |cell| cell != wall);

        assert_eq!(map.cost(wall), None);
        assert_eq!(map.cost(Position::new(2, 0)), Some(1));
        assert_eq!(map.predecessor(Position::new(2, 0)), Some(Position::new(0, 0)));
    }

    #[test]
    fn generate_stops_at_cost_ceiling() {
        let bounds = GridBounds::new(9, 1);
        let map = PathMap::generate(Position::new(0, 0), bounds, Some(2), open);

        assert_eq!(map.cost(Position::new(2, 0)), Some(2));
        assert_eq!(map.cost(Position::new(7, 0)), Some(2));
        assert_eq!(map.cost(Position::new(3, 0)), None);
    }

    #[test]
    fn source_outside_grid_reaches_nothing() {
        let bounds = GridBounds::new(3, 3);
        let map = PathMap::generate(Position::new(5, 5), bounds, None, open);
        assert_eq!(map.reachable().count(), 0);
    }

    #[test]
    fn predecessor_chains_descend_by_one() {
        let bounds = GridBounds::new(6, 4);
        let wall = Position::new(2, 1);
        let map = PathMap::generate(Position::new(1, 1), bounds, None, |cell| cell != wall);

        for (cell, cost) in map.reachable() {
            if cell == map.source() {
                assert_eq!(cost, 0);
                continue;
            }
            let previous = map.predecessor(cell).expect("predecessor");
            assert_eq!(map.cost(previous), Some(cost - 1));
            assert_eq!(bounds.distance(previous, cell), 1);
        }
    }

    #[test]
    fn predecessors_prefer_lowest_index() {
        let bounds = GridBounds::new(5, 5);
        let map = PathMap::generate(Position::new(2, 2), bounds, None, open);
        assert_eq!(map.predecessor(Position::new(3, 3)), Some(Position::new(3, 2)));
    }

    #[test]
    fn path_to_excludes_source_and_ends_at_target() {
        let bounds = GridBounds::new(7, 3);
        let map = PathMap::generate(Position::new(1, 1), bounds, None, open);
        let path = map.path_to(Position::new(4, 1));

        assert_eq!(
            path,
            vec![Position::new(2, 1), Position::new(3, 1), Position::new(4, 1)]
        );
    }

    #[test]
    fn path_to_falls_back_for_unreachable_target() {
        let bounds = GridBounds::new(3, 1);
        let wall = Position::new(2, 0);
        let map = PathMap::generate(Position::new(0, 0), bounds, None, |cell| cell != wall);

        assert_eq!(map.path_to(wall), vec![wall]);
        assert_eq!(map.path_to(Position::new(0, 0)), vec![Position::new(0, 0)]);
    }

    #[test]
    fn isochrones_partition_reachable_cells() {
        let bounds = GridBounds::new(6, 5);
        let wall = Position::new(3, 2);
        let map = PathMap::generate(Position::new(0, 0), bounds, None, |cell| cell != wall);
        let rings = map.isochrones(20);

        let total: usize = rings.iter().map(Vec::len).sum();
        assert_eq!(total, map.reachable().count());
        for (cost, ring) in rings.iter().enumerate() {
            for &cell in ring {
                assert_eq!(map.cost(cell).map(|cost| cost as usize), Some(cost));
            }
        }
        assert_eq!(rings[0], vec![Position::new(0, 0)]);
    }

    #[test]
    fn truncated_isochrones_hold_exactly_the_cheap_cells() {
        let bounds = GridBounds::new(9, 7);
        let wall = Position::new(2, 3);
        let map = PathMap::generate(Position::new(1, 1), bounds, None, |cell| cell != wall);
        let furthest = map.reachable().map(|(_, cost)| cost).max().expect("reachable");
        let limit = 3;
        assert!(limit < furthest);

        let rings = map.isochrones(limit);
        assert_eq!(rings.len(), 4);

        let mut listed: Vec<Position> = rings.iter().flatten().copied().collect();
        let count = listed.len();
        listed.sort_unstable();
        listed.dedup();
        assert_eq!(listed.len(), count);

        let mut expected: Vec<Position> = map
            .reachable()
            .filter(|&(_, cost)| cost <= limit)
            .map(|(cell, _)| cell)
            .collect();
        expected.sort_unstable();
        assert_eq!(listed, expected);
    }

    #[test]
    fn delta_keeps_only_the_latest_change_per_cell() {
        let cell = Position::new(2, 1);
        let mut delta = PassabilityDelta::default();
        delta.close(cell);
        delta.open(cell);
        assert_eq!(delta.opened(), &[cell]);
        assert!(delta.closed().is_empty());

        delta.close(cell);
        assert!(delta.opened().is_empty());
        assert_eq!(delta.closed(), &[cell]);
    }

    #[test]
    fn breadth_first_lists_parents_before_children() {
        let bounds = GridBounds::new(4, 4);
        let map = PathMap::generate(Position::new(1, 2), bounds, None, open);
        let order = map.forward().breadth_first();

        assert_eq!(order.len(), 16);
        assert_eq!(order[0], Position::new(1, 2));
        for (position, &cell) in order.iter().enumerate().skip(1) {
            let previous = map.predecessor(cell).expect("predecessor");
            let parent_at = order.iter().position(|&other| other == previous);
            assert!(parent_at.is_some_and(|parent_at| parent_at < position));
        }
    }

    #[test]
    fn reevaluate_after_closing_matches_fresh_generation() {
        let bounds = GridBounds::new(6, 4);
        let source = Position::new(0, 1);
        let wall = Position::new(1, 1);
        let mut map = PathMap::generate(source, bounds, None, open);

        let mut delta = PassabilityDelta::default();
        delta.close(wall);
        map.reevaluate(&delta, |cell| cell != wall);

        let fresh = PathMap::generate(source, bounds, None, |cell| cell != wall);
        assert_eq!(map, fresh);
    }

    #[test]
    fn reevaluate_after_opening_matches_fresh_generation() {
        let bounds = GridBounds::new(7, 3);
        let source = Position::new(0, 0);
        let wall = Position::new(1, 0);
        let mut map = PathMap::generate(source, bounds, Some(5), |cell| cell != wall);

        let mut delta = PassabilityDelta::default();
        delta.open(wall);
        map.reevaluate(&delta, open);

        let fresh = PathMap::generate(source, bounds, Some(5), open);
        assert_eq!(map, fresh);
    }

    #[test]
    fn empty_delta_leaves_map_untouched() {
        let bounds = GridBounds::new(4, 4);
        let mut map = PathMap::generate(Position::new(0, 0), bounds, None, open);
        let before = map.clone();
        map.reevaluate(&PassabilityDelta::default(), |_| false);
        assert_eq!(map, before);
    }
}
