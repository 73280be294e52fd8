use pellet_rush_core::{traverse, GridBounds, Position};
use pellet_rush_world::navigation::{PassabilityDelta, PathMap};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TRIALS: usize = 200;
const TOGGLES_PER_TRIAL: usize = 6;

#[test]
fn reevaluation_matches_fresh_generation_under_random_toggles() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x7061_7468);

    for trial in 0..TRIALS {
        let width = rng.gen_range(2..=9);
        let height = rng.gen_range(1..=7);
        let bounds = GridBounds::new(width, height);
        let mut walls: Vec<bool> = (0..bounds.cell_count())
            .map(|_| rng.gen_bool(0.3))
            .collect();

        let source = Position::new(rng.gen_range(0..width), rng.gen_range(0..height));
        let max_cost = if rng.gen_bool(0.5) {
            Some(rng.gen_range(0..12))
        } else {
            None
        };

        let mut map =
            PathMap::generate(source, bounds, max_cost, |cell| is_open(&walls, bounds, cell));

        for step in 0..TOGGLES_PER_TRIAL {
            let mut delta = PassabilityDelta::default();
            for _ in 0..rng.gen_range(1..=3) {
                let index = rng.gen_range(0..bounds.cell_count());
                let cell = bounds.position(index).expect("cell in bounds");
                walls[index] = !walls[index];
                if walls[index] {
                    delta.close(cell);
                } else {
                    delta.open(cell);
                }
            }

            map.reevaluate(&delta, |cell| is_open(&walls, bounds, cell));
            let fresh =
                PathMap::generate(source, bounds, max_cost, |cell| is_open(&walls, bounds, cell));
            assert_eq!(
                map, fresh,
                "trial {trial} step {step} diverged on {width}x{height} from {source}"
            );
        }
    }
}

#[test]
fn reevaluation_survives_cells_toggled_back_and_forth() {
    let bounds = GridBounds::new(6, 6);
    let source = Position::new(0, 0);
    let mut walls = vec![false; bounds.cell_count()];
    let mut map = PathMap::generate(source, bounds, None, |_| true);

    for cell in traverse::neighbors(source, bounds) {
        let index = bounds.index(cell).expect("index");
        walls[index] = true;
        let mut delta = PassabilityDelta::default();
        delta.close(cell);
        map.reevaluate(&delta, |cell| is_open(&walls, bounds, cell));
    }
    assert_eq!(map.reachable().count(), 1);

    let reopened = Position::new(1, 0);
    walls[bounds.index(reopened).expect("index")] = false;
    let mut delta = PassabilityDelta::default();
    delta.open(reopened);
    map.reevaluate(&delta, |cell| is_open(&walls, bounds, cell));

    let fresh = PathMap::generate(source, bounds, None, |cell| is_open(&walls, bounds, cell));
    assert_eq!(map, fresh);
    assert_eq!(map.cost(Position::new(0, 1)), None);
    assert!(map.cost(Position::new(5, 5)).is_some());
}

fn is_open(walls: &[bool], bounds: GridBounds, cell: Position) -> bool {
    bounds
        .index(cell)
        .and_then(|index| walls.get(index))
        .is_some_and(|wall| !wall)
}
