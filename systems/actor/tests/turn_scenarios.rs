use std::time::Instant;

use pellet_rush_core::{
    Action, AgentId, AgentKey, Form, GridLayout, PelletSighting, PlannerParams, Position, Sighting,
    TurnSnapshot,
};
use pellet_rush_system_actor::Actor;
use pellet_rush_world::{apply, Beliefs};

const COLUMN: [&str; 5] = ["# ###", "# ###", "# ###", "# ###", "# ###"];

fn own(id: u32, x: u32, y: u32) -> Sighting {
    Sighting {
        key: AgentKey::own(id),
        position: Position::new(x, y),
        form: Some(Form::Rock),
        speed_turns_left: 0,
        ability_cooldown: 10,
    }
}

fn beliefs_after(rows: &[&str], snapshot: &TurnSnapshot, params: &PlannerParams) -> Beliefs {
    let layout = GridLayout::from_rows(rows).expect("layout");
    let mut beliefs = Beliefs::new(&layout, params);
    apply(&mut beliefs, snapshot);
    beliefs
}

#[test]
fn agent_heads_straight_down_the_corridor_to_the_pellet() {
    let params = PlannerParams::default();
    let snapshot = TurnSnapshot {
        tick: 1,
        sightings: vec![own(0, 1, 1)],
        pellets: vec![PelletSighting {
            position: Position::new(1, 3),
            value: 1,
        }],
        ..TurnSnapshot::default()
    };
    let beliefs = beliefs_after(&COLUMN, &snapshot, &params);

    let intents = Actor::new(params).choose(&beliefs, Instant::now());

    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].agent, AgentId::new(0));
    assert_eq!(
        intents[0].action,
        Action::Move {
            target: Position::new(1, 3)
        }
    );
}

#[test]
fn agent_without_anything_to_collect_waits() {
    let params = PlannerParams::default();
    let snapshot = TurnSnapshot {
        tick: 1,
        sightings: vec![own(0, 1, 1)],
        ..TurnSnapshot::default()
    };
    let beliefs = beliefs_after(&COLUMN, &snapshot, &params);

    let intents = Actor::new(params).choose(&beliefs, Instant::now());

    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].action, Action::Wait);
}

#[test]
fn intents_cover_every_agent_in_id_order() {
    let params = PlannerParams {
        mirror_enemy_start: false,
        ..PlannerParams::default()
    };
    let rows = ["          "; 8];
    let snapshot = TurnSnapshot {
        tick: 1,
        sightings: vec![own(4, 7, 6), own(1, 2, 2), own(2, 5, 0)],
        pellets: vec![
            PelletSighting {
                position: Position::new(8, 3),
                value: 10,
            },
            PelletSighting {
                position: Position::new(0, 7),
                value: 10,
            },
        ],
        ..TurnSnapshot::default()
    };
    let beliefs = beliefs_after(&rows, &snapshot, &params);

    let intents = Actor::new(params).choose(&beliefs, Instant::now());

    let ids: Vec<u32> = intents.iter().map(|intent| intent.agent.get()).collect();
    assert_eq!(ids, vec![1, 2, 4]);
}

#[test]
fn every_agent_finds_work_on_an_unexplored_board() {
    let params = PlannerParams {
        mirror_enemy_start: false,
        ..PlannerParams::default()
    };
    let rows = ["          "; 8];
    let snapshot = TurnSnapshot {
        tick: 1,
        sightings: vec![own(0, 1, 1), own(1, 6, 4), own(2, 3, 6)],
        ..TurnSnapshot::default()
    };
    let beliefs = beliefs_after(&rows, &snapshot, &params);

    let intents = Actor::new(params).choose(&beliefs, Instant::now());

    assert_eq!(intents.len(), 3);
    assert!(intents
        .iter()
        .all(|intent| matches!(intent.action, Action::Move { .. })));
}
