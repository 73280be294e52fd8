use std::io::{self, BufRead};

use pellet_rush_core::{
    Action, AgentId, AgentKey, CoreError, Form, GridLayout, Intent, PelletSighting, Position,
    Sighting, Team, TurnSnapshot,
};
use thiserror::Error;
use tracing::warn;

/// Form tag the referee sends for eliminated agents.
const DEAD_TAG: &str = "DEAD";
/// Separator placed between the commands of one turn.
const COMMAND_SEPARATOR: &str = " | ";

/// Errors raised while reading the referee's input.
#[derive(Debug, Error)]
pub(crate) enum ProtocolError {
    /// Reading from the input stream failed.
    #[error("failed to read referee input")]
    Io(#[from] io::Error),
    /// The input ended part-way through a message.
    #[error("input ended while reading {0}")]
    UnexpectedEof(&'static str),
    /// A line did not have the expected shape.
    #[error("malformed {what}: `{line}`")]
    Malformed {
        /// Part of the message being read.
        what: &'static str,
        /// Offending line.
        line: String,
    },
    /// The layout rows could not be turned into a grid.
    #[error("invalid maze layout")]
    Layout(#[source] CoreError),
}

/// Agent line exactly as the referee reported it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawPac {
    key: AgentKey,
    position: Position,
    form_tag: String,
    speed_turns_left: u32,
    ability_cooldown: u32,
}

/// One turn of referee input before form tags are interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawTurn {
    own_score: u32,
    enemy_score: u32,
    pacs: Vec<RawPac>,
    pellets: Vec<PelletSighting>,
}

impl RawTurn {
    /// Interprets the turn as the snapshot for `tick`.
    pub(crate) fn to_snapshot(&self, tick: u32) -> Result<TurnSnapshot, CoreError> {
        let sightings = self
            .pacs
            .iter()
            .map(|pac| {
                let form = match pac.form_tag.as_str() {
                    DEAD_TAG => None,
                    tag => Some(tag.parse::<Form>()?),
                };
                Ok(Sighting {
                    key: pac.key,
                    position: pac.position,
                    form,
                    speed_turns_left: pac.speed_turns_left,
                    ability_cooldown: pac.ability_cooldown,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(TurnSnapshot {
            tick,
            own_score: self.own_score,
            enemy_score: self.enemy_score,
            sightings,
            pellets: self.pellets.clone(),
        })
    }

    /// Identifiers of the live own agents listed this turn.
    pub(crate) fn own_agents(&self) -> Vec<AgentId> {
        self.pacs
            .iter()
            .filter(|pac| pac.key.team() == Team::Own && pac.form_tag != DEAD_TAG)
            .map(|pac| pac.key.id())
            .collect()
    }
}

/// Reads the grid dimensions and rows sent before the first turn.
pub(crate) fn read_layout<R: BufRead>(input: &mut R) -> Result<GridLayout, ProtocolError> {
    let line = expect_line(input, "grid dimensions")?;
    let [width, height] = parse_fields::<2>(&line, "grid dimensions")?;

    let mut rows = Vec::new();
    for _ in 0..height {
        rows.push(expect_line(input, "grid row")?);
    }
    let layout = GridLayout::from_rows(&rows).map_err(ProtocolError::Layout)?;
    if layout.bounds().width() != width {
        warn!(
            announced = width,
            found = layout.bounds().width(),
            "grid width differs from the announced dimensions"
        );
    }
    Ok(layout)
}

/// Reads one turn, or `None` when the input closed between turns.
pub(crate) fn read_turn<R: BufRead>(input: &mut R) -> Result<Option<RawTurn>, ProtocolError> {
    let Some(line) = next_line(input)? else {
        return Ok(None);
    };
    let [own_score, enemy_score] = parse_fields::<2>(&line, "scores")?;

    let pac_count = parse_count(&expect_line(input, "agent count")?, "agent count")?;
    let mut pacs = Vec::new();
    for _ in 0..pac_count {
        pacs.push(parse_pac(&expect_line(input, "agent")?)?);
    }

    let pellet_count = parse_count(&expect_line(input, "pellet count")?, "pellet count")?;
    let mut pellets = Vec::new();
    for _ in 0..pellet_count {
        let line = expect_line(input, "pellet")?;
        let [x, y, value] = parse_fields::<3>(&line, "pellet")?;
        pellets.push(PelletSighting {
            position: Position::new(x, y),
            value,
        });
    }

    Ok(Some(RawTurn {
        own_score,
        enemy_score,
        pacs,
        pellets,
    }))
}

/// Renders the intents as a single command line.
pub(crate) fn format_intents(intents: &[Intent]) -> String {
    intents
        .iter()
        .map(format_intent)
        .collect::<Vec<_>>()
        .join(COMMAND_SEPARATOR)
}

fn format_intent(intent: &Intent) -> String {
    let id = intent.agent.get();
    let mut command = match intent.action {
        Action::Move { target } => format!("MOVE {id} {} {}", target.x(), target.y()),
        Action::Switch { form } => format!("SWITCH {id} {form}"),
        Action::Speed => format!("SPEED {id}"),
        Action::Wait => format!("WAIT {id}"),
    };
    if let Some(annotation) = &intent.annotation {
        command.push(' ');
        command.push_str(annotation);
    }
    command
}

fn parse_pac(line: &str) -> Result<RawPac, ProtocolError> {
    let malformed = || ProtocolError::Malformed {
        what: "agent",
        line: line.to_owned(),
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let &[id, mine, x, y, form_tag, speed_turns_left, ability_cooldown] = fields.as_slice() else {
        return Err(malformed());
    };

    let number = |field: &str| field.parse::<u32>().map_err(|_| malformed());
    let id = number(id)?;
    let key = if mine == "0" {
        AgentKey::enemy(id)
    } else {
        AgentKey::own(id)
    };

    Ok(RawPac {
        key,
        position: Position::new(number(x)?, number(y)?),
        form_tag: form_tag.to_owned(),
        speed_turns_left: number(speed_turns_left)?,
        ability_cooldown: number(ability_cooldown)?,
    })
}

fn parse_fields<const N: usize>(
    line: &str,
    what: &'static str,
) -> Result<[u32; N], ProtocolError> {
    let malformed = || ProtocolError::Malformed {
        what,
        line: line.to_owned(),
    };
    let mut values = [0; N];
    let mut fields = line.split_whitespace();
    for value in &mut values {
        *value = fields
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(malformed)?;
    }
    if fields.next().is_some() {
        return Err(malformed());
    }
    Ok(values)
}

fn parse_count(line: &str, what: &'static str) -> Result<usize, ProtocolError> {
    line.trim().parse().map_err(|_| ProtocolError::Malformed {
        what,
        line: line.to_owned(),
    })
}

fn next_line<R: BufRead>(input: &mut R) -> Result<Option<String>, ProtocolError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with(['\n', '\r']) {
        let _ = line.pop();
    }
    Ok(Some(line))
}

fn expect_line<R: BufRead>(input: &mut R, what: &'static str) -> Result<String, ProtocolError> {
    next_line(input)?.ok_or(ProtocolError::UnexpectedEof(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = "5 3\n#####\n #   \n#####\n";

    #[test]
    fn layout_keeps_significant_spaces() {
        let layout = read_layout(&mut LAYOUT.as_bytes()).expect("layout parses");

        assert_eq!(layout.bounds().width(), 5);
        assert_eq!(layout.bounds().height(), 3);
        assert!(!layout.is_wall(Position::new(0, 1)));
        assert!(layout.is_wall(Position::new(1, 1)));
        assert!(!layout.is_wall(Position::new(4, 1)));
    }

    #[test]
    fn ragged_layout_is_rejected() {
        let error = read_layout(&mut "3 2\n###\n#\n".as_bytes()).expect_err("rows differ");
        assert!(matches!(error, ProtocolError::Layout(CoreError::RaggedLayout { .. })));
    }

    #[test]
    fn oversized_dimensions_fail_on_missing_rows() {
        let input = "5 4000000000\n#####\n";
        let error = read_layout(&mut input.as_bytes()).expect_err("rows missing");
        assert!(matches!(error, ProtocolError::UnexpectedEof("grid row")));
    }

    #[test]
    fn oversized_counts_fail_on_missing_lines() {
        let input = "0 0\n18446744073709551615\n0 1 0 1 ROCK 0 0\n";
        let error = read_turn(&mut input.as_bytes()).expect_err("agents missing");
        assert!(matches!(error, ProtocolError::UnexpectedEof("agent")));
    }

    #[test]
    fn turn_is_read_and_interpreted() {
        let input = "10 7\n3\n0 1 0 1 ROCK 0 0\n1 1 4 1 DEAD 0 0\n2 0 3 1 PAPER 5 9\n1\n2 1 10\n";
        let turn = read_turn(&mut input.as_bytes())
            .expect("turn parses")
            .expect("turn present");

        let snapshot = turn.to_snapshot(4).expect("known forms");
        assert_eq!(snapshot.tick, 4);
        assert_eq!((snapshot.own_score, snapshot.enemy_score), (10, 7));
        assert_eq!(snapshot.sightings.len(), 3);
        assert_eq!(snapshot.sightings[1].form, None);
        assert_eq!(snapshot.sightings[2].key, AgentKey::enemy(2));
        assert_eq!(snapshot.sightings[2].speed_turns_left, 5);
        assert_eq!(
            snapshot.pellets,
            vec![PelletSighting {
                position: Position::new(2, 1),
                value: 10
            }]
        );
        assert_eq!(turn.own_agents(), vec![AgentId::new(0)]);
    }

    #[test]
    fn unknown_form_fails_interpretation_only() {
        let input = "0 0\n1\n0 1 0 1 LIZARD 0 0\n0\n";
        let turn = read_turn(&mut input.as_bytes())
            .expect("turn parses")
            .expect("turn present");

        assert_eq!(
            turn.to_snapshot(0),
            Err(CoreError::UnknownForm("LIZARD".to_owned()))
        );
        assert_eq!(turn.own_agents(), vec![AgentId::new(0)]);
    }

    #[test]
    fn closed_input_between_turns_ends_cleanly() {
        assert_eq!(read_turn(&mut "".as_bytes()).expect("no error"), None);
    }

    #[test]
    fn truncated_turn_is_an_error() {
        let input = "0 0\n2\n0 1 0 1 ROCK 0 0\n";
        let error = read_turn(&mut input.as_bytes()).expect_err("truncated");
        assert!(matches!(error, ProtocolError::UnexpectedEof("agent")));
    }

    #[test]
    fn malformed_agent_line_is_reported() {
        let input = "0 0\n1\n0 1 zero 1 ROCK 0 0\n0\n";
        let error = read_turn(&mut input.as_bytes()).expect_err("bad x");
        assert!(matches!(error, ProtocolError::Malformed { what: "agent", .. }));
    }

    #[test]
    fn intents_are_joined_with_annotations() {
        let intents = [
            Intent::new(
                AgentId::new(0),
                Action::Move {
                    target: Position::new(3, 4),
                },
            )
            .annotated("1.87"),
            Intent::new(AgentId::new(1), Action::Switch { form: Form::Paper }),
            Intent::new(AgentId::new(2), Action::Speed),
            Intent::new(AgentId::new(3), Action::Wait),
        ];

        assert_eq!(
            format_intents(&intents),
            "MOVE 0 3 4 1.87 | SWITCH 1 PAPER | SPEED 2 | WAIT 3"
        );
    }
}
