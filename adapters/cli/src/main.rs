#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line bot that plays Pellet Rush over the referee's stdin/stdout protocol.

mod protocol;

use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Parser;
use pellet_rush_core::{Action, Intent, PlannerParams};
use pellet_rush_system_actor::Actor;
use pellet_rush_world::{apply, Beliefs};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments accepted by the bot.
#[derive(Debug, Parser)]
#[command(name = "pellet-rush", about = "Pellet collecting bot for the contest referee")]
struct Args {
    /// TOML file overriding the default planner parameters.
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,
    /// Seed for the planner's random sampling.
    #[arg(long)]
    seed: Option<u64>,
    /// Prints the effective parameters as TOML and exits.
    #[arg(long)]
    print_params: bool,
}

/// Entry point for the Pellet Rush command-line bot.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let params = load_params(&args)?;

    if args.print_params {
        let rendered = toml::to_string_pretty(&params).context("failed to render parameters")?;
        print!("{rendered}");
        return Ok(());
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    play(&mut stdin.lock(), &mut stdout.lock(), params)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_params(args: &Args) -> Result<PlannerParams> {
    let mut params = match &args.params {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read parameters from {}", path.display()))?;
            parse_params(&text)
                .with_context(|| format!("failed to parse parameters in {}", path.display()))?
        }
        None => PlannerParams::default(),
    };
    if let Some(seed) = args.seed {
        params.rng_seed = seed;
    }
    Ok(params)
}

fn parse_params(text: &str) -> Result<PlannerParams, toml::de::Error> {
    toml::from_str(text)
}

/// Runs the game loop until the referee closes the input.
fn play<R: BufRead, W: Write>(input: &mut R, output: &mut W, params: PlannerParams) -> Result<()> {
    let layout = protocol::read_layout(input).context("failed to read the maze layout")?;
    let bounds = layout.bounds();
    info!(width = bounds.width(), height = bounds.height(), "maze received");

    let mut beliefs = Beliefs::new(&layout, &params);
    let mut actor = Actor::new(params);
    let mut tick: u32 = 0;

    loop {
        let Some(turn) =
            protocol::read_turn(input).with_context(|| format!("failed to read turn {tick}"))?
        else {
            break;
        };
        let started = Instant::now();

        let intents = match turn.to_snapshot(tick) {
            Ok(snapshot) => {
                apply(&mut beliefs, &snapshot);
                actor.choose(&beliefs, started)
            }
            Err(error) => {
                error!(tick, %error, "discarding turn");
                turn.own_agents()
                    .into_iter()
                    .map(|agent| Intent::new(agent, Action::Wait))
                    .collect()
            }
        };

        writeln!(output, "{}", protocol::format_intents(&intents))
            .context("failed to write commands")?;
        output.flush().context("failed to flush commands")?;
        tick = tick.saturating_add(1);
    }

    info!(turns = tick, "input closed");
    Ok(())
}
