//! vector-cycle host entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedCollector  BoardStateCollector  LogVectorSink        │
//! │  (SampleCollector)   (SampleCollector)    (VectorSink)         │
//! │  LineCommands (CommandSource, stdin)                           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              CycleEngine (pure logic)                  │    │
//! │  │  Filters · Math · Redundancy · LimitGuard              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Runner (cadence loop + command thread)                        │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};

use vector_cycle::adapters::{LineCommands, LogVectorSink, SimulatedCollector, SimulatedSensor};
use vector_cycle::app::{EngineBuilder, Runner};
use vector_cycle::config::EngineConfig;
use vector_cycle::decision::{LimitGuard, LimitGuardConfig};
use vector_cycle::rows::{self, ConfigRow};
use vector_cycle::sensors::{ConnectionState, InputConfig};
use vector_cycle::sync::{BoardRegistry, BoardStateCollector, CancellationToken};

/// Rows used when no rows file is given.
const DEMO_ROWS: &str = "\
RedundantSensors;oven_temp;temp_a;temp_b;temp_c
RedundantValidRange;oven_temp;0;1000
RedundantInvalidDefault;oven_temp;10000
Math;oven_temp_f;oven_temp * 1.8 + 32
Math;heater;if(oven_temp < 180, 1, 0)
Filter;temp_a;Average;2;temp_a
Filter;hot;Sustained;5;oven_temp > 190
";

const DEMO_SENSORS: [&str; 3] = ["temp_a@abox", "temp_b@bbox", "temp_c@cbox"];

/// Deterministic vector-cycle engine over simulated boards
#[derive(Parser, Debug)]
#[command(name = "vector-cycle", version, long_about = None)]
struct Args {
    /// JSON engine config (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Semicolon-separated config rows (Math, Filter, Redundant*)
    #[arg(short, long)]
    rows: Option<PathBuf>,

    /// Simulated sensor as NAME@BOARD; repeat for more
    #[arg(short, long = "sensor")]
    sensors: Vec<String>,

    /// Field watched by the limit guard
    #[arg(long, default_value = "oven_temp")]
    guard_sensor: String,

    /// Limit guard trip point
    #[arg(long, default_value_t = 250.0)]
    guard_max: f64,

    /// Fields the limit guard forces to 0 while tripped
    #[arg(long, default_value = "heater")]
    guard_outputs: Vec<String>,

    /// Stop after this many cycles (0 = run until `escape`)
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// Log every Nth vector
    #[arg(long, default_value_t = 10)]
    log_every: u64,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_json(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.validate().context("invalid engine config")?;

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        config.log_level.parse().unwrap_or(log::LevelFilter::Info)
    };
    // RUST_LOG still wins over the config level.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("vector-cycle {} starting", env!("CARGO_PKG_VERSION"));

    let token = CancellationToken::new();
    let boards = Arc::new(BoardRegistry::new());
    let sensors = simulated_sensors(&args.sensors, &boards, &token)?;
    for board in boards.names(&token)? {
        boards.set_state(&board, ConnectionState::ReceivingValues, &token)?;
    }

    let row_text = match &args.rows {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading rows {}", path.display()))?,
        None => DEMO_ROWS.to_string(),
    };
    let config_rows: Vec<ConfigRow> = row_text
        .lines()
        .enumerate()
        .map(|(i, line)| ConfigRow::new(i + 1, line))
        .filter(|row| !row.fields.is_empty())
        .collect();

    let mut builder = EngineBuilder::new(config.clone())
        .with_token(token.clone())
        .collector(BoardStateCollector::new(Arc::clone(&boards), token.clone())?)
        .collector(SimulatedCollector::new(sensors, Arc::clone(&boards), token.clone()))
        .sink(LogVectorSink::new(args.log_every))
        .command("board", board_command(Arc::clone(&boards), token.clone()));

    let engine_rows = rows::parse_rows(
        &config_rows,
        |sensor| builder.board_states_for(sensor),
        config.redundant_invalid_value_delay_secs,
    )?;
    builder = builder.rows(engine_rows);

    if args.guard_outputs.is_empty() {
        warn!("limit guard has no outputs; it will only report");
    }
    builder = builder.safety_decision(LimitGuard::new(LimitGuardConfig {
        name: "overtemp".into(),
        sensor: args.guard_sensor.clone(),
        max: args.guard_max,
        outputs: args.guard_outputs.clone(),
        safe_value: 0.0,
    }));

    let engine = builder.build().context("building engine")?;
    info!("fields: {}", engine.description().descriptors().collect::<Vec<_>>().join(", "));
    info!("type `help` for commands, `escape` to stop");

    let mut runner = Runner::new(engine, config.cycle_period());
    if args.cycles > 0 {
        runner = runner.with_max_cycles(args.cycles);
    }
    let engine = runner.run(LineCommands::stdin());
    info!("stopped after {} cycles", engine.cycles());
    Ok(())
}

/// Register the board of every `NAME@BOARD` argument and build its
/// simulated sensor.
fn simulated_sensors(
    args: &[String],
    boards: &BoardRegistry,
    token: &CancellationToken,
) -> Result<Vec<SimulatedSensor>> {
    let args: Vec<&str> = if args.is_empty() {
        DEMO_SENSORS.to_vec()
    } else {
        args.iter().map(String::as_str).collect()
    };

    let mut sensors = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let Some((name, board)) = arg.split_once('@') else {
            bail!("sensor '{arg}' is not NAME@BOARD");
        };
        if boards.get(board, token)?.is_none() {
            boards.register(board, &format!("sim{i}"), token)?;
        }
        sensors.push(SimulatedSensor {
            input: Arc::new(InputConfig::new(name).on_board(board)),
            base: 180.0 + 2.0 * i as f64,
            amplitude: 15.0,
        });
    }
    Ok(sensors)
}

/// `board <name> connect|disconnect`: flip a simulated board's state from
/// the console.
fn board_command(
    boards: Arc<BoardRegistry>,
    token: CancellationToken,
) -> impl Fn(&[&str]) -> bool + Send + Sync + 'static {
    move |args| {
        let [_, name, action] = args else {
            return false;
        };
        let state = match action.to_ascii_lowercase().as_str() {
            "connect" => ConnectionState::ReceivingValues,
            "disconnect" => ConnectionState::Disconnected,
            _ => return false,
        };
        boards.set_state(name, state, &token).unwrap_or(false)
    }
}
