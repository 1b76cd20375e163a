//! SkyNet - airspace traffic controller command line.
//!
//! Every invocation loads the saved state, runs one command and saves
//! again when the command changed anything.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use skynet_cli::config::Config;
use skynet_cli::{demo, report};
use skynet_core::{AircraftType, FlightRequest, NodeId, TrafficController};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Airspace traffic controller: routing, landing queue and flight log
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Registry save file (overrides SKYNET_SAVE_FILE)
    #[arg(long, global = true)]
    save_file: Option<PathBuf>,

    /// Flight log file (overrides SKYNET_LOG_FILE)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new flight at the first free node
    Add {
        flight_id: String,
        #[arg(long, default_value = "Unknown")]
        model: String,
        #[arg(long, default_value = "JFK")]
        origin: String,
        #[arg(long, default_value = "LHR")]
        destination: String,
        /// Fuel percentage (0-100)
        #[arg(long, default_value_t = 100.0)]
        fuel: f64,
        #[arg(long = "type", value_enum, default_value_t = KindArg::Commercial)]
        kind: KindArg,
    },
    /// Raise a flight to CRITICAL priority
    Emergency { flight_id: String },
    /// Land the most urgent flights
    Land {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Move a flight to another node (name or id)
    Move { flight_id: String, target: String },
    /// Show one flight
    Search { flight_id: String },
    /// Safe route for a flight, or the shortest path between two nodes
    Route {
        flight_id: Option<String>,
        #[arg(long, requires = "to", conflicts_with = "flight_id")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
    /// Landed flights in arrival order
    Log,
    /// Flights waiting to land
    Queue,
    /// Every registered flight
    Registry,
    /// Radar grid, nodes and corridors
    Airspace,
    /// Add random flights and move them around
    Demo {
        #[arg(long, default_value_t = 5)]
        flights: usize,
        #[arg(long, default_value_t = 10)]
        moves: usize,
        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Commercial,
    Cargo,
    Private,
    Emergency,
}

impl From<KindArg> for AircraftType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Commercial => AircraftType::Commercial,
            KindArg::Cargo => AircraftType::Cargo,
            KindArg::Private => AircraftType::Private,
            KindArg::Emergency => AircraftType::Emergency,
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output stays parseable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skynet_core=info".parse()?)
                .add_directive("skynet_cli=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(path) = args.save_file {
        config.save_file = path;
    }
    if let Some(path) = args.log_file {
        config.log_file = path;
    }

    let mut atc = TrafficController::with_default_airspace(config.limits.clone())
        .context("failed to build the default airspace")?;
    match atc.load(&config.save_file, &config.log_file) {
        Ok(summary) => tracing::debug!(?summary, "saved state restored"),
        Err(err) => tracing::warn!(error = %err, "no usable save file, starting fresh"),
    }

    let changed = run(&mut atc, args.command, args.json)?;
    if changed {
        atc.save(&config.save_file, &config.log_file)
            .with_context(|| format!("failed to save to {}", config.save_file.display()))?;
    }
    Ok(())
}

/// Execute one command. Returns true when state changed.
fn run(atc: &mut TrafficController, command: Command, as_json: bool) -> Result<bool> {
    match command {
        Command::Add {
            flight_id,
            model,
            origin,
            destination,
            fuel,
            kind,
        } => {
            let node = atc.add_flight(FlightRequest {
                flight_id: flight_id.clone(),
                model,
                origin,
                destination,
                fuel,
                aircraft_type: kind.into(),
            })?;
            let aircraft = atc.search(&flight_id)?;
            if as_json {
                print_json(&report::aircraft_json(atc.graph(), aircraft))?;
            } else {
                let name = atc.graph().node(node).map(|n| n.name.as_str()).unwrap_or("?");
                println!(
                    "Flight {} entered the airspace at {} with {} priority",
                    flight_id,
                    name,
                    aircraft.priority().label()
                );
            }
            Ok(true)
        }
        Command::Emergency { flight_id } => {
            atc.declare_emergency(&flight_id)?;
            if as_json {
                print_json(&json!({ "flight_id": flight_id, "priority": "critical" }))?;
            } else {
                println!("EMERGENCY declared for {flight_id}: priority CRITICAL");
            }
            Ok(true)
        }
        Command::Land { count } => {
            let mut landed = Vec::new();
            for _ in 0..count {
                match atc.land_next()? {
                    Some(landing) => landed.push(landing),
                    None => break,
                }
            }
            if as_json {
                print_json(&serde_json::to_value(&landed)?)?;
            } else if landed.is_empty() {
                println!("No flights waiting to land");
            } else {
                for landing in &landed {
                    println!("{}", report::landing_line(atc.graph(), landing));
                }
            }
            Ok(!landed.is_empty())
        }
        Command::Move { flight_id, target } => {
            let target = resolve_node(atc, &target)?;
            let moved = atc.move_aircraft(&flight_id, target)?;
            if as_json {
                print_json(&serde_json::to_value(&moved)?)?;
            } else {
                println!("{}", report::move_line(atc.graph(), &moved));
            }
            Ok(true)
        }
        Command::Search { flight_id } => {
            let aircraft = atc.search(&flight_id)?;
            if as_json {
                print_json(&report::aircraft_json(atc.graph(), aircraft))?;
            } else {
                println!("{}", report::aircraft_details(atc.graph(), aircraft));
            }
            Ok(false)
        }
        Command::Route { flight_id, from, to } => {
            let route = match (flight_id, from, to) {
                (Some(flight_id), _, _) => atc.find_safe_route(&flight_id)?,
                (None, Some(from), Some(to)) => {
                    let from = resolve_node(atc, &from)?;
                    let to = resolve_node(atc, &to)?;
                    atc.route_between(from, to)?
                }
                _ => bail!("give a flight id, or both --from and --to"),
            };
            if as_json {
                print_json(&report::route_json(atc.graph(), &route))?;
            } else {
                println!("{}", report::route_line(atc.graph(), &route));
            }
            Ok(false)
        }
        Command::Log => {
            if as_json {
                print_json(&report::log_json(atc))?;
            } else {
                println!("{}", report::log_table(atc));
            }
            Ok(false)
        }
        Command::Queue => {
            if as_json {
                print_json(&report::queue_json(atc))?;
            } else {
                println!("{}", report::queue_table(atc));
            }
            Ok(false)
        }
        Command::Registry => {
            if as_json {
                print_json(&report::registry_json(atc))?;
            } else {
                println!("{}", report::registry_table(atc));
            }
            Ok(false)
        }
        Command::Airspace => {
            if as_json {
                print_json(&report::airspace_json(atc.graph()))?;
            } else {
                println!("{}", report::airspace_map(atc.graph()));
            }
            Ok(false)
        }
        Command::Demo {
            flights,
            moves,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let summary = demo::run_demo(atc, &mut rng, flights, moves);
            if as_json {
                print_json(&json!({
                    "added": summary.added,
                    "moves": summary.moves,
                    "collisions": summary.collisions,
                    "rejected": summary.rejected,
                }))?;
            } else {
                println!("Added {} flights: {}", summary.added.len(), summary.added.join(", "));
                for moved in &summary.moves {
                    println!("  {}", report::move_line(atc.graph(), moved));
                }
                println!(
                    "{} moves, {} collision alerts, {} rejected",
                    summary.moves.len(),
                    summary.collisions,
                    summary.rejected
                );
            }
            Ok(!summary.added.is_empty() || !summary.moves.is_empty())
        }
    }
}

/// Accept a node name (case-insensitive) or a numeric id.
fn resolve_node(atc: &TrafficController, value: &str) -> Result<NodeId> {
    if let Some(id) = atc.graph().find_node_by_name(value) {
        return Ok(id);
    }
    match value.parse::<NodeId>() {
        Ok(id) if atc.graph().node_exists(id) => Ok(id),
        _ => bail!("unknown node '{value}'"),
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
