use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use traffic_core::config::{self, SimConfig};
use traffic_core::generator;
use traffic_core::simulation::{NetworkSnapshot, TrafficManager, DEFAULT_MAX_ROUNDS};

#[derive(Parser)]
#[command(name = "traffic_core")]
#[command(about = "Microscopic discrete-time traffic simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario for a number of ticks
    Run {
        /// Topology document, optionally with a `car_list`
        #[arg(long)]
        scenario: PathBuf,

        /// Extra cars, as a JSON array
        #[arg(long)]
        cars: Option<PathBuf>,

        /// Defaults for attributes the input documents leave out
        #[arg(long)]
        defaults: Option<PathBuf>,

        /// Number of global ticks to run
        #[arg(long, default_value = "10")]
        ticks: u64,

        /// Seed for shuffling and random routes
        #[arg(long)]
        seed: Option<u64>,

        /// Upper bound on inner rounds per tick
        #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
        max_rounds: usize,

        /// Write a snapshot after every tick into this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },

    /// Print a generated topology as JSON
    Generate {
        #[command(subcommand)]
        kind: GenerateKind,
    },
}

#[derive(Subcommand)]
enum GenerateKind {
    /// Every node connected to every other node in both directions
    Complete {
        #[arg(long)]
        nodes: u64,
    },

    /// Random directed graph
    ErdosRenyi {
        #[arg(long)]
        nodes: u64,

        /// Probability of each directed edge
        #[arg(long, default_value = "0.5")]
        probability: f64,

        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            scenario,
            cars,
            defaults,
            ticks,
            seed,
            max_rounds,
            snapshot_dir,
        } => {
            let mut sim_config = SimConfig {
                max_rounds,
                seed,
                ..SimConfig::default()
            };
            if let Some(path) = defaults {
                sim_config.defaults = config::load_defaults(&path)?;
            }
            run(
                &scenario,
                cars.as_deref(),
                &sim_config,
                ticks,
                snapshot_dir.as_deref(),
            )
        }
        Command::Generate { kind } => {
            let topology = match kind {
                GenerateKind::Complete { nodes } => generator::complete_network(nodes),
                GenerateKind::ErdosRenyi {
                    nodes,
                    probability,
                    seed,
                } => {
                    let mut rng = match seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_os_rng(),
                    };
                    generator::erdos_renyi_network(nodes, probability, &mut rng)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&topology)?);
            Ok(())
        }
    }
}

fn run(
    scenario_path: &Path,
    cars_path: Option<&Path>,
    sim_config: &SimConfig,
    ticks: u64,
    snapshot_dir: Option<&Path>,
) -> Result<()> {
    let scenario = config::load_scenario(scenario_path)?;
    let mut car_list = scenario.car_list;
    if let Some(path) = cars_path {
        car_list.extend(config::load_cars(path)?);
    }

    let mut manager = TrafficManager::new(&scenario.topology, sim_config)
        .context("Failed to build the road network")?;

    let mut added = 0;
    for spec in &car_list {
        match manager.add_car(spec) {
            Ok(_) => added += 1,
            Err(err) => warn!("Skipping {}: {err}", spec.id),
        }
    }

    if let Some(dir) = snapshot_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    for _ in 0..ticks {
        let utilization = manager
            .tick()
            .with_context(|| format!("Tick {} failed", manager.timestamp()))?;
        match utilization {
            Some(ratio) => info!("Tick {}: utilization {:.3}", manager.timestamp(), ratio),
            None => info!("Tick {}: no car could move", manager.timestamp()),
        }
        if let Some(dir) = snapshot_dir {
            write_snapshot(dir, manager.timestamp(), &manager.get_snapshot())?;
        }
    }

    let network = manager.network();
    println!("=== Traffic Simulation Summary ===");
    println!("Ticks: {}", manager.timestamp());
    println!(
        "Intersections: {}, Roads: {}",
        network.roads().intersection_count(),
        network.roads().road_count()
    );
    println!("Cars added: {} of {}", added, car_list.len());
    println!("Cars completed: {}", network.completed_car_count());
    println!("Cars active: {}", network.active_car_count());
    Ok(())
}

fn write_snapshot(dir: &Path, tick: u64, snapshot: &NetworkSnapshot) -> Result<()> {
    let path = dir.join(format!("{tick}_snapshot.json"));
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}
