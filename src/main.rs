//! Sugarscape - CLI Entry Point

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use sugarscape::{Config, Sugarscape};

#[derive(Parser)]
#[command(name = "sugarscape")]
#[command(version)]
#[command(about = "Spatial artificial society simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Random seed for reproducibility (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Write one JSON log record per tick to this file
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            seed,
            log,
            quiet,
        } => run_simulation(config, steps, seed, log, quiet),

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }
    }
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn run_simulation(
    config_path: PathBuf,
    steps: u64,
    seed: Option<u64>,
    log_path: Option<PathBuf>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let (config, loaded) = if config_path.exists() {
        (Config::from_file(&config_path)?, true)
    } else {
        (Config::default(), false)
    };
    init_logging(&config.logging.log_level);
    if loaded {
        log::info!("Loaded config from {:?}", config_path);
    } else {
        log::info!("{:?} not found, using default configuration", config_path);
    }

    let width = config.environment.width;
    let height = config.environment.height;
    let model = config.decision.model;
    let stats_interval = config.logging.stats_interval.max(1);

    let mut sim = match seed.or(config.seed) {
        Some(s) => Sugarscape::new_with_seed(config, s)?,
        None => Sugarscape::new(config)?,
    };

    log::info!(
        "Starting simulation: {}x{} grid, {} agents, {} model, seed {}",
        width,
        height,
        sim.population(),
        model.name(),
        sim.seed()
    );

    let mut writer = match &log_path {
        Some(path) => {
            let mut w = BufWriter::new(File::create(path)?);
            writeln!(w, "{}", sim.stats.to_json_line()?)?;
            Some(w)
        }
        None => None,
    };

    let start = Instant::now();
    for _ in 0..steps {
        sim.step()?;

        if let Some(w) = writer.as_mut() {
            writeln!(w, "{}", sim.stats.to_json_line()?)?;
        }
        if !quiet && sim.timestep % stats_interval == 0 {
            println!("{}", sim.stats.summary());
        }
        if sim.is_extinct() {
            log::warn!("Population extinct at tick {}", sim.timestep);
            break;
        }
    }

    if let Some(mut w) = writer {
        w.flush()?;
    }

    let elapsed = start.elapsed();
    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Ticks: {}", sim.timestep);
    println!(
        "Speed: {:.1} ticks/s",
        sim.timestep as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("Final population: {}", sim.population());
    println!("Gini: {:.3}", sim.stats.gini);
    if let Some(path) = log_path {
        println!("Log: {:?}", path);
    }

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    log::info!("Configuration saved to {:?}", output);
    Ok(())
}
