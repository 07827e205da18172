// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/star_bootstrap.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/churn.yaml --seed 0x1234...

mod shuffle;

use std::env;
use std::fs;
use std::path::Path;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use thiserror::Error;

use shuffle::{SimConfig, SimError, SimRunner};

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Simulation configuration (missing fields use defaults)
    #[serde(default)]
    config: SimConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
    hypothesis: Option<String>,
}

#[derive(Debug, Error)]
enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid seed: {0}")]
    Seed(String),

    #[error(transparent)]
    Simulation(#[from] SimError),
}

fn main() {
    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX]", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/star_bootstrap.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/churn.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    let result = parse_seed_arg(&args).and_then(|seed| {
        if path.is_dir() {
            run_scenario_directory(path, seed)
        } else {
            run_scenario_file(path, seed)
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_seed_arg(args: &[String]) -> Result<Option<[u8; 32]>, ScenarioError> {
    if args.len() >= 4 && args[2] == "--seed" {
        parse_seed_hex(&args[3]).map(Some)
    } else {
        Ok(None)
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) -> Result<(), ScenarioError> {
    let entries = fs::read_dir(dir).map_err(|source| ScenarioError::Read {
        path: dir.display().to_string(),
        source,
    })?;

    let mut scenarios: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    scenarios.sort();

    if scenarios.is_empty() {
        println!("No .yaml files found in {}", dir.display());
        return Ok(());
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                  ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, seed)?;
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    Ok(())
}

fn load_scenario(path: &Path) -> Result<ScenarioFile, ScenarioError> {
    let yaml_content = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.display().to_string(),
        source,
    })?;

    serde_yaml::from_str(&yaml_content).map_err(|source| ScenarioError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) -> Result<(), ScenarioError> {
    println!("Loading scenario from: {}", path.display());
    let scenario = load_scenario(path)?;

    // Print scenario header
    let name = scenario.meta.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario")
            .to_string()
    });
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  {}{}║", name, " ".repeat(54_usize.saturating_sub(name.len())));
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let mut config = scenario.config;
    config.seed = seed;

    println!("Configuration:");
    println!("  Rounds: {}", config.rounds);
    println!("  Initial Peers: {}", config.initial_state.num_peers);
    println!("  Topology: {:?}", config.initial_state.topology);
    println!(
        "  Cache size: {}, shuffle length: {}",
        config.shuffle.cache_size, config.shuffle.shuffle_length
    );
    println!("  Scheduled events: {}", config.events.events.len());
    println!("\nStarting simulation...\n");

    let result = SimRunner::new(config)?.run()?;
    result.print_summary();

    println!("\n✓ Scenario complete!\n");
    Ok(())
}

fn parse_seed_hex(hex: &str) -> Result<[u8; 32], ScenarioError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte_str =
            std::str::from_utf8(chunk).map_err(|e| ScenarioError::Seed(e.to_string()))?;
        seed[i] =
            u8::from_str_radix(byte_str, 16).map_err(|e| ScenarioError::Seed(e.to_string()))?;
    }

    Ok(seed)
}
