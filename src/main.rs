//! Neatwork demo CLI - evolve a XOR solver from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use neatwork::{EngineConfig, FrozenNetwork, MutationRates, NeatEngine};

const XOR_CASES: [([f32; 2], f32); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(&args[0]);
        return;
    }

    if args.iter().any(|a| a == "--example") {
        print_example_config();
        return;
    }

    let generations: u64 = args
        .iter()
        .position(|a| a == "--generations")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(300);

    let config = match args.get(1).filter(|a| !a.starts_with("--")) {
        Some(path) => {
            let path = PathBuf::from(path);
            let config_str = fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => default_config(),
    };

    run_xor(config, generations);
}

fn default_config() -> EngineConfig {
    EngineConfig {
        inputs: 2,
        outputs: 1,
        population_size: 150,
        mutation_rates: MutationRates::STANDARD,
        ..EngineConfig::default()
    }
}

fn run_xor(config: EngineConfig, generations: u64) {
    if config.inputs != 2 || config.outputs != 1 {
        eprintln!("The XOR demo needs inputs = 2 and outputs = 1");
        std::process::exit(1);
    }

    let mut engine = NeatEngine::new(&config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = engine.set_stagnation_limit(40) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let population = engine.population_size();
    let start = Instant::now();

    for generation in 0..generations {
        for i in 0..population {
            let mut error = 0.0;
            for (inputs, target) in &XOR_CASES {
                match engine.guess(i, inputs) {
                    Ok(out) => error += (out[0] - target).abs(),
                    Err(e) => {
                        eprintln!("Inference failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            // Squared so near-solutions pull ahead; floored above the
            // engine's fitness epsilon.
            let fitness = (4.0 - error).powi(2).max(0.01);
            if let Err(e) = engine.set_fitness(i, fitness) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        engine.next_generation();

        if generation % 25 == 0 {
            let best = engine.champion_fitness().unwrap_or(0.0);
            println!(
                "generation {:4}  species {:2}  best fitness {:.3}",
                generation,
                engine.species_count(),
                best
            );
        }

        // 16.0 is a perfect score; close enough is solved.
        if engine.champion_fitness().unwrap_or(0.0) > 15.5 {
            println!("solved in {} generations", generation + 1);
            break;
        }
    }

    println!("elapsed: {:.2?}", start.elapsed());

    if !engine.has_champion() {
        println!("no champion was produced");
        return;
    }

    println!(
        "champion: fitness {:.3}, {} active connections",
        engine.champion_fitness().unwrap_or(0.0),
        engine.champion_connection_count().unwrap_or(0),
    );

    // Show the exported champion running standalone.
    let descriptor = match engine.export_champion() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Export failed: {}", e);
            std::process::exit(1);
        }
    };
    let mut frozen = FrozenNetwork::from_descriptor(&descriptor);
    for (inputs, target) in &XOR_CASES {
        match frozen.guess(inputs) {
            Ok(out) => println!(
                "  {:?} -> {:+.4} (target {})",
                inputs, out[0], target
            ),
            Err(e) => eprintln!("  {:?} -> error: {}", inputs, e),
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [config.json] [--generations N]", program);
    eprintln!();
    eprintln!("Evolve a XOR solver with a NEAT-style engine.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json     Engine configuration (defaults to a standard XOR setup)");
    eprintln!("  --generations   Maximum generations to run (default: 300)");
    eprintln!("  --example       Print an example configuration and exit");
}

fn print_example_config() {
    let config = default_config();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}
