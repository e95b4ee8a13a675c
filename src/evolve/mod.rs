//! Evolutionary core: genomes, innovation tracking, speciation, and the
//! population controller.
//!
//! # Overview
//!
//! The engine evolves variable-structure feed-forward networks in the NEAT
//! style:
//!
//! - **Innovation registry** (`innovation`): run-scoped structural identity
//!   for connection genes, the anchor for crossover alignment
//! - **Genome** (`genome`): gene list + derived evaluation graph, the four
//!   mutation operators, and the forward pass
//! - **Species** (`species`): compatibility clustering, fitness sharing,
//!   crossover, quota reproduction
//! - **Engine** (`engine`): the per-generation state machine and the
//!   caller-facing surface
//! - **Export** (`export`): pruning and dense remapping of a frozen genome
//!
//! Fitness is assigned externally between generations; the engine is
//! domain-agnostic over whatever the scores mean.
//!
//! # Example
//!
//! ```rust,no_run
//! use neatwork::{EngineConfig, MutationRates, NeatEngine};
//!
//! let config = EngineConfig {
//!     inputs: 2,
//!     outputs: 1,
//!     population_size: 150,
//!     random_seed: Some(7),
//!     ..EngineConfig::default()
//! };
//! let mut engine = NeatEngine::new(&config).unwrap();
//! engine.set_mutation_rates(MutationRates::STANDARD).unwrap();
//!
//! for _ in 0..100 {
//!     for i in 0..engine.population_size() {
//!         let out = engine.guess(i, &[0.0, 1.0]).unwrap();
//!         engine.set_fitness(i, 1.0 / (1.0 + (1.0 - out[0]).abs())).unwrap();
//!     }
//!     engine.next_generation();
//! }
//! ```

mod engine;
mod export;
mod genome;
mod innovation;
mod species;

pub use engine::{EngineError, MIN_FITNESS, NeatEngine};
pub use export::canonical_descriptor;
pub use genome::{ConnectionGene, Genome, GenomeSeed, MutationCtx, NodeId};
pub use innovation::InnovationRegistry;
pub use species::{Species, compatibility_distance};
