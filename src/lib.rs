//! NEAT-style neuroevolution of feed-forward network topologies and weights.
//!
//! A population of variable-structure networks is mutated, speciated, and
//! selectively reproduced across generations, guided by externally supplied
//! fitness scores. The crate is split into three modules:
//!
//! - `schema`: configuration types, the activation enumeration, and the flat
//!   numeric descriptor used for import/export
//! - `evolve`: the evolutionary core (genomes, innovation registry, species,
//!   population controller, canonical exporter)
//! - `frozen`: a minimal evaluate-only consumer for exported networks
//!
//! # Example
//!
//! ```rust,no_run
//! use neatwork::{EngineConfig, FrozenNetwork, MutationRates, NeatEngine};
//!
//! let config = EngineConfig {
//!     inputs: 2,
//!     outputs: 1,
//!     population_size: 150,
//!     random_seed: Some(1),
//!     ..EngineConfig::default()
//! };
//! let mut engine = NeatEngine::new(&config).unwrap();
//! engine.set_mutation_rates(MutationRates::STANDARD).unwrap();
//!
//! // The caller owns fitness evaluation between generations.
//! for _ in 0..200 {
//!     for i in 0..engine.population_size() {
//!         let out = engine.guess(i, &[1.0, 0.0]).unwrap();
//!         engine.set_fitness(i, 1.0 / (1.0 + (1.0 - out[0]).abs())).unwrap();
//!     }
//!     engine.next_generation();
//! }
//!
//! // Ship the champion to an evaluate-only host.
//! let descriptor = engine.export_champion().unwrap();
//! let mut net = FrozenNetwork::from_descriptor(&descriptor);
//! println!("{:?}", net.guess(&[1.0, 0.0]).unwrap());
//! ```

pub mod evolve;
pub mod frozen;
pub mod schema;

// Re-export the main surface
pub use evolve::{EngineError, NeatEngine};
pub use frozen::FrozenNetwork;
pub use schema::{
    Activation, ConfigError, DescriptorError, EngineConfig, GenerationPolicy, MutationRates,
    NetworkDescriptor,
};
