//! Configuration types for the neuroevolution engine.

use serde::{Deserialize, Serialize};

/// Minimum desired species count accepted by [`EngineConfig::validate`].
pub const MIN_SPECIES_COUNT: usize = 5;

/// Activation function applied by network nodes.
///
/// Resolved once at construction time; the payload codes (0-3) match the
/// exported descriptor format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Leaky rectifier with a 0.01 negative slope.
    #[serde(rename = "relu")]
    LeakyRelu,
    /// Identity.
    Linear,
    /// Logistic sigmoid.
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
}

impl Activation {
    /// Parse an activation name ("relu", "linear", "sigmoid", "tanh").
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "relu" => Ok(Self::LeakyRelu),
            "linear" => Ok(Self::Linear),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            _ => Err(ConfigError::UnknownActivation {
                name: name.to_owned(),
            }),
        }
    }

    /// Numeric code used in the flat network descriptor.
    pub fn code(self) -> u8 {
        match self {
            Self::LeakyRelu => 0,
            Self::Linear => 1,
            Self::Sigmoid => 2,
            Self::Tanh => 3,
        }
    }

    /// Inverse of [`Activation::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::LeakyRelu),
            1 => Some(Self::Linear),
            2 => Some(Self::Sigmoid),
            3 => Some(Self::Tanh),
            _ => None,
        }
    }

    /// Apply the activation to a single value.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
            Self::Linear => x,
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
        }
    }
}

/// Probabilities for the four mutation operators, each in [0, 1].
///
/// The weight rate doubles as the scale of the Gaussian nudge applied to
/// surviving weights, so lowering it late in a run both thins out and softens
/// weight mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationRates {
    /// Per-genome chance of running the weight-mutation pass.
    #[serde(default)]
    pub weight: f32,
    /// Chance of attempting to add a new connection gene.
    #[serde(default)]
    pub connection: f32,
    /// Chance of toggling one gene's enabled flag.
    #[serde(default)]
    pub enable: f32,
    /// Chance of splitting a connection with a new hidden node.
    #[serde(default)]
    pub node: f32,
}

impl MutationRates {
    /// A reasonable starting point for most runs.
    pub const STANDARD: Self = Self {
        weight: 0.8,
        connection: 0.1,
        enable: 0.05,
        node: 0.03,
    };

    /// Check that every rate lies in [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("weight", self.weight),
            ("connection", self.connection),
            ("enable", self.enable),
            ("node", self.node),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// How a species picks its representative genome for the next generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentativePolicy {
    /// Snapshot the best-ranked surviving member.
    #[default]
    Best,
    /// Snapshot a uniformly random surviving member.
    Random,
}

/// Tunable policy knobs for the per-generation transition.
///
/// Defaults reproduce the commonly observed variant: quarter survival, a 1.5x
/// adjusted-fitness bonus for species younger than 10 generations, and soft
/// extinction for species older than 20 that have not improved in 15.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPolicy {
    /// Fraction of each species kept after selection (top of the fitness sort).
    #[serde(default = "default_survivor_fraction")]
    pub survivor_fraction: f32,
    /// Species younger than this receive the adjusted-fitness bonus.
    #[serde(default = "default_young_age")]
    pub young_age: u32,
    /// Adjusted-fitness multiplier for young species.
    #[serde(default = "default_young_bonus")]
    pub young_bonus: f32,
    /// Minimum age before a species can be soft-extinguished.
    #[serde(default = "default_extinction_age")]
    pub extinction_age: u32,
    /// Generations without improvement after which an old species stops
    /// winning offspring.
    #[serde(default = "default_extinction_stagnation")]
    pub extinction_stagnation: u32,
    /// Representative selection policy.
    #[serde(default)]
    pub representative: RepresentativePolicy,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            survivor_fraction: default_survivor_fraction(),
            young_age: default_young_age(),
            young_bonus: default_young_bonus(),
            extinction_age: default_extinction_age(),
            extinction_stagnation: default_extinction_stagnation(),
            representative: RepresentativePolicy::default(),
        }
    }
}

fn default_survivor_fraction() -> f32 {
    0.25
}
fn default_young_age() -> u32 {
    10
}
fn default_young_bonus() -> f32 {
    1.5
}
fn default_extinction_age() -> u32 {
    20
}
fn default_extinction_stagnation() -> u32 {
    15
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of sensor inputs. A bias input is appended internally, so
    /// networks see `inputs + 1` input nodes.
    pub inputs: usize,
    /// Number of network outputs.
    pub outputs: usize,
    /// Number of genomes per generation.
    pub population_size: usize,
    /// Activation applied to hidden nodes.
    #[serde(default = "default_activation")]
    pub hidden_activation: Activation,
    /// Activation applied to output nodes.
    #[serde(default = "default_activation")]
    pub output_activation: Activation,
    /// Species count the compatibility threshold is steered toward.
    #[serde(default = "default_species_count")]
    pub desired_species_count: usize,
    /// Probability that each initial connection gene starts enabled.
    #[serde(default = "default_initial_enabled")]
    pub initial_enabled_fraction: f32,
    /// Mutation operator probabilities. Defaults to all zero; call
    /// [`set_mutation_rates`](crate::NeatEngine::set_mutation_rates) or set
    /// these explicitly before evolution does anything structural.
    #[serde(default)]
    pub mutation_rates: MutationRates,
    /// Per-generation policy knobs.
    #[serde(default)]
    pub policy: GenerationPolicy,
    /// Seed for the engine RNG. Runs are reproducible only when set.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inputs: 2,
            outputs: 1,
            population_size: 150,
            hidden_activation: default_activation(),
            output_activation: default_activation(),
            desired_species_count: default_species_count(),
            initial_enabled_fraction: default_initial_enabled(),
            mutation_rates: MutationRates::default(),
            policy: GenerationPolicy::default(),
            random_seed: None,
        }
    }
}

fn default_activation() -> Activation {
    Activation::Tanh
}
fn default_species_count() -> usize {
    8
}
fn default_initial_enabled() -> f32 {
    0.25
}

impl EngineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs == 0 {
            return Err(ConfigError::InvalidInputCount);
        }
        if self.outputs == 0 {
            return Err(ConfigError::InvalidOutputCount);
        }
        if self.desired_species_count < MIN_SPECIES_COUNT {
            return Err(ConfigError::SpeciesCountTooSmall {
                got: self.desired_species_count,
            });
        }
        // Each species needs room for a meaningful member pool.
        let required = self.desired_species_count * 10;
        if self.population_size < required {
            return Err(ConfigError::PopulationTooSmall {
                got: self.population_size,
                required,
            });
        }
        if !(0.0..=1.0).contains(&self.initial_enabled_fraction) {
            return Err(ConfigError::InvalidEnabledFraction {
                value: self.initial_enabled_fraction,
            });
        }
        self.mutation_rates.validate()?;
        if !(self.policy.survivor_fraction > 0.0 && self.policy.survivor_fraction <= 1.0) {
            return Err(ConfigError::InvalidSurvivorFraction {
                value: self.policy.survivor_fraction,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("input count must be greater than 0")]
    InvalidInputCount,
    #[error("output count must be greater than 0")]
    InvalidOutputCount,
    #[error("species count {got} is below the minimum of {MIN_SPECIES_COUNT}")]
    SpeciesCountTooSmall { got: usize },
    #[error("population size {got} must be at least 10x the species count ({required})")]
    PopulationTooSmall { got: usize, required: usize },
    #[error("initial enabled fraction {value} must be in [0, 1]")]
    InvalidEnabledFraction { value: f32 },
    #[error("{name} mutation rate {value} must be in [0, 1]")]
    RateOutOfRange { name: &'static str, value: f32 },
    #[error("survivor fraction {value} must be in (0, 1]")]
    InvalidSurvivorFraction { value: f32 },
    #[error("unknown activation {name:?}; expected \"relu\", \"linear\", \"sigmoid\", or \"tanh\"")]
    UnknownActivation { name: String },
}
