//! Population controller: speciation, reproduction, stagnation handling,
//! and the caller-facing engine surface.

use std::collections::HashSet;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::schema::{
    Activation, ConfigError, DescriptorError, EngineConfig, GenerationPolicy, MIN_SPECIES_COUNT,
    MutationRates, NetworkDescriptor, RepresentativePolicy,
};

use super::export::canonical_descriptor;
use super::genome::{ConnectionGene, Genome, GenomeSeed, MutationCtx, NodeId};
use super::innovation::InnovationRegistry;
use super::species::Species;

/// Fitness values at or below this are rejected; the reproduction math
/// needs strictly positive fitness.
pub const MIN_FITNESS: f32 = 1e-4;

/// Fitness given to a synthesized placeholder champion.
const PLACEHOLDER_CHAMPION_FITNESS: f32 = 0.01;

const INITIAL_COMPATIBILITY_THRESHOLD: f32 = 3.0;
const COMPATIBILITY_THRESHOLD_STEP: f32 = 0.3;
const MIN_COMPATIBILITY_THRESHOLD: f32 = 0.3;
/// The threshold only moves when the species count is more than this far
/// from the desired count.
const SPECIES_COUNT_TOLERANCE: usize = 3;

/// Runtime errors from engine operations. Every error is fail-fast and
/// leaves the engine in its previous valid state.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("network index {index} is out of range (population size {size})")]
    IndexOutOfRange { index: usize, size: usize },
    #[error("expected {expected} input values, got {got}")]
    InputSizeMismatch { expected: usize, got: usize },
    #[error("fitness {value} must be greater than {MIN_FITNESS}")]
    FitnessTooLow { value: f32 },
    #[error("no champion has been recorded yet")]
    NoChampion,
    #[error("stagnation limit {got} must be at least 3")]
    StagnationLimitTooSmall { got: u32 },
    #[error("connection cap {got} must be at least 3")]
    ConnectionCapTooSmall { got: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// The evolutionary engine.
///
/// Owns the population, the species list, the innovation registry, the
/// running champion, and the single RNG every stochastic operation draws
/// from. Fitness evaluation happens outside: callers run
/// [`guess`](Self::guess) per member, assign scores with
/// [`set_fitness`](Self::set_fitness), then advance with
/// [`next_generation`](Self::next_generation).
pub struct NeatEngine {
    input_count: usize,
    output_count: usize,
    population_size: usize,
    hidden_activation: Activation,
    output_activation: Activation,
    desired_species_count: usize,
    compatibility_threshold: f32,
    rates: MutationRates,
    connection_cap: usize,
    stagnation_limit: u32,
    policy: GenerationPolicy,
    registry: InnovationRegistry,
    population: Vec<Genome>,
    species: Vec<Species>,
    champion: Option<Genome>,
    champion_fitness: f32,
    last_best_fitness: f32,
    generations_without_improvement: u32,
    generation: u64,
    rng: StdRng,
}

impl NeatEngine {
    /// Initialize a fresh population.
    ///
    /// Every genome starts with input and output nodes only and one gene per
    /// input-output pair, weight uniform in [-1, 1], enabled with the
    /// configured probability. The registry assigns those pairs the dense
    /// innovation ids 0..inputs*outputs shared by the whole population.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        // The bias node is the last input.
        let input_count = config.inputs + 1;
        let output_count = config.outputs;
        let io_count = input_count + output_count;

        let mut registry = InnovationRegistry::default();
        let mut rng = StdRng::seed_from_u64(config.random_seed.unwrap_or_else(rand::random));

        let node_order: Vec<NodeId> = (0..io_count).collect();
        let mut template = Vec::with_capacity(input_count * output_count);
        for from in 0..input_count {
            for to in input_count..io_count {
                template.push(ConnectionGene {
                    from,
                    to,
                    weight: 0.0,
                    enabled: false,
                    innovation: registry.identity_for(from, to),
                });
            }
        }
        registry.note_node_id(io_count - 1);

        let rates = config.mutation_rates;
        let connection_cap = usize::MAX;
        let mut population = Vec::with_capacity(config.population_size);
        for _ in 0..config.population_size {
            let mut genes = template.clone();
            for gene in &mut genes {
                gene.weight = rng.gen_range(-1.0..=1.0);
                gene.enabled = rng.gen_bool(f64::from(config.initial_enabled_fraction));
            }
            let mut ctx = MutationCtx {
                rates: &rates,
                connection_cap,
                registry: &mut registry,
            };
            population.push(Genome::new(
                input_count,
                output_count,
                Some(GenomeSeed {
                    node_order: &node_order,
                    genes: &genes,
                }),
                config.hidden_activation,
                config.output_activation,
                true,
                &mut ctx,
                &mut rng,
            ));
        }

        Ok(Self {
            input_count,
            output_count,
            population_size: config.population_size,
            hidden_activation: config.hidden_activation,
            output_activation: config.output_activation,
            desired_species_count: config.desired_species_count,
            compatibility_threshold: INITIAL_COMPATIBILITY_THRESHOLD,
            rates,
            connection_cap,
            stagnation_limit: u32::MAX,
            policy: config.policy.clone(),
            registry,
            population,
            species: Vec::new(),
            champion: None,
            champion_fitness: 0.0,
            last_best_fitness: 0.0,
            generations_without_improvement: 0,
            generation: 0,
            rng,
        })
    }

    /// Seed a population from an exported descriptor.
    ///
    /// Every member starts as a mutated copy of the template network with
    /// all listed edges enabled. Undersized population or species counts are
    /// clamped up rather than rejected.
    pub fn from_descriptor(
        descriptor: &NetworkDescriptor,
        population_size: usize,
        desired_species_count: usize,
        random_seed: Option<u64>,
    ) -> Self {
        let desired_species_count = desired_species_count.max(MIN_SPECIES_COUNT);
        let population_size = population_size.max(desired_species_count * 10);

        let input_count = descriptor.input_count;
        let output_count = descriptor.output_count;
        let io_count = input_count + output_count;

        let mut registry = InnovationRegistry::default();
        let mut rng = StdRng::seed_from_u64(random_seed.unwrap_or_else(rand::random));

        // Inputs, then hidden nodes in first-appearance order, then outputs.
        let mut node_order: Vec<NodeId> = (0..input_count).collect();
        let mut seen = HashSet::new();
        for edge in &descriptor.edges {
            if edge.from >= io_count && seen.insert(edge.from) {
                node_order.push(edge.from);
            }
        }
        node_order.extend(input_count..io_count);

        let mut genes = Vec::with_capacity(descriptor.edges.len());
        for edge in &descriptor.edges {
            genes.push(ConnectionGene {
                from: edge.from,
                to: edge.to,
                weight: edge.weight,
                enabled: true,
                innovation: registry.identity_for(edge.from, edge.to),
            });
        }
        registry.note_node_id(descriptor.max_node_id());

        let rates = MutationRates::default();
        let connection_cap = usize::MAX;
        let mut population = Vec::with_capacity(population_size);
        for _ in 0..population_size {
            let mut ctx = MutationCtx {
                rates: &rates,
                connection_cap,
                registry: &mut registry,
            };
            population.push(Genome::new(
                input_count,
                output_count,
                Some(GenomeSeed {
                    node_order: &node_order,
                    genes: &genes,
                }),
                descriptor.hidden_activation,
                descriptor.output_activation,
                true,
                &mut ctx,
                &mut rng,
            ));
        }

        Self {
            input_count,
            output_count,
            population_size,
            hidden_activation: descriptor.hidden_activation,
            output_activation: descriptor.output_activation,
            desired_species_count,
            compatibility_threshold: INITIAL_COMPATIBILITY_THRESHOLD,
            rates,
            connection_cap,
            stagnation_limit: u32::MAX,
            policy: GenerationPolicy::default(),
            registry,
            population,
            species: Vec::new(),
            champion: None,
            champion_fitness: 0.0,
            last_best_fitness: 0.0,
            generations_without_improvement: 0,
            generation: 0,
            rng,
        }
    }

    /// Replace the four mutation rates, each in [0, 1].
    pub fn set_mutation_rates(&mut self, rates: MutationRates) -> Result<(), EngineError> {
        rates.validate()?;
        self.rates = rates;
        Ok(())
    }

    /// Generations without improvement tolerated before the population is
    /// collapsed onto the champion. Must be at least 3.
    pub fn set_stagnation_limit(&mut self, limit: u32) -> Result<(), EngineError> {
        if limit < 3 {
            return Err(EngineError::StagnationLimitTooSmall { got: limit });
        }
        self.stagnation_limit = limit;
        Ok(())
    }

    /// Cap on active connections per genome; structural growth stops at the
    /// cap but existing structure above it is left alone. Must be at least 3.
    pub fn set_connection_cap(&mut self, cap: usize) -> Result<(), EngineError> {
        if cap < 3 {
            return Err(EngineError::ConnectionCapTooSmall { got: cap });
        }
        self.connection_cap = cap;
        Ok(())
    }

    /// Run inference for one population member. Takes exactly
    /// [`input_size`](Self::input_size) values; the bias is appended
    /// internally.
    pub fn guess(&mut self, index: usize, inputs: &[f32]) -> Result<Vec<f32>, EngineError> {
        if index >= self.population.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                size: self.population.len(),
            });
        }
        let full = self.with_bias(inputs)?;
        Ok(self.population[index].guess(&full))
    }

    /// Run inference for the champion.
    pub fn champion_guess(&mut self, inputs: &[f32]) -> Result<Vec<f32>, EngineError> {
        let full = self.with_bias(inputs)?;
        let champion = self.champion.as_mut().ok_or(EngineError::NoChampion)?;
        Ok(champion.guess(&full))
    }

    fn with_bias(&self, inputs: &[f32]) -> Result<Vec<f32>, EngineError> {
        let expected = self.input_count - 1;
        if inputs.len() != expected {
            return Err(EngineError::InputSizeMismatch {
                expected,
                got: inputs.len(),
            });
        }
        let mut full = Vec::with_capacity(self.input_count);
        full.extend_from_slice(inputs);
        full.push(1.0);
        Ok(full)
    }

    /// Assign raw fitness to one member. Must be called for every member
    /// before [`next_generation`](Self::next_generation); selection is
    /// undefined for unscored members.
    pub fn set_fitness(&mut self, index: usize, fitness: f32) -> Result<(), EngineError> {
        if index >= self.population.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                size: self.population.len(),
            });
        }
        if !(fitness > MIN_FITNESS) {
            return Err(EngineError::FitnessTooLow { value: fitness });
        }
        self.population[index].fitness = fitness;
        Ok(())
    }

    /// Advance one generation.
    ///
    /// Two branches: once the run has gone `stagnation_limit` generations
    /// without champion improvement the whole population is rebuilt from
    /// champion clones; otherwise the normal cycle speciates, shares
    /// fitness, culls, reproduces by quota, and adapts the compatibility
    /// threshold toward the desired species count.
    pub fn next_generation(&mut self) {
        if self.champion_fitness > self.last_best_fitness {
            self.last_best_fitness = self.champion_fitness;
            self.generations_without_improvement = 0;
        } else {
            self.generations_without_improvement += 1;
        }

        if self.generations_without_improvement > self.stagnation_limit {
            self.collapse_onto_champion();
        } else {
            self.normal_cycle();
        }

        self.generation += 1;
    }

    /// Stagnation reset: discard population and species, repopulate with one
    /// unmutated champion clone plus mutated champion clones.
    fn collapse_onto_champion(&mut self) {
        info!(
            "stagnation reset after {} generations without improvement",
            self.generations_without_improvement
        );

        if self.champion.is_none() {
            let mut ctx = MutationCtx {
                rates: &self.rates,
                connection_cap: self.connection_cap,
                registry: &mut self.registry,
            };
            let mut placeholder = Genome::new(
                self.input_count,
                self.output_count,
                None,
                self.hidden_activation,
                self.output_activation,
                false,
                &mut ctx,
                &mut self.rng,
            );
            placeholder.fitness = PLACEHOLDER_CHAMPION_FITNESS;
            self.champion = Some(placeholder);
        }

        let Some(champion) = self.champion.take() else {
            return;
        };
        let order = champion.depth_order();
        let genes = champion.genes().to_vec();
        let seed = GenomeSeed {
            node_order: &order,
            genes: &genes,
        };

        self.species.clear();
        let mut next = Vec::with_capacity(self.population_size);
        {
            let registry = &mut self.registry;
            let rng = &mut self.rng;
            let mut ctx = MutationCtx {
                rates: &self.rates,
                connection_cap: self.connection_cap,
                registry,
            };
            next.push(Genome::new(
                self.input_count,
                self.output_count,
                Some(seed),
                self.hidden_activation,
                self.output_activation,
                false,
                &mut ctx,
                rng,
            ));
            for _ in 1..self.population_size {
                next.push(Genome::new(
                    self.input_count,
                    self.output_count,
                    Some(seed),
                    self.hidden_activation,
                    self.output_activation,
                    true,
                    &mut ctx,
                    rng,
                ));
            }
        }
        self.population = next;
        self.champion = Some(champion);
        self.generations_without_improvement = 0;
    }

    fn normal_cycle(&mut self) {
        // Representatives persist; last generation's memberships do not.
        for species in &mut self.species {
            species.members.clear();
        }

        let old_population = std::mem::take(&mut self.population);

        // Clone the generation's best performer up front; it enters the next
        // generation unmutated and becomes the champion if it sets a record.
        let mut best_clone = None;
        let best_index = old_population
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.fitness.total_cmp(&b.fitness))
            .map(|(i, _)| i);
        if let Some(index) = best_index {
            let best_fitness = old_population[index].fitness;
            let clone = {
                let mut ctx = MutationCtx {
                    rates: &self.rates,
                    connection_cap: self.connection_cap,
                    registry: &mut self.registry,
                };
                Genome::from_parent(&old_population[index], false, &mut ctx, &mut self.rng)
            };
            if best_fitness > self.champion_fitness {
                info!(
                    "new champion: fitness {best_fitness} ({} active connections)",
                    clone.active_connection_count()
                );
                let mut champion = clone.clone();
                champion.fitness = best_fitness;
                self.champion = Some(champion);
                self.champion_fitness = best_fitness;
            }
            best_clone = Some(clone);
        }

        // Speciate: first compatible species wins, otherwise found a new one.
        for genome in old_population {
            let mut target = None;
            for (i, species) in self.species.iter().enumerate() {
                if species.compatibility(&genome) < self.compatibility_threshold {
                    target = Some(i);
                    break;
                }
            }
            match target {
                Some(i) => self.species[i].members.push(genome),
                None => self.species.push(Species::new(genome)),
            }
        }
        debug!(
            "speciated into {} species at threshold {:.2}",
            self.species.len(),
            self.compatibility_threshold
        );

        // Selection: keep the top fraction of each species.
        for species in &mut self.species {
            if species.members.is_empty() {
                continue;
            }
            species.sort_members();
            let survivors = ((species.members.len() as f32 * self.policy.survivor_fraction)
                .ceil() as usize)
                .max(1);
            species.members.truncate(survivors);
        }

        // Fitness sharing.
        for species in &mut self.species {
            let size = species.members.len();
            if size == 0 {
                continue;
            }
            for member in &mut species.members {
                member.adjusted_fitness = member.fitness / size as f32;
            }
        }

        // Aging: young species get a boost, stagnant old ones stop winning
        // offspring (soft extinction).
        for species in &mut self.species {
            species.age += 1;

            let species_best = species
                .members
                .iter()
                .map(|m| m.fitness)
                .fold(0.0f32, f32::max);
            if species_best > species.best_fitness_ever {
                species.best_fitness_ever = species_best;
                species.gens_since_improved = 0;
            } else {
                species.gens_since_improved += 1;
            }

            if species.age < self.policy.young_age {
                for member in &mut species.members {
                    member.adjusted_fitness *= self.policy.young_bonus;
                }
            }
            if species.age > self.policy.extinction_age
                && species.gens_since_improved > self.policy.extinction_stagnation
            {
                for member in &mut species.members {
                    member.adjusted_fitness = 0.0;
                }
            }
        }

        let global_sum: f32 = self
            .species
            .iter()
            .flat_map(|s| s.members.iter())
            .map(|m| m.adjusted_fitness)
            .sum();

        let mut next_generation: Vec<Genome> = Vec::with_capacity(self.population_size + 1);
        if let Some(clone) = best_clone {
            next_generation.push(clone);
        }

        // Quota reproduction.
        if global_sum > 0.0 {
            let quotas: Vec<usize> = self
                .species
                .iter()
                .map(|species| {
                    let species_sum: f32 =
                        species.members.iter().map(|m| m.adjusted_fitness).sum();
                    let mut quota =
                        ((species_sum / global_sum) * self.population_size as f32) as usize;
                    if quota == 0 && species_sum > 0.0 {
                        quota = 1;
                    }
                    quota
                })
                .collect();

            for (i, &quota) in quotas.iter().enumerate() {
                if quota == 0 {
                    continue;
                }
                let offspring = {
                    let species = &self.species;
                    let mut ctx = MutationCtx {
                        rates: &self.rates,
                        connection_cap: self.connection_cap,
                        registry: &mut self.registry,
                    };
                    species[i].reproduce(quota, species, &mut ctx, &mut self.rng)
                };
                next_generation.extend(offspring);
            }
        }

        // Quotas can leave a shortfall; fill it with mutated copies of
        // uniformly sampled (species, member) pairs.
        while next_generation.len() < self.population_size {
            if self.species.iter().all(|s| s.members.is_empty()) {
                break;
            }
            let i = self.rng.gen_range(0..self.species.len());
            if self.species[i].members.is_empty() {
                continue;
            }
            let j = self.rng.gen_range(0..self.species[i].members.len());
            let child = {
                let parent = &self.species[i].members[j];
                let mut ctx = MutationCtx {
                    rates: &self.rates,
                    connection_cap: self.connection_cap,
                    registry: &mut self.registry,
                };
                Genome::from_parent(parent, true, &mut ctx, &mut self.rng)
            };
            next_generation.push(child);
        }
        next_generation.truncate(self.population_size);

        // New representatives for surviving species.
        {
            let rng = &mut self.rng;
            let policy = &self.policy;
            for species in &mut self.species {
                if species.members.is_empty() {
                    continue;
                }
                let pick = match policy.representative {
                    RepresentativePolicy::Best => 0,
                    RepresentativePolicy::Random => rng.gen_range(0..species.members.len()),
                };
                species.representative = species.members[pick].genes().to_vec();
            }
        }

        // Species that attracted no members this cycle die; parents of the
        // rest are released.
        self.species.retain(|s| !s.members.is_empty());
        for species in &mut self.species {
            species.members.clear();
        }

        self.population = next_generation;

        let adapted = adapted_threshold(
            self.compatibility_threshold,
            self.species.len(),
            self.desired_species_count,
        );
        if adapted != self.compatibility_threshold {
            debug!(
                "compatibility threshold {:.2} -> {:.2} ({} species, want {})",
                self.compatibility_threshold,
                adapted,
                self.species.len(),
                self.desired_species_count
            );
            self.compatibility_threshold = adapted;
        }
    }

    /// Export the champion through the canonical exporter.
    pub fn export_champion(&self) -> Result<NetworkDescriptor, EngineError> {
        let champion = self.champion.as_ref().ok_or(EngineError::NoChampion)?;
        Ok(canonical_descriptor(champion))
    }

    /// Best fitness observed across the run.
    pub fn champion_fitness(&self) -> Result<f32, EngineError> {
        if self.champion.is_none() {
            return Err(EngineError::NoChampion);
        }
        Ok(self.champion_fitness)
    }

    /// Active connection count of the champion.
    pub fn champion_connection_count(&self) -> Result<usize, EngineError> {
        let champion = self.champion.as_ref().ok_or(EngineError::NoChampion)?;
        Ok(champion.active_connection_count())
    }

    pub fn has_champion(&self) -> bool {
        self.champion.is_some()
    }

    /// Drop the champion and its fitness watermark. The next generation's
    /// best performer will take the slot.
    pub fn clear_champion(&mut self) {
        self.champion = None;
        self.champion_fitness = 0.0;
    }

    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    /// Expected inference input length (bias excluded).
    pub fn input_size(&self) -> usize {
        self.input_count - 1
    }

    pub fn output_size(&self) -> usize {
        self.output_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn compatibility_threshold(&self) -> f32 {
        self.compatibility_threshold
    }

    pub fn generations_without_improvement(&self) -> u32 {
        self.generations_without_improvement
    }
}

/// Move the threshold one step toward the desired species count, within its
/// floor. Counts within the tolerance band leave it untouched.
fn adapted_threshold(current: f32, species_count: usize, desired: usize) -> f32 {
    let mut threshold = current;
    if species_count + SPECIES_COUNT_TOLERANCE < desired {
        threshold -= COMPATIBILITY_THRESHOLD_STEP;
    } else if species_count > desired + SPECIES_COUNT_TOLERANCE {
        threshold += COMPATIBILITY_THRESHOLD_STEP;
    }
    threshold.max(MIN_COMPATIBILITY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frozen::FrozenNetwork;

    fn test_config() -> EngineConfig {
        EngineConfig {
            inputs: 2,
            outputs: 1,
            population_size: 100,
            desired_species_count: 10,
            random_seed: Some(42),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn initial_population_matches_scenario() {
        let engine = NeatEngine::new(&test_config()).unwrap();
        assert_eq!(engine.population_size(), 100);
        assert_eq!(engine.input_size(), 2);

        for genome in &engine.population {
            let genes = genome.genes();
            assert_eq!(genes.len(), 3);
            let pairs: Vec<(usize, usize)> = genes.iter().map(|g| (g.from, g.to)).collect();
            assert_eq!(pairs, vec![(0, 3), (1, 3), (2, 3)]);
            let innovations: Vec<usize> = genes.iter().map(|g| g.innovation).collect();
            assert_eq!(innovations, vec![0, 1, 2]);
        }
        assert_eq!(engine.registry.len(), 3);
    }

    #[test]
    fn uniform_fitness_generation_keeps_population_size() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        for i in 0..100 {
            engine.set_fitness(i, 1.0).unwrap();
        }
        engine.next_generation();
        assert_eq!(engine.population_size(), 100);
        assert_eq!(engine.generation(), 1);
        assert!(engine.has_champion());
        assert_eq!(engine.champion_fitness().unwrap(), 1.0);
    }

    #[test]
    fn population_size_is_stable_across_many_generations() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        engine.set_mutation_rates(MutationRates::STANDARD).unwrap();
        for generation in 0..10 {
            for i in 0..100 {
                engine.set_fitness(i, 0.5 + (i % 7) as f32 + generation as f32 * 0.01).unwrap();
            }
            engine.next_generation();
            assert_eq!(engine.population_size(), 100);
        }
    }

    #[test]
    fn threshold_adaptation_steps_toward_desired_count() {
        // Within the tolerance band the threshold is untouched.
        assert_eq!(adapted_threshold(3.0, 8, 10), 3.0);
        assert_eq!(adapted_threshold(3.0, 13, 10), 3.0);
        // Too few species: easier to found new ones.
        assert_eq!(adapted_threshold(3.0, 1, 10), 2.7);
        // Too many: harder.
        assert_eq!(adapted_threshold(3.0, 14, 10), 3.3);
        // Never below the floor.
        assert_eq!(adapted_threshold(0.4, 1, 10), MIN_COMPATIBILITY_THRESHOLD);
    }

    #[test]
    fn stagnation_collapses_population_onto_champion() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        engine.set_stagnation_limit(3).unwrap();

        // Constant fitness never improves on the first generation's record.
        let mut collapsed_at = None;
        for generation in 0..8 {
            for i in 0..100 {
                engine.set_fitness(i, 1.0).unwrap();
            }
            engine.next_generation();
            if engine.species_count() == 0 && generation > 0 {
                collapsed_at = Some(generation);
                break;
            }
        }

        let collapsed_at = collapsed_at.expect("stagnation reset should have triggered");
        // Improvement lands on the first transition, the counter passes the
        // limit of 3 four transitions later.
        assert_eq!(collapsed_at, 5);
        assert_eq!(engine.generations_without_improvement(), 0);
        assert_eq!(engine.population_size(), 100);
        assert!(engine.has_champion());
    }

    #[test]
    fn guess_validates_index_and_shape() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        assert!(matches!(
            engine.guess(100, &[0.0, 0.0]),
            Err(EngineError::IndexOutOfRange { index: 100, .. })
        ));
        assert!(matches!(
            engine.guess(0, &[0.0, 0.0, 0.0]),
            Err(EngineError::InputSizeMismatch {
                expected: 2,
                got: 3
            })
        ));
        let out = engine.guess(0, &[0.0, 1.0]).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn set_fitness_rejects_epsilon_and_bad_index() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        assert!(matches!(
            engine.set_fitness(0, 1e-4),
            Err(EngineError::FitnessTooLow { .. })
        ));
        assert!(matches!(
            engine.set_fitness(0, 0.0),
            Err(EngineError::FitnessTooLow { .. })
        ));
        assert!(matches!(
            engine.set_fitness(500, 1.0),
            Err(EngineError::IndexOutOfRange { .. })
        ));
        engine.set_fitness(0, 2e-4).unwrap();
    }

    #[test]
    fn champion_operations_require_a_champion() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        assert!(!engine.has_champion());
        assert!(matches!(
            engine.champion_fitness(),
            Err(EngineError::NoChampion)
        ));
        assert!(matches!(
            engine.champion_connection_count(),
            Err(EngineError::NoChampion)
        ));
        assert!(matches!(
            engine.champion_guess(&[0.0, 0.0]),
            Err(EngineError::NoChampion)
        ));
        assert!(matches!(
            engine.export_champion(),
            Err(EngineError::NoChampion)
        ));

        for i in 0..100 {
            engine.set_fitness(i, 1.0).unwrap();
        }
        engine.next_generation();
        assert!(engine.has_champion());
        engine.clear_champion();
        assert!(!engine.has_champion());
        assert!(matches!(
            engine.champion_fitness(),
            Err(EngineError::NoChampion)
        ));
    }

    #[test]
    fn innovation_ids_stay_aligned_across_genomes() {
        let mut engine = NeatEngine::new(&test_config()).unwrap();
        engine.set_mutation_rates(MutationRates::STANDARD).unwrap();
        for _ in 0..15 {
            for i in 0..100 {
                let out = engine.guess(i, &[1.0, 0.0]).unwrap();
                engine.set_fitness(i, 1.0 + out[0].abs()).unwrap();
            }
            engine.next_generation();
        }
        // Any two genes with the same innovation id, anywhere in the
        // population, describe the same directed pair.
        let mut pair_of = std::collections::HashMap::new();
        for genome in &engine.population {
            for gene in genome.genes() {
                let pair = (gene.from, gene.to);
                assert_eq!(*pair_of.entry(gene.innovation).or_insert(pair), pair);
            }
        }
    }

    #[test]
    fn export_round_trips_through_frozen_network() {
        let xor_cases: [([f32; 2], f32); 4] = [
            ([0.0, 0.0], 0.0),
            ([0.0, 1.0], 1.0),
            ([1.0, 0.0], 1.0),
            ([1.0, 1.0], 0.0),
        ];

        let mut engine = NeatEngine::new(&test_config()).unwrap();
        engine.set_mutation_rates(MutationRates::STANDARD).unwrap();
        for _ in 0..25 {
            for i in 0..100 {
                let mut error = 0.0;
                for (inputs, target) in &xor_cases {
                    let out = engine.guess(i, inputs).unwrap();
                    error += (out[0] - target).abs();
                }
                engine.set_fitness(i, (4.0 - error).powi(2).max(0.01)).unwrap();
            }
            engine.next_generation();
        }

        let descriptor = engine.export_champion().unwrap();
        // The payload survives its own flat encoding.
        let decoded = NetworkDescriptor::decode(&descriptor.encode()).unwrap();
        assert_eq!(decoded, descriptor);

        let mut frozen = FrozenNetwork::from_descriptor(&decoded);
        for (inputs, _) in &xor_cases {
            let expected = engine.champion_guess(inputs).unwrap();
            let got = frozen.guess(inputs).unwrap();
            assert_eq!(expected, got);
        }
    }

    #[test]
    fn from_descriptor_seeds_a_full_population() {
        let descriptor = NetworkDescriptor::decode(&[
            3.0, 1.0, 3.0, 3.0, // header: 2+bias inputs, 1 output, tanh/tanh
            0.0, 3.0, 0.5, // input 0 -> output
            2.0, 3.0, -0.25, // bias -> output
        ])
        .unwrap();

        let mut engine = NeatEngine::from_descriptor(&descriptor, 0, 0, Some(11));
        // Undersized counts are clamped up.
        assert_eq!(engine.species_count(), 0);
        assert_eq!(engine.population_size(), 50);
        assert_eq!(engine.input_size(), 2);

        for genome in &engine.population {
            assert_eq!(genome.genes().len(), 2);
            assert!(genome.genes().iter().all(|g| g.enabled));
        }

        for i in 0..50 {
            engine.set_fitness(i, 1.0).unwrap();
        }
        engine.next_generation();
        assert_eq!(engine.population_size(), 50);
    }
}
