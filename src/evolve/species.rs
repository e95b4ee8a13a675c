//! Speciation: compatibility distance, crossover, and quota reproduction.

use std::collections::HashMap;

use rand::Rng;
use rand::rngs::StdRng;

use super::genome::{ConnectionGene, Genome, MutationCtx};

const EXCESS_COEFFICIENT: f32 = 1.0;
const DISJOINT_COEFFICIENT: f32 = 1.0;
const WEIGHT_COEFFICIENT: f32 = 0.4;
/// Gene lists shorter than this skip size normalization.
const NORMALIZATION_FLOOR: usize = 20;
/// Chance that the second crossover parent comes from the same species.
const IN_SPECIES_MATE_CHANCE: f64 = 0.98;

/// A cluster of mutually compatible genomes.
///
/// Members are owned for the duration of one generation transition; the
/// representative is a snapshot of a member's gene list, not a live
/// reference, and is what candidates are compared against.
#[derive(Debug)]
pub struct Species {
    pub members: Vec<Genome>,
    pub representative: Vec<ConnectionGene>,
    pub age: u32,
    pub best_fitness_ever: f32,
    pub gens_since_improved: u32,
}

impl Species {
    /// Found a new species around its first member.
    pub fn new(founder: Genome) -> Self {
        Self {
            representative: founder.genes().to_vec(),
            members: vec![founder],
            age: 0,
            best_fitness_ever: 0.0,
            gens_since_improved: 0,
        }
    }

    /// Distance between a candidate and this species' representative.
    pub fn compatibility(&self, candidate: &Genome) -> f32 {
        compatibility_distance(candidate.genes(), &self.representative)
    }

    /// Sort members by descending fitness.
    pub fn sort_members(&mut self) {
        self.members
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    /// Produce `quota` offspring. The first unit is an unmutated clone of
    /// the top-ranked member; every further unit crosses a random member
    /// with a mate drawn from this species most of the time, or from a
    /// random species (possibly this one) otherwise.
    ///
    /// Callers must have sorted members beforehand.
    pub fn reproduce(
        &self,
        quota: usize,
        all_species: &[Species],
        ctx: &mut MutationCtx<'_>,
        rng: &mut StdRng,
    ) -> Vec<Genome> {
        let mut offspring = Vec::with_capacity(quota);
        if quota == 0 || self.members.is_empty() {
            return offspring;
        }

        offspring.push(Genome::from_parent(&self.members[0], false, ctx, rng));

        while offspring.len() < quota {
            let parent_a = &self.members[rng.gen_range(0..self.members.len())];
            let parent_b = if rng.gen_bool(IN_SPECIES_MATE_CHANCE) {
                &self.members[rng.gen_range(0..self.members.len())]
            } else {
                let donor = &all_species[rng.gen_range(0..all_species.len())];
                if donor.members.is_empty() {
                    &self.members[rng.gen_range(0..self.members.len())]
                } else {
                    &donor.members[rng.gen_range(0..donor.members.len())]
                }
            };
            offspring.push(crossover(parent_a, parent_b, ctx, rng));
        }

        offspring
    }
}

/// NEAT compatibility distance between two gene lists.
///
/// Both lists are walked in sequence order: genes left over once one side is
/// exhausted count as excess, innovation-id mismatches count as disjoint
/// (advancing the lower id), and matches accumulate absolute weight
/// difference. Gene lists are compared as laid down in creation order rather
/// than by a global sort; duplicated innovation ids across genomes line up
/// because the registry hands the same pair the same id.
pub fn compatibility_distance(a: &[ConnectionGene], b: &[ConnectionGene]) -> f32 {
    let mut ia = a.iter().peekable();
    let mut ib = b.iter().peekable();

    let mut matching = 0usize;
    let mut disjoint = 0usize;
    let mut excess = 0usize;
    let mut weight_diff_sum = 0.0f32;

    loop {
        match (ia.peek(), ib.peek()) {
            (None, None) => break,
            (None, Some(_)) => {
                excess += 1;
                ib.next();
            }
            (Some(_), None) => {
                excess += 1;
                ia.next();
            }
            (Some(ga), Some(gb)) => {
                if ga.innovation == gb.innovation {
                    matching += 1;
                    weight_diff_sum += (ga.weight - gb.weight).abs();
                    ia.next();
                    ib.next();
                } else if ga.innovation < gb.innovation {
                    disjoint += 1;
                    ia.next();
                } else {
                    disjoint += 1;
                    ib.next();
                }
            }
        }
    }

    let max_len = a.len().max(b.len());
    let n = if max_len < NORMALIZATION_FLOOR {
        1.0
    } else {
        max_len as f32
    };

    let mut distance =
        (EXCESS_COEFFICIENT * excess as f32) / n + (DISJOINT_COEFFICIENT * disjoint as f32) / n;
    if matching > 0 {
        distance += WEIGHT_COEFFICIENT * (weight_diff_sum / matching as f32);
    }
    distance
}

/// Cross two parents into a child genome.
///
/// The higher-fitness parent is the major one. Matching genes keep the
/// major's gene or take the minor's weight on a coin flip; disjoint and
/// excess genes are always inherited from the major, and genes present only
/// in the minor are never inherited. The child inherits the major's node
/// ordering and goes through full construction, mutation included.
pub(crate) fn crossover(
    a: &Genome,
    b: &Genome,
    ctx: &mut MutationCtx<'_>,
    rng: &mut StdRng,
) -> Genome {
    let (major, minor) = if a.fitness > b.fitness { (a, b) } else { (b, a) };

    let minor_weights: HashMap<usize, f32> = minor
        .genes()
        .iter()
        .map(|g| (g.innovation, g.weight))
        .collect();

    let mut child_genes = Vec::with_capacity(major.genes().len());
    for gene in major.genes() {
        match minor_weights.get(&gene.innovation) {
            Some(&weight) if rng.gen_bool(0.5) => child_genes.push(ConnectionGene {
                weight,
                ..*gene
            }),
            _ => child_genes.push(*gene),
        }
    }

    let order = major.depth_order();
    Genome::new(
        major.input_count(),
        major.output_count(),
        Some(super::genome::GenomeSeed {
            node_order: &order,
            genes: &child_genes,
        }),
        major.hidden_activation(),
        major.output_activation(),
        true,
        ctx,
        rng,
    )
}
