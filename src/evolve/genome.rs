//! Genome representation, mutation operators, and the forward pass.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::rngs::StdRng;

use crate::schema::{Activation, MutationRates};

use super::innovation::InnovationRegistry;

/// Stable node identity. Role is implied by range: ids below the input count
/// are inputs (the last of them the bias), the next `output_count` ids are
/// outputs, everything else is hidden.
pub type NodeId = usize;

/// Gaussian nudge scale before multiplication by the weight mutation rate.
const WEIGHT_NUDGE_SIGMA: f32 = 0.13;
/// Hard bound weights are clamped to after mutation.
const WEIGHT_CLAMP: f32 = 100.0;
/// Bound for full weight re-randomization.
const WEIGHT_RESET_BOUND: f32 = 5.0;
/// Attempts before the add-connection mutation gives up.
const ADD_CONNECTION_ATTEMPTS: usize = 20;

/// One directed connection gene.
///
/// The innovation id is the structural identity of the edge: genes with the
/// same id in different genomes are "the same" edge historically, whatever
/// their weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionGene {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f32,
    pub enabled: bool,
    pub innovation: usize,
}

/// Everything a construction or mutation call needs besides entropy:
/// operator rates, the structural growth cap, and the run's innovation
/// registry. Passed explicitly instead of living behind a back-reference to
/// the owning population.
pub struct MutationCtx<'a> {
    pub rates: &'a MutationRates,
    pub connection_cap: usize,
    pub registry: &'a mut InnovationRegistry,
}

/// A node of the compiled evaluation graph.
#[derive(Debug, Clone)]
pub(crate) struct EvalNode {
    pub(crate) id: NodeId,
    /// 0 for inputs, 1 for outputs, evenly spaced in (0, 1) for hidden nodes
    /// by their position in the working order. A heuristic stand-in for a
    /// topological sort, kept for behavioral parity.
    pub(crate) depth: f32,
    accum: f32,
    /// Outgoing enabled edges as (evaluation-order index, weight).
    pub(crate) outgoing: Vec<(usize, f32)>,
}

/// A variable-structure feed-forward network genome.
///
/// Owns one gene list plus a derived evaluation graph rebuilt after every
/// structural change. Fitness fields are transient per-generation values.
#[derive(Debug, Clone)]
pub struct Genome {
    input_count: usize,
    output_count: usize,
    hidden_activation: Activation,
    output_activation: Activation,
    genes: Vec<ConnectionGene>,
    /// Working node ordering; add-node inserts here and depths are assigned
    /// from positions in this list on rebuild.
    node_order: Vec<NodeId>,
    /// Derived evaluation graph, ascending by depth.
    nodes: Vec<EvalNode>,
    pub fitness: f32,
    pub adjusted_fitness: f32,
}

/// Seed data for constructing a genome from existing structure.
#[derive(Debug, Clone, Copy)]
pub struct GenomeSeed<'a> {
    pub node_order: &'a [NodeId],
    pub genes: &'a [ConnectionGene],
}

impl Genome {
    /// Construct a genome, optionally from seed structure, optionally
    /// mutated, and compile its evaluation graph.
    ///
    /// Without a seed the genome holds only input and output nodes with one
    /// disabled zero-weight gene per input-output pair. Mutation applies the
    /// four operators in order (add-node, add-connection, toggle-enable,
    /// weight mutation), each gated by its own rate; the two structural
    /// operators are additionally refused once the active connection count
    /// has reached the cap.
    pub fn new(
        input_count: usize,
        output_count: usize,
        seed: Option<GenomeSeed<'_>>,
        hidden_activation: Activation,
        output_activation: Activation,
        mutate: bool,
        ctx: &mut MutationCtx<'_>,
        rng: &mut StdRng,
    ) -> Self {
        let (node_order, genes) = match seed {
            Some(seed) => (seed.node_order.to_vec(), seed.genes.to_vec()),
            None => {
                let node_order: Vec<NodeId> = (0..input_count + output_count).collect();
                let mut genes = Vec::with_capacity(input_count * output_count);
                for from in 0..input_count {
                    for to in input_count..input_count + output_count {
                        genes.push(ConnectionGene {
                            from,
                            to,
                            weight: 0.0,
                            enabled: false,
                            innovation: ctx.registry.identity_for(from, to),
                        });
                    }
                }
                (node_order, genes)
            }
        };

        let mut genome = Self {
            input_count,
            output_count,
            hidden_activation,
            output_activation,
            genes,
            node_order,
            nodes: Vec::new(),
            fitness: 0.0,
            adjusted_fitness: 0.0,
        };

        if mutate {
            let active = genome.active_connection_count();
            if rng.gen_range(0.0..1.0f32) < ctx.rates.node && active < ctx.connection_cap {
                genome.add_node(ctx, rng);
            }
            if rng.gen_range(0.0..1.0f32) < ctx.rates.connection && active < ctx.connection_cap {
                genome.add_connection(ctx, rng);
            }
            if rng.gen_range(0.0..1.0f32) < ctx.rates.enable {
                genome.toggle_enable(ctx.connection_cap, rng);
            }
            if rng.gen_range(0.0..1.0f32) < ctx.rates.weight {
                genome.mutate_weights(ctx.rates.weight, rng);
            }
        }

        genome.rebuild();
        genome
    }

    /// Reconstruct from a parent's evaluation-order node list and genes,
    /// optionally mutating. This is how clones and offspring are admitted to
    /// a population.
    pub fn from_parent(
        parent: &Genome,
        mutate: bool,
        ctx: &mut MutationCtx<'_>,
        rng: &mut StdRng,
    ) -> Self {
        let order = parent.depth_order();
        Self::new(
            parent.input_count,
            parent.output_count,
            Some(GenomeSeed {
                node_order: &order,
                genes: &parent.genes,
            }),
            parent.hidden_activation,
            parent.output_activation,
            mutate,
            ctx,
            rng,
        )
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn output_count(&self) -> usize {
        self.output_count
    }

    pub fn hidden_activation(&self) -> Activation {
        self.hidden_activation
    }

    pub fn output_activation(&self) -> Activation {
        self.output_activation
    }

    /// The gene list, in creation order.
    pub fn genes(&self) -> &[ConnectionGene] {
        &self.genes
    }

    /// Node ids in evaluation order (ascending depth).
    pub fn depth_order(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    pub(crate) fn eval_nodes(&self) -> &[EvalNode] {
        &self.nodes
    }

    /// Number of enabled connection genes.
    pub fn active_connection_count(&self) -> usize {
        self.genes.iter().filter(|g| g.enabled).count()
    }

    /// Run one forward pass. `inputs` must hold exactly `input_count`
    /// values, bias included; the caller-facing layer enforces this.
    ///
    /// Inputs are written into the depth-0 nodes in evaluation order, hidden
    /// nodes apply the hidden activation, output nodes apply the output
    /// activation exactly once and are collected in evaluation order. All
    /// accumulators are cleared afterwards so consecutive calls with the same
    /// input produce identical results.
    pub fn guess(&mut self, inputs: &[f32]) -> Vec<f32> {
        debug_assert_eq!(inputs.len(), self.input_count);

        let mut outputs = Vec::with_capacity(self.output_count);
        let mut inputs_passed = 0;

        for i in 0..self.nodes.len() {
            let depth = self.nodes[i].depth;

            if depth == 0.0 {
                self.nodes[i].accum = inputs[inputs_passed];
                inputs_passed += 1;
            } else if depth != 1.0 {
                self.nodes[i].accum = self.hidden_activation.apply(self.nodes[i].accum);
            }

            if depth == 1.0 {
                self.nodes[i].accum = self.output_activation.apply(self.nodes[i].accum);
                outputs.push(self.nodes[i].accum);
            } else {
                let value = self.nodes[i].accum;
                for j in 0..self.nodes[i].outgoing.len() {
                    let (target, weight) = self.nodes[i].outgoing[j];
                    self.nodes[target].accum += value * weight;
                }
            }
        }

        for node in &mut self.nodes {
            node.accum = 0.0;
        }

        outputs
    }

    /// Weight mutation pass: per gene, 10% chance to leave it untouched,
    /// otherwise 10% chance of a fresh uniform weight, otherwise a Gaussian
    /// nudge scaled by the weight mutation rate. Weights are clamped after.
    fn mutate_weights(&mut self, rate: f32, rng: &mut StdRng) {
        for gene in &mut self.genes {
            if rng.gen_range(0.0..1.0f32) > 0.90 {
                continue;
            }
            if rng.gen_range(0.0..1.0f32) < 0.10 {
                gene.weight = rng.gen_range(-WEIGHT_RESET_BOUND..=WEIGHT_RESET_BOUND);
            } else {
                let noise: f32 = rng.sample(rand_distr::StandardNormal);
                gene.weight += noise * WEIGHT_NUDGE_SIGMA * rate;
            }
            gene.weight = gene.weight.clamp(-WEIGHT_CLAMP, WEIGHT_CLAMP);
        }
    }

    /// Try to connect two previously unconnected nodes. The source may not
    /// be an output, the target must come after the source in the working
    /// order and may not be an input; gives up after a bounded number of
    /// rejected picks.
    fn add_connection(&mut self, ctx: &mut MutationCtx<'_>, rng: &mut StdRng) {
        let Some(last_source) = self.node_order.len().checked_sub(self.output_count + 1) else {
            return;
        };

        for _ in 0..ADD_CONNECTION_ATTEMPTS {
            let from_index = rng.gen_range(0..=last_source);
            let to_index = rng.gen_range(from_index + 1..self.node_order.len());
            if to_index < self.input_count {
                continue;
            }

            let from = self.node_order[from_index];
            let to = self.node_order[to_index];
            if self.genes.iter().any(|g| g.from == from && g.to == to) {
                continue;
            }

            let weight = rng.gen_range(-1.0..=1.0f32);
            self.connect(ctx, from, to, weight);
            break;
        }
    }

    /// Flip one random gene. Enabling honours the active-connection cap;
    /// when enabling is refused the gene is disabled instead.
    fn toggle_enable(&mut self, connection_cap: usize, rng: &mut StdRng) {
        if self.genes.is_empty() {
            return;
        }
        let index = rng.gen_range(0..self.genes.len());
        if !self.genes[index].enabled && self.active_connection_count() < connection_cap {
            self.genes[index].enabled = true;
        } else {
            self.genes[index].enabled = false;
        }
    }

    /// Split one random gene with a fresh hidden node: the old gene is
    /// disabled and replaced by source->new with weight 1 and new->target
    /// with the old weight, preserving the approximated function right after
    /// the split. The new node lands roughly midway between its endpoints in
    /// the working order.
    fn add_node(&mut self, ctx: &mut MutationCtx<'_>, rng: &mut StdRng) {
        if self.genes.is_empty() {
            return;
        }
        let index = rng.gen_range(0..self.genes.len());
        let (from, to, weight) = {
            let gene = &self.genes[index];
            (gene.from, gene.to, gene.weight)
        };

        let Some(from_index) = self.node_order.iter().position(|&id| id == from) else {
            return;
        };
        let Some(to_index) = self.node_order.iter().position(|&id| id == to) else {
            return;
        };

        self.genes[index].enabled = false;

        let new_id = ctx.registry.allocate_node_id();
        let midpoint = (from_index as f32 + (to_index as f32 - from_index as f32) / 2.0).ceil();
        let insert_at = (midpoint.max(0.0) as usize).min(self.node_order.len());
        self.node_order.insert(insert_at, new_id);

        self.connect(ctx, from, new_id, 1.0);
        self.connect(ctx, new_id, to, weight);
    }

    /// Append an enabled gene, fetching its innovation id from the registry.
    fn connect(&mut self, ctx: &mut MutationCtx<'_>, from: NodeId, to: NodeId, weight: f32) {
        let innovation = ctx.registry.identity_for(from, to);
        self.genes.push(ConnectionGene {
            from,
            to,
            weight,
            enabled: true,
            innovation,
        });
    }

    /// Recompile the evaluation graph from the gene list.
    ///
    /// Depths: 0 for inputs, 1 for outputs, hidden nodes spread evenly over
    /// (0, 1) in working-order position. Only enabled genes are wired, and a
    /// gene whose endpoint is missing from the node table is left unwired.
    /// Nodes are stable-sorted by depth with ascending-id tie order; that
    /// sort is the evaluation order.
    fn rebuild(&mut self) {
        let io_count = self.input_count + self.output_count;
        let hidden_count = self
            .node_order
            .iter()
            .filter(|&&id| id >= io_count)
            .count();
        let separation = 1.0 / (hidden_count as f32 + 1.0);

        let mut seen = HashSet::with_capacity(self.node_order.len());
        let mut depths: Vec<(NodeId, f32)> = Vec::with_capacity(self.node_order.len());
        let mut hiddens_passed = 0;
        for &id in &self.node_order {
            if !seen.insert(id) {
                continue;
            }
            let depth = if id < self.input_count {
                0.0
            } else if id < io_count {
                1.0
            } else {
                hiddens_passed += 1;
                separation * hiddens_passed as f32
            };
            depths.push((id, depth));
        }

        depths.sort_by_key(|&(id, _)| id);
        let mut nodes: Vec<EvalNode> = depths
            .into_iter()
            .map(|(id, depth)| EvalNode {
                id,
                depth,
                accum: 0.0,
                outgoing: Vec::new(),
            })
            .collect();
        nodes.sort_by(|a, b| a.depth.total_cmp(&b.depth));

        let index_of: HashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        for gene in &self.genes {
            if !gene.enabled {
                continue;
            }
            if let (Some(&from), Some(&to)) = (index_of.get(&gene.from), index_of.get(&gene.to)) {
                nodes[from].outgoing.push((to, gene.weight));
            }
        }

        self.nodes = nodes;
    }
}
