//! Canonical export of a frozen genome.
//!
//! Evolution leaves genomes with dead-end structure (hidden nodes whose
//! output no longer reaches any output node) and with sparse node ids
//! allocated across the whole run. Export prunes the former and remaps the
//! latter onto a dense 0-based range so external consumers see a compact,
//! self-contained network.

use std::collections::{HashMap, HashSet};

use crate::schema::{EdgeDescriptor, NetworkDescriptor};

use super::genome::{Genome, NodeId};

/// Prune and remap a genome into its canonical descriptor.
///
/// Reachability runs backward from the output nodes over the compiled
/// evaluation graph in reverse depth order: a node is kept if any of its
/// edges leads, directly or transitively, into a kept node. The remap
/// assigns inputs first, then outputs, then surviving hidden nodes in depth
/// order; only edges with two surviving endpoints are emitted.
pub fn canonical_descriptor(genome: &Genome) -> NetworkDescriptor {
    let nodes = genome.eval_nodes();
    let input_count = genome.input_count();
    let output_count = genome.output_count();

    let mut useful: HashSet<NodeId> = (input_count..input_count + output_count).collect();
    for node in nodes.iter().rev() {
        if useful.contains(&node.id) {
            continue;
        }
        if node
            .outgoing
            .iter()
            .any(|&(target, _)| useful.contains(&nodes[target].id))
        {
            useful.insert(node.id);
        }
    }

    let mut id_map: HashMap<NodeId, usize> = HashMap::new();
    for id in 0..input_count + output_count {
        id_map.insert(id, id);
    }
    let mut next_id = input_count + output_count;
    for node in nodes {
        if !id_map.contains_key(&node.id) && useful.contains(&node.id) {
            id_map.insert(node.id, next_id);
            next_id += 1;
        }
    }

    let mut edges = Vec::new();
    for node in nodes {
        let Some(&from) = id_map.get(&node.id) else {
            continue;
        };
        for &(target, weight) in &node.outgoing {
            if let Some(&to) = id_map.get(&nodes[target].id) {
                edges.push(EdgeDescriptor { from, to, weight });
            }
        }
    }

    NetworkDescriptor {
        input_count,
        output_count,
        hidden_activation: genome.hidden_activation(),
        output_activation: genome.output_activation(),
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolve::genome::{ConnectionGene, GenomeSeed, MutationCtx};
    use crate::evolve::innovation::InnovationRegistry;
    use crate::schema::{Activation, MutationRates};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gene(from: usize, to: usize, weight: f32, enabled: bool, innovation: usize) -> ConnectionGene {
        ConnectionGene {
            from,
            to,
            weight,
            enabled,
            innovation,
        }
    }

    fn build(order: &[usize], genes: &[ConnectionGene]) -> Genome {
        let rates = MutationRates::default();
        let mut registry = InnovationRegistry::default();
        let mut rng = StdRng::seed_from_u64(2);
        Genome::new(
            2,
            1,
            Some(GenomeSeed {
                node_order: order,
                genes,
            }),
            Activation::Tanh,
            Activation::Linear,
            false,
            &mut MutationCtx {
                rates: &rates,
                connection_cap: usize::MAX,
                registry: &mut registry,
            },
            &mut rng,
        )
    }

    #[test]
    fn prunes_dead_end_hidden_nodes() {
        // Node 9 feeds the output through node 7; node 5 goes nowhere.
        let order = vec![0, 1, 9, 5, 7, 2];
        let genes = [
            gene(0, 9, 0.5, true, 0),
            gene(9, 7, 0.25, true, 1),
            gene(7, 2, -1.0, true, 2),
            gene(1, 5, 3.0, true, 3),
        ];
        let descriptor = canonical_descriptor(&build(&order, &genes));

        assert_eq!(descriptor.input_count, 2);
        assert_eq!(descriptor.output_count, 1);
        // Nodes 9 and 7 survive as dense ids 3 and 4 (depth order);
        // node 5 and its incoming edge are gone.
        assert_eq!(descriptor.edges.len(), 3);
        assert_eq!(descriptor.max_node_id(), 4);
        let remapped: Vec<(usize, usize)> =
            descriptor.edges.iter().map(|e| (e.from, e.to)).collect();
        assert_eq!(remapped, vec![(0, 3), (3, 4), (4, 2)]);
    }

    #[test]
    fn disabled_edges_are_not_exported() {
        let order = vec![0, 1, 2];
        let genes = [gene(0, 2, 0.5, true, 0), gene(1, 2, 0.9, false, 1)];
        let descriptor = canonical_descriptor(&build(&order, &genes));
        assert_eq!(descriptor.edges.len(), 1);
        assert_eq!(descriptor.edges[0].from, 0);
        assert_eq!(descriptor.edges[0].to, 2);
    }

    #[test]
    fn output_only_network_exports_no_edges() {
        let order = vec![0, 1, 2];
        let genes = [gene(0, 2, 0.5, false, 0)];
        let descriptor = canonical_descriptor(&build(&order, &genes));
        assert!(descriptor.edges.is_empty());
        assert_eq!(descriptor.max_node_id(), 2);
    }
}
