//! Minimal forward-pass evaluator for exported networks.
//!
//! Reconstructs a frozen network from a [`NetworkDescriptor`] and runs
//! inference with no evolutionary state at all. Deployed hosts that only
//! need to *use* an evolved network load this instead of the full engine.

use crate::evolve::EngineError;
use crate::schema::{Activation, EdgeDescriptor, NetworkDescriptor};

/// A frozen network reconstructed from exported data.
///
/// Evaluation matches the engine's forward pass: edges are applied in
/// payload order, a non-input source node is activated once when first used
/// as a source, and the output activation is applied when outputs are
/// collected.
#[derive(Debug, Clone)]
pub struct FrozenNetwork {
    input_count: usize,
    output_count: usize,
    hidden_activation: Activation,
    output_activation: Activation,
    edges: Vec<EdgeDescriptor>,
    values: Vec<f32>,
    activated: Vec<bool>,
}

impl FrozenNetwork {
    /// Build an evaluator from a decoded descriptor.
    pub fn from_descriptor(descriptor: &NetworkDescriptor) -> Self {
        let size = descriptor.max_node_id() + 1;
        Self {
            input_count: descriptor.input_count,
            output_count: descriptor.output_count,
            hidden_activation: descriptor.hidden_activation,
            output_activation: descriptor.output_activation,
            edges: descriptor.edges.clone(),
            values: vec![0.0; size],
            activated: vec![false; size],
        }
    }

    /// Expected inference input length (bias excluded).
    pub fn input_size(&self) -> usize {
        self.input_count - 1
    }

    pub fn output_size(&self) -> usize {
        self.output_count
    }

    /// Run one forward pass. Takes `input_count - 1` values, appends the
    /// bias internally, and returns exactly `output_count` values.
    pub fn guess(&mut self, inputs: &[f32]) -> Result<Vec<f32>, EngineError> {
        let expected = self.input_count - 1;
        if inputs.len() != expected {
            return Err(EngineError::InputSizeMismatch {
                expected,
                got: inputs.len(),
            });
        }

        self.values.fill(0.0);
        self.activated.fill(false);
        self.values[..expected].copy_from_slice(inputs);
        self.values[expected] = 1.0;

        for edge in &self.edges {
            if edge.from >= self.input_count && !self.activated[edge.from] {
                self.values[edge.from] = self.hidden_activation.apply(self.values[edge.from]);
                self.activated[edge.from] = true;
            }
            self.values[edge.to] += self.values[edge.from] * edge.weight;
        }

        Ok((self.input_count..self.input_count + self.output_count)
            .map(|i| self.output_activation.apply(self.values[i]))
            .collect())
    }
}
