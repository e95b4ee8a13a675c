//! Flat numeric descriptor for frozen networks.
//!
//! The exchange format between the evolutionary engine and external
//! consumers is a plain sequence of numbers:
//!
//! ```text
//! [input_count, output_count, hidden_code, output_code,
//!  from_0, to_0, weight_0,
//!  from_1, to_1, weight_1, ...]
//! ```
//!
//! Activation codes are 0 = leaky relu, 1 = linear, 2 = sigmoid, 3 = tanh.
//! Node ids are dense: inputs first (the last input is the bias), then
//! outputs, then hidden nodes. Every listed edge is enabled.

use serde::{Deserialize, Serialize};

use super::Activation;

/// One directed, weighted edge of a frozen network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub from: usize,
    pub to: usize,
    pub weight: f32,
}

/// A frozen network in its canonical exported form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// Input node count, bias included.
    pub input_count: usize,
    /// Output node count.
    pub output_count: usize,
    /// Activation applied to hidden nodes.
    pub hidden_activation: Activation,
    /// Activation applied to output nodes.
    pub output_activation: Activation,
    /// Edge list in evaluation order.
    pub edges: Vec<EdgeDescriptor>,
}

impl NetworkDescriptor {
    /// Decode a flat payload, validating its shape. Never partially
    /// succeeds: any violation leaves the caller with only the error.
    pub fn decode(data: &[f32]) -> Result<Self, DescriptorError> {
        if data.len() < 4 {
            return Err(DescriptorError::TooShort { len: data.len() });
        }
        let input_count = decode_count(data[0], "input count")?;
        let output_count = decode_count(data[1], "output count")?;
        if input_count == 0 {
            return Err(DescriptorError::InvalidCount {
                field: "input count",
                value: data[0],
            });
        }
        if output_count == 0 {
            return Err(DescriptorError::InvalidCount {
                field: "output count",
                value: data[1],
            });
        }
        let hidden_activation = decode_activation(data[2])?;
        let output_activation = decode_activation(data[3])?;

        let body = &data[4..];
        if body.len() % 3 != 0 {
            return Err(DescriptorError::TruncatedEdge {
                edge: body.len() / 3,
            });
        }

        let mut edges = Vec::with_capacity(body.len() / 3);
        for (i, triple) in body.chunks_exact(3).enumerate() {
            let from = decode_id(triple[0], i)?;
            let to = decode_id(triple[1], i)?;
            let weight = triple[2];
            if !weight.is_finite() {
                return Err(DescriptorError::NonFiniteWeight { edge: i });
            }
            edges.push(EdgeDescriptor { from, to, weight });
        }

        Ok(Self {
            input_count,
            output_count,
            hidden_activation,
            output_activation,
            edges,
        })
    }

    /// Encode to the flat payload form accepted by [`decode`](Self::decode).
    pub fn encode(&self) -> Vec<f32> {
        let mut data = Vec::with_capacity(4 + self.edges.len() * 3);
        data.push(self.input_count as f32);
        data.push(self.output_count as f32);
        data.push(f32::from(self.hidden_activation.code()));
        data.push(f32::from(self.output_activation.code()));
        for edge in &self.edges {
            data.push(edge.from as f32);
            data.push(edge.to as f32);
            data.push(edge.weight);
        }
        data
    }

    /// Largest node id referenced by the descriptor, counting the
    /// input/output blocks even when no edge touches them.
    pub fn max_node_id(&self) -> usize {
        let mut max_id = self.input_count + self.output_count - 1;
        for edge in &self.edges {
            max_id = max_id.max(edge.from).max(edge.to);
        }
        max_id
    }
}

fn decode_count(value: f32, field: &'static str) -> Result<usize, DescriptorError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(DescriptorError::InvalidCount { field, value })
    }
}

fn decode_activation(value: f32) -> Result<Activation, DescriptorError> {
    if value.is_finite() && value.fract() == 0.0 && (0.0..=3.0).contains(&value) {
        // Safe: value is integral in 0..=3.
        Ok(Activation::from_code(value as u8).unwrap_or(Activation::Tanh))
    } else {
        Err(DescriptorError::InvalidActivationCode { value })
    }
}

fn decode_id(value: f32, edge: usize) -> Result<usize, DescriptorError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(DescriptorError::InvalidEdgeEndpoint { edge, value })
    }
}

/// Payload validation errors.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("payload length {len} is below the 4-entry header")]
    TooShort { len: usize },
    #[error("{field} {value} is not a non-negative integer")]
    InvalidCount { field: &'static str, value: f32 },
    #[error("activation code {value} is not one of 0, 1, 2, 3")]
    InvalidActivationCode { value: f32 },
    #[error("edge {edge} is incomplete; edges are (from, to, weight) triples")]
    TruncatedEdge { edge: usize },
    #[error("edge {edge} endpoint {value} is not a non-negative integer")]
    InvalidEdgeEndpoint { edge: usize, value: f32 },
    #[error("edge {edge} weight is not finite")]
    NonFiniteWeight { edge: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_minimal_payload() {
        let d = NetworkDescriptor::decode(&[3.0, 1.0, 3.0, 1.0]).unwrap();
        assert_eq!(d.input_count, 3);
        assert_eq!(d.output_count, 1);
        assert_eq!(d.hidden_activation, Activation::Tanh);
        assert_eq!(d.output_activation, Activation::Linear);
        assert!(d.edges.is_empty());
        assert_eq!(d.max_node_id(), 3);
    }

    #[test]
    fn rejects_short_payload() {
        assert!(matches!(
            NetworkDescriptor::decode(&[3.0, 1.0, 0.0]),
            Err(DescriptorError::TooShort { len: 3 })
        ));
    }

    #[test]
    fn rejects_bad_activation_code() {
        assert!(matches!(
            NetworkDescriptor::decode(&[3.0, 1.0, 7.0, 1.0]),
            Err(DescriptorError::InvalidActivationCode { .. })
        ));
    }

    #[test]
    fn rejects_truncated_edge() {
        assert!(matches!(
            NetworkDescriptor::decode(&[3.0, 1.0, 0.0, 1.0, 0.0, 3.0]),
            Err(DescriptorError::TruncatedEdge { .. })
        ));
    }

    #[test]
    fn rejects_fractional_endpoint() {
        assert!(matches!(
            NetworkDescriptor::decode(&[3.0, 1.0, 0.0, 1.0, 0.5, 3.0, 1.0]),
            Err(DescriptorError::InvalidEdgeEndpoint { edge: 0, .. })
        ));
    }

    #[test]
    fn rejects_non_finite_weight() {
        assert!(matches!(
            NetworkDescriptor::decode(&[3.0, 1.0, 0.0, 1.0, 0.0, 3.0, f32::NAN]),
            Err(DescriptorError::NonFiniteWeight { edge: 0 })
        ));
    }

    proptest! {
        #[test]
        fn encode_decode_round_trips(
            input_count in 1usize..16,
            output_count in 1usize..8,
            hidden_code in 0u8..4,
            output_code in 0u8..4,
            raw_edges in proptest::collection::vec((0usize..32, 0usize..32, -10.0f32..10.0), 0..40),
        ) {
            let descriptor = NetworkDescriptor {
                input_count,
                output_count,
                hidden_activation: Activation::from_code(hidden_code).unwrap(),
                output_activation: Activation::from_code(output_code).unwrap(),
                edges: raw_edges
                    .into_iter()
                    .map(|(from, to, weight)| EdgeDescriptor { from, to, weight })
                    .collect(),
            };
            let decoded = NetworkDescriptor::decode(&descriptor.encode()).unwrap();
            prop_assert_eq!(decoded, descriptor);
        }
    }
}
