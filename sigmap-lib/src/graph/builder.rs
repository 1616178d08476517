use std::sync::Arc;

use arrayvec::ArrayVec;
use tracing::trace;

use super::error::GraphError;
use super::model::Model;
use super::node::{Node, NodeKind, OUTPUT_PORT};
use super::types::{ElementType, NodeId, Port, PortRef, Shape, MAX_NODE_INPUTS, MAX_NODE_OUTPUTS};
use crate::nodes::{GruLayer, GruParameters, VoiceActivityDetector, VoiceActivityDetectorParams};

/// Handle to a node that was just appended to a model.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeHandle {
    id: NodeId,
    outputs: ArrayVec<Port, MAX_NODE_OUTPUTS>,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn output_port(&self, name: &str) -> Result<PortRef, GraphError> {
        self.outputs
            .iter()
            .find(|port| port.name == name)
            .map(Port::reference)
            .ok_or_else(|| GraphError::DanglingReference {
                node: self.id,
                port: name.to_string(),
            })
    }

    /// The node's `"output"` port. Every kind declares one.
    pub fn output(&self) -> PortRef {
        PortRef::new(self.id, OUTPUT_PORT)
    }
}

/// The only way to add nodes to a [`Model`].
///
/// Each `add_*` call validates its inputs against the kind's contract
/// before touching the model.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModelBuilder;

impl ModelBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn add_input_node(
        &self,
        model: &mut Model,
        shape: Shape,
        element_type: ElementType,
    ) -> Result<NodeHandle, GraphError> {
        if shape.size() == 0 {
            return Err(GraphError::invalid("InputNode", "shape must be non-empty"));
        }
        self.add_node(
            model,
            NodeKind::Input {
                shape,
                element_type,
            },
            &[],
        )
    }

    pub fn add_output_node(
        &self,
        model: &mut Model,
        shape: Shape,
        input: PortRef,
    ) -> Result<NodeHandle, GraphError> {
        self.add_node(model, NodeKind::Output { shape }, &[input])
    }

    pub fn add_type_cast_node(
        &self,
        model: &mut Model,
        input: PortRef,
        target: ElementType,
    ) -> Result<NodeHandle, GraphError> {
        self.add_node(model, NodeKind::TypeCast { target }, &[input])
    }

    pub fn add_voice_activity_detector_node(
        &self,
        model: &mut Model,
        input: PortRef,
        params: VoiceActivityDetectorParams,
    ) -> Result<NodeHandle, GraphError> {
        let detector = VoiceActivityDetector::new(params)?;
        self.add_node(
            model,
            NodeKind::VoiceActivityDetector(Arc::new(detector)),
            &[input],
        )
    }

    /// Adds a GRU layer reading `input` and cleared on falling edges of `reset`.
    pub fn add_gru_layer_node(
        &self,
        model: &mut Model,
        input: PortRef,
        reset: PortRef,
        params: GruParameters,
    ) -> Result<NodeHandle, GraphError> {
        let layer = GruLayer::new(params)?;
        self.add_node(model, NodeKind::GruLayer(Arc::new(layer)), &[input, reset])
    }

    fn add_node(
        &self,
        model: &mut Model,
        kind: NodeKind,
        inputs: &[PortRef],
    ) -> Result<NodeHandle, GraphError> {
        let contracts = kind.input_contracts();
        debug_assert_eq!(contracts.len(), inputs.len());

        let mut resolved = ArrayVec::<Port, MAX_NODE_INPUTS>::new();
        for (contract, &input) in contracts.iter().zip(inputs) {
            let port = *model.resolve(input)?;
            if !contract.accepts.contains(&port.element_type) {
                return Err(GraphError::TypeMismatch {
                    kind: kind.name(),
                    input: contract.name,
                    expected: contract.accepts,
                    found: port.element_type,
                });
            }
            if !contract.shape.admits(port.shape) {
                return Err(GraphError::ShapeMismatch {
                    kind: kind.name(),
                    input: contract.name,
                    expected: contract.shape.expected_shape(port.shape),
                    found: port.shape,
                });
            }
            resolved.push(port);
        }

        let name = kind.name();
        let input_refs: ArrayVec<PortRef, MAX_NODE_INPUTS> = inputs.iter().copied().collect();
        let mut outputs = ArrayVec::new();
        let id = model.insert_with(|id| {
            outputs = kind.output_ports(id, &resolved);
            Node {
                id,
                kind,
                inputs: input_refs,
                outputs: outputs.clone(),
            }
        });

        trace!(?id, kind = name, inputs = inputs.len(), "added node");
        Ok(NodeHandle { id, outputs })
    }
}
