use std::sync::Arc;

use arrayvec::ArrayVec;

use super::types::{ElementType, NodeId, Port, PortRef, Shape, MAX_NODE_INPUTS, MAX_NODE_OUTPUTS};
use crate::nodes::{GruLayer, VoiceActivityDetector};

pub const OUTPUT_PORT: &str = "output";

/// The closed set of node kinds. Each variant carries its own parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Input {
        shape: Shape,
        element_type: ElementType,
    },
    Output {
        shape: Shape,
    },
    TypeCast {
        target: ElementType,
    },
    VoiceActivityDetector(Arc<VoiceActivityDetector>),
    GruLayer(Arc<GruLayer>),
}

/// How an input port constrains the shape of the port bound to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeRule {
    Any,
    NonEmpty,
    Exact(Shape),
    /// Any shape with this many elements.
    Size(usize),
}

impl ShapeRule {
    pub fn admits(self, shape: Shape) -> bool {
        match self {
            ShapeRule::Any => true,
            ShapeRule::NonEmpty => shape.size() > 0,
            ShapeRule::Exact(expected) => expected == shape,
            ShapeRule::Size(size) => shape.size() == size,
        }
    }

    /// Shape reported in errors when the rule is violated.
    pub fn expected_shape(self, found: Shape) -> Shape {
        match self {
            ShapeRule::Any => found,
            ShapeRule::NonEmpty => Shape::scalar(),
            ShapeRule::Exact(expected) => expected,
            ShapeRule::Size(size) => Shape::vector(size),
        }
    }
}

/// Declared contract for one input port of a node kind.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InputContract {
    pub name: &'static str,
    pub accepts: &'static [ElementType],
    pub shape: ShapeRule,
    /// Element type the kind computes in; `None` consumes the bound type as-is.
    pub compute_type: Option<ElementType>,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Input { .. } => "InputNode",
            NodeKind::Output { .. } => "OutputNode",
            NodeKind::TypeCast { .. } => "TypeCastNode",
            NodeKind::VoiceActivityDetector(_) => "VoiceActivityDetectorNode",
            NodeKind::GruLayer(_) => "GRULayerNode",
        }
    }

    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            NodeKind::VoiceActivityDetector(_) | NodeKind::GruLayer(_)
        )
    }

    pub fn input_contracts(&self) -> ArrayVec<InputContract, MAX_NODE_INPUTS> {
        let mut contracts = ArrayVec::new();
        match self {
            NodeKind::Input { .. } => {}
            NodeKind::Output { shape } => contracts.push(InputContract {
                name: "input",
                accepts: ElementType::ANY,
                shape: ShapeRule::Exact(*shape),
                compute_type: None,
            }),
            NodeKind::TypeCast { .. } => contracts.push(InputContract {
                name: "input",
                accepts: ElementType::ANY,
                shape: ShapeRule::Any,
                compute_type: None,
            }),
            NodeKind::VoiceActivityDetector(_) => contracts.push(InputContract {
                name: "input",
                accepts: ElementType::FLOATING,
                shape: ShapeRule::NonEmpty,
                compute_type: Some(ElementType::Real),
            }),
            NodeKind::GruLayer(layer) => {
                contracts.push(InputContract {
                    name: "input",
                    accepts: ElementType::FLOATING,
                    shape: ShapeRule::Size(layer.input_size()),
                    compute_type: Some(layer.element_type()),
                });
                contracts.push(InputContract {
                    name: "reset",
                    accepts: ElementType::ANY,
                    shape: ShapeRule::Size(1),
                    compute_type: None,
                });
            }
        }
        contracts
    }

    /// Derives the output ports from the resolved input ports. `inputs` is
    /// in contract order and has already passed validation.
    pub fn output_ports(&self, node: NodeId, inputs: &[Port]) -> ArrayVec<Port, MAX_NODE_OUTPUTS> {
        let (element_type, shape) = match self {
            NodeKind::Input {
                shape,
                element_type,
            } => (*element_type, *shape),
            NodeKind::Output { shape } => (inputs[0].element_type, *shape),
            NodeKind::TypeCast { target } => (*target, inputs[0].shape),
            NodeKind::VoiceActivityDetector(_) => (ElementType::Integer, Shape::scalar()),
            NodeKind::GruLayer(layer) => (layer.element_type(), Shape::vector(layer.hidden_size())),
        };
        let mut ports = ArrayVec::new();
        ports.push(Port {
            name: OUTPUT_PORT,
            element_type,
            shape,
            node,
        });
        ports
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: ArrayVec<PortRef, MAX_NODE_INPUTS>,
    pub(crate) outputs: ArrayVec<Port, MAX_NODE_OUTPUTS>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[PortRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn output_port(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|port| port.name == name)
    }
}
