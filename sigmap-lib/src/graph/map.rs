use std::sync::Arc;

use super::error::GraphError;
use super::model::Model;
use super::node::NodeKind;
use super::types::{ElementType, NodeId, PortRef, Shape};

/// Input/output signature over a shared, read-only model. The unit of
/// compilation.
#[derive(Clone, Debug)]
pub struct Map {
    model: Arc<Model>,
    input: NodeId,
    outputs: Vec<PortRef>,
}

impl Map {
    /// Creates a map after checking that `input` is an input node and that
    /// every output reference resolves. An empty output list is accepted
    /// here and rejected by the compiler.
    pub fn new(
        model: impl Into<Arc<Model>>,
        input: NodeId,
        outputs: Vec<PortRef>,
    ) -> Result<Self, GraphError> {
        let model = model.into();
        match model.node(input).map(|node| node.kind()) {
            Some(NodeKind::Input { .. }) => {}
            Some(_) => return Err(GraphError::NotAnInputNode(input)),
            None => {
                return Err(GraphError::DanglingReference {
                    node: input,
                    port: String::new(),
                })
            }
        }
        for &output in &outputs {
            model.resolve(output)?;
        }
        Ok(Self {
            model,
            input,
            outputs,
        })
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn input_node(&self) -> NodeId {
        self.input
    }

    pub fn outputs(&self) -> &[PortRef] {
        &self.outputs
    }

    /// Shape and element type the map's input node declares.
    pub fn input_signature(&self) -> Option<(Shape, ElementType)> {
        match self.model.node(self.input)?.kind() {
            NodeKind::Input {
                shape,
                element_type,
            } => Some((*shape, *element_type)),
            _ => None,
        }
    }
}
