use thiserror::Error;

use super::types::{ElementType, NodeId, Shape};

/// Errors raised while building or validating a model.
///
/// Every builder operation validates before it mutates, so a returned
/// error leaves the model exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("reference to {node:?}.{port} does not resolve to an existing output port")]
    DanglingReference { node: NodeId, port: String },

    #[error("{kind} input `{input}` accepts {expected:?}, found {found}")]
    TypeMismatch {
        kind: &'static str,
        input: &'static str,
        expected: &'static [ElementType],
        found: ElementType,
    },

    #[error("{kind} input `{input}` expects shape {expected}, found {found}")]
    ShapeMismatch {
        kind: &'static str,
        input: &'static str,
        expected: Shape,
        found: Shape,
    },

    #[error("cycle detected in graph ({} nodes)", .0.len())]
    Cycle(Vec<NodeId>),

    #[error("invalid {kind} parameter: {message}")]
    InvalidParameter { kind: &'static str, message: String },

    #[error("node {0:?} is not an input node")]
    NotAnInputNode(NodeId),
}

impl GraphError {
    pub(crate) fn invalid(kind: &'static str, message: impl Into<String>) -> Self {
        GraphError::InvalidParameter {
            kind,
            message: message.into(),
        }
    }
}
