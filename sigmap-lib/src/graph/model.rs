use slotmap::SlotMap;

use super::error::GraphError;
use super::node::Node;
use super::types::{NodeId, Port, PortRef};

/// Arena of nodes forming a directed acyclic graph.
///
/// Read access is public; mutation goes through [`ModelBuilder`](super::ModelBuilder).
#[derive(Clone, Debug, Default)]
pub struct Model {
    nodes: SlotMap<NodeId, Node>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Resolves a port reference, failing if either the node or the named
    /// port does not exist.
    pub fn resolve(&self, port: PortRef) -> Result<&Port, GraphError> {
        self.nodes
            .get(port.node)
            .and_then(|node| node.output_port(port.port))
            .ok_or_else(|| GraphError::DanglingReference {
                node: port.node,
                port: port.port.to_string(),
            })
    }

    /// Ids of the nodes `id` reads from, in input order.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| node.inputs.iter().map(|input| input.node).collect())
            .unwrap_or_default()
    }

    pub(crate) fn insert_with(&mut self, f: impl FnOnce(NodeId) -> Node) -> NodeId {
        self.nodes.insert_with_key(f)
    }

    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }
}
