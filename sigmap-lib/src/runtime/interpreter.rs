use std::borrow::Cow;

use arrayvec::ArrayVec;
use slotmap::SecondaryMap;
use tracing::debug;

use super::artifact::RuntimeError;
use super::buffer::{Buffer, Element};
use crate::compiler::{check_inputs, plan, CompileError};
use crate::graph::{
    ElementType, GraphError, InputContract, Map, Node, NodeId, NodeKind, MAX_NODE_INPUTS,
};
use crate::nodes::{frame_energy, NodeState, VadState};

/// Evaluates a map by walking its model node by node, without lowering it
/// to a schedule.
///
/// Accepts exactly the maps the compiler accepts and produces the same
/// outputs, bit for bit, as a [`CompiledArtifact`](super::CompiledArtifact)
/// built from the same map. Like a compiled artifact, each instance owns
/// its node state.
#[derive(Debug)]
pub struct InterpretedMap {
    map: Map,
    element_type: ElementType,
    input_len: usize,
    /// Reachable nodes, dependencies first.
    nodes: Vec<Node>,
    /// Positions in `nodes` that each node reads from, in input order.
    inputs: Vec<ArrayVec<usize, MAX_NODE_INPUTS>>,
    outputs: Vec<usize>,
    values: Vec<Buffer>,
    states: SecondaryMap<NodeId, NodeState>,
}

impl InterpretedMap {
    pub fn new(map: &Map) -> Result<Self, CompileError> {
        let (input_shape, element_type, order) = plan(map)?;
        let model = map.model();

        let mut positions: SecondaryMap<NodeId, usize> = SecondaryMap::new();
        let mut nodes = Vec::with_capacity(order.len());
        let mut inputs = Vec::with_capacity(order.len());
        for id in order {
            let node = model.node(id).ok_or_else(|| GraphError::DanglingReference {
                node: id,
                port: String::new(),
            })?;
            check_inputs(map, node)?;

            let reads = node
                .inputs()
                .iter()
                .map(|input| {
                    positions.get(input.node).copied().ok_or_else(|| {
                        CompileError::from(GraphError::DanglingReference {
                            node: input.node,
                            port: input.port.to_string(),
                        })
                    })
                })
                .collect::<Result<ArrayVec<_, MAX_NODE_INPUTS>, _>>()?;

            positions.insert(id, nodes.len());
            nodes.push(node.clone());
            inputs.push(reads);
        }

        let outputs = map
            .outputs()
            .iter()
            .map(|output| {
                positions.get(output.node).copied().ok_or_else(|| {
                    CompileError::from(GraphError::DanglingReference {
                        node: output.node,
                        port: output.port.to_string(),
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(nodes = nodes.len(), outputs = outputs.len(), "prepared interpreted map");
        let states = initial_states(&nodes);
        Ok(Self {
            map: map.clone(),
            element_type,
            input_len: input_shape.size(),
            values: vec![Buffer::default(); nodes.len()],
            nodes,
            inputs,
            outputs,
            states,
        })
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn input_size(&self) -> usize {
        self.input_len
    }

    pub fn output_size(&self) -> usize {
        self.outputs.iter().map(|&i| self.nodes[i].outputs()[0].shape.size()).sum()
    }

    pub fn node_state(&self, node: NodeId) -> Option<&NodeState> {
        self.states.get(node)
    }

    /// Restores every stateful node to its initial state.
    pub fn reset(&mut self) {
        self.values = vec![Buffer::default(); self.nodes.len()];
        self.states = initial_states(&self.nodes);
    }

    /// Evaluates every reachable node once, in dependency order, and
    /// returns the selected outputs concatenated in selection order.
    pub fn compute<T: Element>(&mut self, frame: &[T]) -> Result<Vec<T>, RuntimeError> {
        if T::ELEMENT_TYPE != self.element_type {
            return Err(RuntimeError::TypeMismatch {
                expected: self.element_type,
                found: T::ELEMENT_TYPE,
            });
        }
        if frame.len() != self.input_len {
            return Err(RuntimeError::ShapeMismatch {
                expected: self.input_len,
                found: frame.len(),
            });
        }

        for index in 0..self.nodes.len() {
            let value = evaluate(
                &self.nodes[index],
                &self.inputs[index],
                &self.values,
                &mut self.states,
                frame,
            )?;
            self.values[index] = value;
        }

        let mut result = Vec::with_capacity(self.output_size());
        for &index in &self.outputs {
            let value = &self.values[index];
            result.extend(T::read(value).ok_or(RuntimeError::TypeMismatch {
                expected: value.element_type(),
                found: T::ELEMENT_TYPE,
            })?);
        }
        Ok(result)
    }
}

impl Map {
    /// Prepares an interpreter over this map.
    pub fn interpret(&self) -> Result<InterpretedMap, CompileError> {
        InterpretedMap::new(self)
    }
}

/// `value` converted to the type its contract computes in, if any.
fn operand<'a>(value: &'a Buffer, contract: &InputContract) -> Cow<'a, Buffer> {
    match contract.compute_type {
        Some(compute) if compute != value.element_type() => Cow::Owned(value.converted_to(compute)),
        _ => Cow::Borrowed(value),
    }
}

fn initial_states(nodes: &[Node]) -> SecondaryMap<NodeId, NodeState> {
    let mut states = SecondaryMap::new();
    for node in nodes {
        let state = match node.kind() {
            NodeKind::VoiceActivityDetector(_) => NodeState::VoiceActivity(VadState::default()),
            NodeKind::GruLayer(layer) => NodeState::Gru(layer.initial_state()),
            _ => continue,
        };
        states.insert(node.id(), state);
    }
    states
}

fn evaluate<T: Element>(
    node: &Node,
    inputs: &[usize],
    values: &[Buffer],
    states: &mut SecondaryMap<NodeId, NodeState>,
    frame: &[T],
) -> Result<Buffer, RuntimeError> {
    let contracts = node.kind().input_contracts();
    let bound = |n: usize| operand(&values[inputs[n]], &contracts[n]);

    match node.kind() {
        NodeKind::Input {
            shape,
            element_type,
        } => {
            let mut value = Buffer::zeros(*element_type, shape.size());
            if !T::write(frame, &mut value) {
                return Err(RuntimeError::ShapeMismatch {
                    expected: value.len(),
                    found: frame.len(),
                });
            }
            Ok(value)
        }
        NodeKind::Output { .. } => Ok(bound(0).into_owned()),
        NodeKind::TypeCast { target } => Ok(bound(0).converted_to(*target)),
        NodeKind::VoiceActivityDetector(detector) => {
            let Some(NodeState::VoiceActivity(state)) = states.get_mut(node.id()) else {
                return Err(RuntimeError::MissingState(node.id()));
            };
            let active = detector.update(state, frame_energy(bound(0).iter()));
            Ok(Buffer::Integer(vec![i32::from(active)]))
        }
        NodeKind::GruLayer(layer) => {
            let Some(NodeState::Gru(state)) = states.get_mut(node.id()) else {
                return Err(RuntimeError::MissingState(node.id()));
            };
            let reset_active = bound(1).get(0) != 0.0;
            let data = bound(0);
            let hidden = layer.step(state, data.iter(), reset_active);
            let mut value = Buffer::zeros(layer.element_type(), layer.hidden_size());
            value.store(hidden.iter().copied());
            Ok(value)
        }
    }
}
