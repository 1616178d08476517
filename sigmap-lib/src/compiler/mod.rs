//! Compiles a [`Map`] into a [`CompiledArtifact`].
//!
//! Lowering orders the reachable nodes topologically, resolves element
//! types (inserting real/smallReal conversions where a kind computes in a
//! different float width), assigns value slots and hands the resulting
//! [`ScheduledGraph`] to a [`CodeEmitter`].

pub mod ir;
mod options;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use arrayvec::ArrayVec;
use thiserror::Error;
use tracing::debug;

use crate::graph::topology::{topological_sort, TopologyError};
use crate::graph::{
    ElementType, GraphError, InputContract, Map, Node, NodeId, NodeKind, Port, PortRef, Shape,
    MAX_NODE_INPUTS, OUTPUT_PORT,
};
use crate::runtime::CompiledArtifact;

pub use ir::{Op, ScheduledGraph, SlotId, SlotLayout, Step};
pub use options::{CompileTarget, MapCompilerOptions, OptimizerOptions};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{context}: no conversion from {found} to {expected} without an explicit TypeCastNode")]
    UnsupportedTypeCombination {
        context: &'static str,
        expected: ElementType,
        found: ElementType,
    },

    #[error("map selects no outputs")]
    EmptyOutputSelection,

    #[error("input node {0:?} is reachable but is not the map's input")]
    UnboundInputNode(NodeId),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl From<TopologyError<NodeId>> for CompileError {
    fn from(err: TopologyError<NodeId>) -> Self {
        match err {
            TopologyError::CycleDetected { path } => GraphError::Cycle(path).into(),
        }
    }
}

/// Backend that turns a scheduled graph into something callable.
pub trait CodeEmitter {
    type Artifact;

    fn emit(
        &mut self,
        graph: ScheduledGraph,
        target: &CompileTarget,
        options: &MapCompilerOptions,
    ) -> Result<Self::Artifact, CompileError>;
}

/// Emits artifacts that execute the schedule directly on the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostEmitter;

impl CodeEmitter for HostEmitter {
    type Artifact = CompiledArtifact;

    fn emit(
        &mut self,
        graph: ScheduledGraph,
        target: &CompileTarget,
        options: &MapCompilerOptions,
    ) -> Result<CompiledArtifact, CompileError> {
        graph.validate().map_err(CompileError::InvalidSchedule)?;
        Ok(CompiledArtifact::new(graph, target.clone(), options.clone()))
    }
}

/// Compiles `map` for the host.
pub fn compile(
    map: &Map,
    target: CompileTarget,
    options: &MapCompilerOptions,
) -> Result<CompiledArtifact, CompileError> {
    compile_with(map, target, options, &mut HostEmitter)
}

/// Compiles `map` and hands the schedule to `emitter`. Nothing is emitted
/// unless lowering succeeds.
pub fn compile_with<E: CodeEmitter>(
    map: &Map,
    target: CompileTarget,
    options: &MapCompilerOptions,
    emitter: &mut E,
) -> Result<E::Artifact, CompileError> {
    let graph = lower(map, options)?;
    debug!(
        platform = %target.platform,
        module = %target.module_name,
        function = %target.function_name,
        nodes = graph.order.len(),
        steps = graph.steps.len(),
        implicit_conversions = graph.implicit_conversions(),
        stateful = graph.stateful_nodes().count(),
        use_blas = options.use_blas,
        passes = ?options.optimizer.passes,
        "compiled map"
    );
    emitter.emit(graph, &target, options)
}

impl Map {
    pub fn compile(
        &self,
        target: CompileTarget,
        options: &MapCompilerOptions,
    ) -> Result<CompiledArtifact, CompileError> {
        compile(self, target, options)
    }
}

#[derive(Default)]
struct Lowering {
    steps: Vec<Step>,
    slots: Vec<SlotLayout>,
    ports: HashMap<PortRef, SlotId>,
}

impl Lowering {
    fn slot(&mut self, element_type: ElementType, len: usize) -> SlotId {
        self.slots.push(SlotLayout { element_type, len });
        self.slots.len() - 1
    }

    fn push(
        &mut self,
        node: NodeId,
        op: Op,
        inputs: ArrayVec<SlotId, MAX_NODE_INPUTS>,
        element_type: ElementType,
        len: usize,
    ) -> SlotId {
        let output = self.slot(element_type, len);
        self.steps.push(Step {
            node,
            op,
            inputs,
            output,
        });
        output
    }
}

/// Checks shared by every evaluation path: a non-empty output selection
/// whose element types all match the map input. Returns the input shape,
/// the signature type and the schedule order.
pub(crate) fn plan(map: &Map) -> Result<(Shape, ElementType, Vec<NodeId>), CompileError> {
    if map.outputs().is_empty() {
        return Err(CompileError::EmptyOutputSelection);
    }
    let model = map.model();

    let (input_shape, element_type) = map
        .input_signature()
        .ok_or(GraphError::NotAnInputNode(map.input_node()))?;
    for &output in map.outputs() {
        let port = model.resolve(output)?;
        if port.element_type != element_type {
            return Err(CompileError::UnsupportedTypeCombination {
                context: "map output",
                expected: element_type,
                found: port.element_type,
            });
        }
    }

    let roots = std::iter::once(map.input_node()).chain(map.outputs().iter().map(|o| o.node));
    let order = topological_sort(roots, |&id| model.dependencies(id))?;
    Ok((input_shape, element_type, order))
}

/// Re-checks `node`'s bound inputs against its kind's contracts and
/// returns them paired with the resolved ports, in contract order.
pub(crate) fn check_inputs(
    map: &Map,
    node: &Node,
) -> Result<ArrayVec<(InputContract, Port), MAX_NODE_INPUTS>, CompileError> {
    let kind = node.kind();
    if let NodeKind::Input { .. } = kind {
        if node.id() != map.input_node() {
            return Err(CompileError::UnboundInputNode(node.id()));
        }
    }
    let contracts = kind.input_contracts();
    if contracts.len() != node.inputs().len() {
        return Err(CompileError::InvalidSchedule(format!(
            "{} has {} inputs, expected {}",
            kind.name(),
            node.inputs().len(),
            contracts.len()
        )));
    }

    let mut checked = ArrayVec::new();
    for (contract, &input) in contracts.into_iter().zip(node.inputs()) {
        let port = *map.model().resolve(input)?;
        if !contract.accepts.contains(&port.element_type) {
            return Err(GraphError::TypeMismatch {
                kind: kind.name(),
                input: contract.name,
                expected: contract.accepts,
                found: port.element_type,
            }
            .into());
        }
        if !contract.shape.admits(port.shape) {
            return Err(GraphError::ShapeMismatch {
                kind: kind.name(),
                input: contract.name,
                expected: contract.shape.expected_shape(port.shape),
                found: port.shape,
            }
            .into());
        }
        if let Some(compute) = contract.compute_type {
            if !port.element_type.converts_implicitly_to(compute) {
                return Err(CompileError::UnsupportedTypeCombination {
                    context: kind.name(),
                    expected: compute,
                    found: port.element_type,
                });
            }
        }
        checked.push((contract, port));
    }
    Ok(checked)
}

/// Lowers a map into a scheduled graph without emitting anything.
pub fn lower(map: &Map, options: &MapCompilerOptions) -> Result<ScheduledGraph, CompileError> {
    let (input_shape, element_type, order) = plan(map)?;
    let model = map.model();

    let mut lowering = Lowering::default();
    let input_slot = lowering.slot(element_type, input_shape.size());

    for &id in &order {
        let node = model.node(id).ok_or_else(|| GraphError::DanglingReference {
            node: id,
            port: String::new(),
        })?;
        let checked = check_inputs(map, node)?;

        // Resolve every input to a slot in the type the kind computes in.
        let mut inputs = ArrayVec::<SlotId, MAX_NODE_INPUTS>::new();
        let mut input_types = ArrayVec::<ElementType, MAX_NODE_INPUTS>::new();
        for ((contract, port), &input) in checked.iter().zip(node.inputs()) {
            let mut slot = lowering.ports.get(&input).copied().ok_or_else(|| {
                GraphError::DanglingReference {
                    node: input.node,
                    port: input.port.to_string(),
                }
            })?;
            let mut slot_type = port.element_type;

            if let Some(compute) = contract.compute_type.filter(|&c| c != slot_type) {
                let mut from = ArrayVec::new();
                from.push(slot);
                slot = lowering.push(
                    id,
                    Op::Convert { implicit: true },
                    from,
                    compute,
                    port.shape.size(),
                );
                slot_type = compute;
            }
            inputs.push(slot);
            input_types.push(slot_type);
        }

        let output = PortRef::new(id, OUTPUT_PORT);
        let slot = match node.kind() {
            NodeKind::Input { .. } => input_slot,
            NodeKind::Output { .. } => inputs[0],
            NodeKind::TypeCast { target } => {
                if options.optimizer.fold_identity_casts && input_types[0] == *target {
                    inputs[0]
                } else {
                    let len = lowering.slots[inputs[0]].len;
                    lowering.push(id, Op::Convert { implicit: false }, inputs, *target, len)
                }
            }
            NodeKind::VoiceActivityDetector(detector) => lowering.push(
                id,
                Op::VoiceActivity(detector.clone()),
                inputs,
                ElementType::Integer,
                1,
            ),
            NodeKind::GruLayer(layer) => {
                let (layer_type, hidden) = (layer.element_type(), layer.hidden_size());
                lowering.push(id, Op::Gru(layer.clone()), inputs, layer_type, hidden)
            }
        };
        lowering.ports.insert(output, slot);
    }

    let output_slots = map
        .outputs()
        .iter()
        .map(|output| {
            lowering.ports.get(output).copied().ok_or_else(|| {
                CompileError::from(GraphError::DanglingReference {
                    node: output.node,
                    port: output.port.to_string(),
                })
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ScheduledGraph {
        order,
        steps: lowering.steps,
        slots: lowering.slots,
        input_slot,
        output_slots,
        element_type,
        passes: options.optimizer.passes.clone(),
    })
}
