use slotmap::SecondaryMap;
use thiserror::Error;
use tracing::debug;

use super::buffer::{Buffer, Element};
use crate::compiler::{CompileTarget, MapCompilerOptions, Op, ScheduledGraph, Step};
use crate::graph::{ElementType, NodeId};
use crate::nodes::{frame_energy, NodeState, VadState};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("frame has {found} elements, expected {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("frame element type is {found}, map signature is {expected}")]
    TypeMismatch {
        expected: ElementType,
        found: ElementType,
    },

    #[error("no state allocated for stateful node {0:?}")]
    MissingState(NodeId),
}

/// A compiled map: the schedule plus the value slots and per-node state
/// it executes against.
///
/// State is private to the artifact. Two artifacts compiled from the same
/// map never share it. `compute` mutates state in place, so calls must be
/// serialized by the caller.
#[derive(Debug)]
pub struct CompiledArtifact {
    schedule: ScheduledGraph,
    target: CompileTarget,
    options: MapCompilerOptions,
    slots: Vec<Buffer>,
    states: SecondaryMap<NodeId, NodeState>,
}

impl CompiledArtifact {
    pub(crate) fn new(
        schedule: ScheduledGraph,
        target: CompileTarget,
        options: MapCompilerOptions,
    ) -> Self {
        let slots = allocate_slots(&schedule);
        let states = initial_states(&schedule);
        Self {
            schedule,
            target,
            options,
            slots,
            states,
        }
    }

    pub fn target(&self) -> &CompileTarget {
        &self.target
    }

    pub fn options(&self) -> &MapCompilerOptions {
        &self.options
    }

    pub fn schedule(&self) -> &ScheduledGraph {
        &self.schedule
    }

    pub fn element_type(&self) -> ElementType {
        self.schedule.element_type
    }

    pub fn input_size(&self) -> usize {
        self.schedule.input_size()
    }

    pub fn output_size(&self) -> usize {
        self.schedule.output_size()
    }

    /// Persistent state of a stateful node, if `node` is one.
    pub fn node_state(&self, node: NodeId) -> Option<&NodeState> {
        self.states.get(node)
    }

    /// Restores every stateful node to its compile-time initial state.
    pub fn reset(&mut self) {
        self.slots = allocate_slots(&self.schedule);
        self.states = initial_states(&self.schedule);
        debug!(
            function = %self.target.function_name,
            stateful = self.states.len(),
            "reset compiled map"
        );
    }

    /// Runs one frame through every scheduled step and returns the
    /// selected outputs, concatenated in selection order.
    pub fn compute<T: Element>(&mut self, frame: &[T]) -> Result<Vec<T>, RuntimeError> {
        let expected = self.schedule.element_type;
        if T::ELEMENT_TYPE != expected {
            return Err(RuntimeError::TypeMismatch {
                expected,
                found: T::ELEMENT_TYPE,
            });
        }
        let input = &mut self.slots[self.schedule.input_slot];
        if !T::write(frame, input) {
            return Err(RuntimeError::ShapeMismatch {
                expected: input.len(),
                found: frame.len(),
            });
        }

        for step in &self.schedule.steps {
            execute(step, &mut self.slots, &mut self.states)?;
        }

        let mut result = Vec::with_capacity(self.schedule.output_size());
        for &slot in &self.schedule.output_slots {
            let buffer = &self.slots[slot];
            let values = T::read(buffer).ok_or(RuntimeError::TypeMismatch {
                expected: buffer.element_type(),
                found: T::ELEMENT_TYPE,
            })?;
            result.extend(values);
        }
        Ok(result)
    }
}

fn allocate_slots(schedule: &ScheduledGraph) -> Vec<Buffer> {
    schedule
        .slots
        .iter()
        .map(|slot| Buffer::zeros(slot.element_type, slot.len))
        .collect()
}

fn initial_states(schedule: &ScheduledGraph) -> SecondaryMap<NodeId, NodeState> {
    let mut states = SecondaryMap::new();
    for (node, op) in schedule.stateful_nodes() {
        let state = match op {
            Op::VoiceActivity(_) => NodeState::VoiceActivity(VadState::default()),
            Op::Gru(layer) => NodeState::Gru(layer.initial_state()),
            Op::Convert { .. } => continue,
        };
        states.insert(node, state);
    }
    states
}

fn execute(
    step: &Step,
    slots: &mut [Buffer],
    states: &mut SecondaryMap<NodeId, NodeState>,
) -> Result<(), RuntimeError> {
    let mut out = std::mem::take(&mut slots[step.output]);
    let result = match (&step.op, states.get_mut(step.node)) {
        (Op::Convert { .. }, _) => {
            out.convert_from(&slots[step.inputs[0]]);
            Ok(())
        }
        (Op::VoiceActivity(detector), Some(NodeState::VoiceActivity(state))) => {
            let input = &slots[step.inputs[0]];
            let active = match input.as_real() {
                Some(frame) => detector.process(state, frame),
                None => detector.update(state, frame_energy(input.iter())),
            };
            out.store([if active { 1.0 } else { 0.0 }]);
            Ok(())
        }
        (Op::Gru(layer), Some(NodeState::Gru(state))) => {
            let reset_active = slots[step.inputs[1]].get(0) != 0.0;
            let hidden = layer.step(state, slots[step.inputs[0]].iter(), reset_active);
            out.store(hidden.iter().copied());
            Ok(())
        }
        _ => Err(RuntimeError::MissingState(step.node)),
    };
    slots[step.output] = out;
    result
}
