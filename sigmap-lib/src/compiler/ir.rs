//! Scheduled, type-resolved representation of a map.
//!
//! This is what the compiler hands to a code-emission backend: a flat list
//! of steps in execution order, each reading and writing typed value
//! slots.

use std::collections::HashSet;
use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::graph::{ElementType, NodeId, MAX_NODE_INPUTS};
use crate::nodes::{GruLayer, VoiceActivityDetector};

pub type SlotId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub element_type: ElementType,
    pub len: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Element-wise conversion into the output slot's type. `implicit`
    /// marks conversions the compiler inserted in front of a consumer.
    Convert { implicit: bool },
    VoiceActivity(Arc<VoiceActivityDetector>),
    /// Inputs: data frame, reset signal.
    Gru(Arc<GruLayer>),
}

impl Op {
    pub fn is_stateful(&self) -> bool {
        matches!(self, Op::VoiceActivity(_) | Op::Gru(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Model node this step belongs to. Implicit conversions carry the id
    /// of the node they feed.
    pub node: NodeId,
    pub op: Op,
    pub inputs: ArrayVec<SlotId, MAX_NODE_INPUTS>,
    pub output: SlotId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledGraph {
    /// Every reachable node, dependencies first.
    pub order: Vec<NodeId>,
    pub steps: Vec<Step>,
    pub slots: Vec<SlotLayout>,
    /// Written from the caller's frame before the first step runs.
    pub input_slot: SlotId,
    pub output_slots: Vec<SlotId>,
    /// Element type shared by the map's input and all its outputs.
    pub element_type: ElementType,
    pub passes: Vec<String>,
}

impl ScheduledGraph {
    pub fn input_size(&self) -> usize {
        self.slots.get(self.input_slot).map_or(0, |slot| slot.len)
    }

    pub fn output_size(&self) -> usize {
        self.output_slots
            .iter()
            .filter_map(|&slot| self.slots.get(slot))
            .map(|slot| slot.len)
            .sum()
    }

    pub fn implicit_conversions(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.op, Op::Convert { implicit: true }))
            .count()
    }

    /// Nodes owning persistent state, in execution order.
    pub fn stateful_nodes(&self) -> impl Iterator<Item = (NodeId, &Op)> + '_ {
        self.steps
            .iter()
            .filter(|step| step.op.is_stateful())
            .map(|step| (step.node, &step.op))
    }

    /// Checks slot indices, that every slot is written before it is read,
    /// that stateful steps read the types their kernels expect and own
    /// distinct state, and that outputs carry the signature type.
    pub fn validate(&self) -> Result<(), String> {
        let slot = |id: SlotId| {
            self.slots
                .get(id)
                .ok_or_else(|| format!("Invalid slot index: {}", id))
        };

        let mut written = vec![false; self.slots.len()];
        let mut stateful = HashSet::new();
        slot(self.input_slot)?;
        written[self.input_slot] = true;

        for (index, step) in self.steps.iter().enumerate() {
            for &input in &step.inputs {
                slot(input)?;
                if !written[input] {
                    return Err(format!("Step {} reads slot {} before it is written", index, input));
                }
            }
            let output = slot(step.output)?;
            if step.op.is_stateful() && !stateful.insert(step.node) {
                return Err(format!("Step {}: node {:?} already owns state", index, step.node));
            }
            if written[step.output] {
                return Err(format!("Slot {} written twice", step.output));
            }
            written[step.output] = true;

            match &step.op {
                Op::Convert { .. } => {
                    if step.inputs.len() != 1 || self.slots[step.inputs[0]].len != output.len {
                        return Err(format!("Step {}: conversion must preserve length", index));
                    }
                }
                Op::VoiceActivity(_) => {
                    if step.inputs.len() != 1
                        || self.slots[step.inputs[0]].element_type != ElementType::Real
                    {
                        return Err(format!("Step {}: detector input must be real", index));
                    }
                }
                Op::Gru(layer) => {
                    if step.inputs.len() != 2 {
                        return Err(format!("Step {}: GRU takes data and reset inputs", index));
                    }
                    let data = self.slots[step.inputs[0]];
                    if data.element_type != layer.element_type() || data.len != layer.input_size() {
                        return Err(format!("Step {}: GRU data slot does not match layer", index));
                    }
                }
            }
        }

        for &output in &self.output_slots {
            if slot(output)?.element_type != self.element_type {
                return Err(format!("Output slot {} is not {}", output, self.element_type));
            }
            if !written[output] {
                return Err(format!("Output slot {} is never written", output));
            }
        }
        Ok(())
    }
}
