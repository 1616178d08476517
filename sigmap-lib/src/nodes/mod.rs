//! Stateful node kernels.
//!
//! Each kernel splits into an immutable, compiled part (coefficients,
//! weights) and a state value owned by whoever executes it.

pub mod activation;
pub mod gru;
pub mod vad;

pub use activation::Activation;
pub use gru::{GruLayer, GruParameters, GruState};
pub use vad::{frame_energy, VadState, VoiceActivityDetector, VoiceActivityDetectorParams};

/// Persistent per-node state, one variant per stateful node kind.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeState {
    VoiceActivity(VadState),
    Gru(GruState),
}
