pub mod compiler;
pub mod dataset;
pub mod graph;
pub mod nodes;
pub mod runtime;

pub use compiler::{
    compile, compile_with, CodeEmitter, CompileError, CompileTarget, HostEmitter,
    MapCompilerOptions, OptimizerOptions,
};
pub use dataset::{Dataset, DatasetError, FrameDataset};
pub use graph::*;
pub use nodes::{Activation, GruParameters, NodeState, VoiceActivityDetectorParams};
pub use runtime::{CompiledArtifact, Element, InterpretedMap, RuntimeError};
