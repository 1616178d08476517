mod artifact;
mod buffer;
mod interpreter;


pub use artifact::{CompiledArtifact, RuntimeError};
pub use buffer::{Buffer, Element};
pub use interpreter::InterpretedMap;
