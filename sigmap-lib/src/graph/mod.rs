mod builder;
mod error;
mod map;
mod model;
mod node;
pub mod topology;
pub mod types;


pub use builder::{ModelBuilder, NodeHandle};
pub use error::GraphError;
pub use map::Map;
pub use model::Model;
pub use node::{InputContract, Node, NodeKind, ShapeRule, OUTPUT_PORT};
pub use types::{ElementType, NodeId, Port, PortRef, Shape, MAX_NODE_INPUTS, MAX_NODE_OUTPUTS};
