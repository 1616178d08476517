use std::fmt;

use slotmap::new_key_type;

pub const MAX_NODE_INPUTS: usize = 4;
pub const MAX_NODE_OUTPUTS: usize = 4;

new_key_type! { pub struct NodeId; }

/// Numeric element type carried by a port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 64-bit float
    Real,
    /// 32-bit float
    SmallReal,
    /// 32-bit signed integer
    Integer,
}

impl ElementType {
    pub const ANY: &'static [ElementType] = &[
        ElementType::Real,
        ElementType::SmallReal,
        ElementType::Integer,
    ];
    pub const FLOATING: &'static [ElementType] = &[ElementType::Real, ElementType::SmallReal];

    pub fn is_floating(self) -> bool {
        matches!(self, ElementType::Real | ElementType::SmallReal)
    }

    /// Whether the compiler may convert `self` into `target` without an
    /// explicit cast node. Only the two float widths convert implicitly.
    pub fn converts_implicitly_to(self, target: ElementType) -> bool {
        self == target || (self.is_floating() && target.is_floating())
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Real => "real",
            ElementType::SmallReal => "smallReal",
            ElementType::Integer => "integer",
        };
        f.write_str(name)
    }
}

/// Row/column/channel extent of a port. Fixed once a port is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
    pub channels: usize,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize, channels: usize) -> Self {
        Self {
            rows,
            cols,
            channels,
        }
    }

    /// A `1 x 1 x len` vector shape.
    pub const fn vector(len: usize) -> Self {
        Self::new(1, 1, len)
    }

    pub const fn scalar() -> Self {
        Self::vector(1)
    }

    pub const fn size(&self) -> usize {
        self.rows * self.cols * self.channels
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.rows, self.cols, self.channels)
    }
}

/// An output attachment point on a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub name: &'static str,
    pub element_type: ElementType,
    pub shape: Shape,
    pub node: NodeId,
}

impl Port {
    pub fn reference(&self) -> PortRef {
        PortRef::new(self.node, self.name)
    }
}

/// Weak reference to an output port by node id and port name. Only
/// meaningful against the model that issued the node id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: &'static str,
}

impl PortRef {
    pub const fn new(node: NodeId, port: &'static str) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.node, self.port)
    }
}
