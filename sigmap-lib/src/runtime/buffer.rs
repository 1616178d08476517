use std::fmt::Debug;

use crate::graph::ElementType;

/// Values flowing through one port, stored in the port's element type.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    Real(Vec<f64>),
    SmallReal(Vec<f32>),
    Integer(Vec<i32>),
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::Real(Vec::new())
    }
}

impl Buffer {
    pub fn zeros(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::Real => Buffer::Real(vec![0.0; len]),
            ElementType::SmallReal => Buffer::SmallReal(vec![0.0; len]),
            ElementType::Integer => Buffer::Integer(vec![0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Buffer::Real(_) => ElementType::Real,
            Buffer::SmallReal(_) => ElementType::SmallReal,
            Buffer::Integer(_) => ElementType::Integer,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::Real(v) => v.len(),
            Buffer::SmallReal(v) => v.len(),
            Buffer::Integer(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` widened to f64.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Buffer::Real(v) => v[index],
            Buffer::SmallReal(v) => v[index] as f64,
            Buffer::Integer(v) => v[index] as f64,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            Buffer::Real(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Overwrites the buffer from f64 values, converting to its own
    /// element type. Float-to-integer conversion truncates toward zero and
    /// saturates.
    pub fn store(&mut self, values: impl IntoIterator<Item = f64>) {
        match self {
            Buffer::Real(dst) => dst.iter_mut().zip(values).for_each(|(d, v)| *d = v),
            Buffer::SmallReal(dst) => dst.iter_mut().zip(values).for_each(|(d, v)| *d = v as f32),
            Buffer::Integer(dst) => dst.iter_mut().zip(values).for_each(|(d, v)| *d = v as i32),
        }
    }

    /// Element-wise conversion of `src` into this buffer's element type.
    pub fn convert_from(&mut self, src: &Buffer) {
        match (self, src) {
            (Buffer::Real(dst), Buffer::Real(s)) => dst.copy_from_slice(s),
            (Buffer::SmallReal(dst), Buffer::SmallReal(s)) => dst.copy_from_slice(s),
            (Buffer::Integer(dst), Buffer::Integer(s)) => dst.copy_from_slice(s),
            (dst, src) => dst.store(src.iter()),
        }
    }

    /// A copy of this buffer converted to `target`.
    pub fn converted_to(&self, target: ElementType) -> Buffer {
        let mut converted = Buffer::zeros(target, self.len());
        converted.convert_from(self);
        converted
    }
}

/// Host scalar types that can cross the compiled-map boundary.
pub trait Element: Copy + Debug + PartialEq + 'static {
    const ELEMENT_TYPE: ElementType;

    fn write(values: &[Self], dst: &mut Buffer) -> bool;

    fn read(src: &Buffer) -> Option<Vec<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;

            fn write(values: &[Self], dst: &mut Buffer) -> bool {
                match dst {
                    Buffer::$variant(d) if d.len() == values.len() => {
                        d.copy_from_slice(values);
                        true
                    }
                    _ => false,
                }
            }

            fn read(src: &Buffer) -> Option<Vec<Self>> {
                match src {
                    Buffer::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f64, Real);
impl_element!(f32, SmallReal);
impl_element!(i32, Integer);
