//! Columnar vectors.
//!
//! A [`Vector`] holds a batch of values column-wise. Flat and composite
//! vectors hold values of one type; the Const, Dict and View forms wrap a
//! base vector; a Dynamic holds values of several types side by side.
//! Every variant is reference-counted, so cloning a vector is cheap and
//! consumers treat vectors as shared and immutable.

mod algebra;
mod bitmap;
mod builder;
mod composite;
mod flat;
pub mod kernels;
mod kind;
mod modifiers;

use std::sync::Arc;

pub use algebra::{apply, combine, flatten, pick, reverse_pick, under};
pub use bitmap::{Bitmap, nonempty, or_nulls};
pub use builder::{VectorBuilder, from_values, new_builder};
pub use composite::{ErrorVec, List, MapVec, Named, OptField, Record, RecordField, UnionVec};
pub use flat::{Bools, Floats, Ints, Ips, Nets, Strs, Uints};
pub use kind::{Form, Kind};
pub use modifiers::{Const, Dict, Dynamic, TagMap, View, new_dynamic};

use crate::codec::Builder;
use crate::types::{Type, TypeKind};
use crate::value::Value;

/// Capabilities shared by every vector variant.
pub trait Any {
    fn ty(&self) -> Type;
    fn len(&self) -> u32;
    /// Appends the framed element at `slot` to `b`.
    fn serialize(&self, b: &mut Builder, slot: u32);
}

#[derive(Debug, Clone)]
pub enum Vector {
    /// All-null vector of type `null`.
    Null(u32),
    Bool(Arc<Bools>),
    Int(Arc<Ints>),
    Uint(Arc<Uints>),
    Float(Arc<Floats>),
    /// Strings, bytes and type values.
    Bytes(Arc<Strs>),
    Ip(Arc<Ips>),
    Net(Arc<Nets>),
    Record(Arc<Record>),
    Array(Arc<List>),
    Set(Arc<List>),
    Map(Arc<MapVec>),
    Union(Arc<UnionVec>),
    Enum(Arc<Uints>),
    Named(Arc<Named>),
    Error(Arc<ErrorVec>),
    Const(Arc<Const>),
    Dict(Arc<Dict>),
    View(Arc<View>),
    Dynamic(Arc<Dynamic>),
}

macro_rules! dispatch {
    ($self:expr, $v:ident => $body:expr, null($n:ident) => $null:expr) => {
        match $self {
            Vector::Null($n) => $null,
            Vector::Bool($v) => $body,
            Vector::Int($v) => $body,
            Vector::Uint($v) => $body,
            Vector::Float($v) => $body,
            Vector::Bytes($v) => $body,
            Vector::Ip($v) => $body,
            Vector::Net($v) => $body,
            Vector::Record($v) => $body,
            Vector::Array($v) => $body,
            Vector::Set($v) => $body,
            Vector::Map($v) => $body,
            Vector::Union($v) => $body,
            Vector::Enum($v) => $body,
            Vector::Named($v) => $body,
            Vector::Error($v) => $body,
            Vector::Const($v) => $body,
            Vector::Dict($v) => $body,
            Vector::View($v) => $body,
            Vector::Dynamic($v) => $body,
        }
    };
}

impl Any for Vector {
    /// # Panics
    /// On a dynamic vector.
    fn ty(&self) -> Type {
        dispatch!(self, v => v.ty(), null(_n) => Type::null())
    }

    fn len(&self) -> u32 {
        dispatch!(self, v => v.len(), null(n) => *n)
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        dispatch!(self, v => v.serialize(b, slot), null(_n) => b.append_null())
    }
}

impl Vector {
    /// A const vector of `len` copies of `value`.
    pub fn new_const(value: Value, len: u32) -> Vector {
        Vector::Const(Arc::new(Const { value, len }))
    }

    pub fn new_view(base: Vector, index: Vec<u32>) -> Vector {
        Vector::View(Arc::new(View { base, index }))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Vector::Dynamic(_))
    }

    /// The type of the value at `slot`. Unlike [`Any::ty`] this works on
    /// dynamic vectors.
    pub fn type_of(&self, slot: u32) -> Type {
        match self {
            Vector::Dynamic(d) => {
                let (vec, inner) = d.locate(slot);
                vec.type_of(inner)
            }
            Vector::View(v) => v.base.type_of(v.index[slot as usize]),
            Vector::Dict(d) => d.base.type_of(d.index[slot as usize] as u32),
            _ => self.ty(),
        }
    }

    /// Materializes the value at `slot`.
    pub fn value(&self, slot: u32) -> Value {
        match self {
            Vector::Const(c) => c.value.clone(),
            Vector::Dynamic(d) => {
                let (vec, inner) = d.locate(slot);
                vec.value(inner)
            }
            Vector::View(v) => v.base.value(v.index[slot as usize]),
            Vector::Dict(d) => d.base.value(d.index[slot as usize] as u32),
            _ => {
                let mut b = Builder::new();
                self.serialize(&mut b, slot);
                Value::new(self.ty(), b.take_value())
            }
        }
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|slot| self.value(slot)).collect()
    }

    pub fn is_null(&self, slot: u32) -> bool {
        match self {
            Vector::Null(_) => true,
            Vector::Const(c) => c.value.is_null(),
            Vector::Dynamic(d) => {
                let (vec, inner) = d.locate(slot);
                vec.is_null(inner)
            }
            Vector::View(v) => v.base.is_null(v.index[slot as usize]),
            Vector::Dict(d) => d.base.is_null(d.index[slot as usize] as u32),
            Vector::Bool(v) => v.get(slot).is_none(),
            Vector::Int(v) => v.get(slot).is_none(),
            Vector::Uint(v) | Vector::Enum(v) => v.get(slot).is_none(),
            Vector::Float(v) => v.get(slot).is_none(),
            Vector::Bytes(v) => v.get(slot).is_none(),
            Vector::Ip(v) => v.get(slot).is_none(),
            Vector::Net(v) => v.get(slot).is_none(),
            Vector::Record(v) => v.is_null(slot),
            Vector::Array(v) | Vector::Set(v) => v.is_null(slot),
            Vector::Map(v) => v.is_null(slot),
            Vector::Union(v) => v.is_null(slot),
            Vector::Named(v) => v.inner.is_null(slot),
            Vector::Error(v) => v.inner.is_null(slot),
        }
    }

    /// Whether every slot holds an error.
    pub fn is_error(&self) -> bool {
        match self {
            Vector::Dynamic(d) => d.values.iter().all(|v| v.is_error()),
            Vector::Null(_) => false,
            _ => self.ty().is_error(),
        }
    }

    /// The slots whose value is an error.
    pub fn error_slots(&self) -> Vec<u32> {
        match self {
            Vector::Dynamic(d) => {
                let map = d.tag_map();
                let mut out: Vec<u32> = d
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_error())
                    .flat_map(|(tag, _)| map.reverse[tag].iter().copied())
                    .collect();
                out.sort_unstable();
                out
            }
            _ if self.is_error() => (0..self.len()).collect(),
            _ => Vec::new(),
        }
    }

    /// Record type of a non-dynamic vector, looking through views.
    pub fn record_type(&self) -> Option<Type> {
        if self.is_dynamic() || matches!(self, Vector::Null(_)) {
            return None;
        }
        let ty = self.ty();
        matches!(ty.under().kind(), TypeKind::Record(_)).then_some(ty)
    }

    /// Sum of the body sizes of all values, for memory accounting.
    pub fn byte_size(&self) -> usize {
        match self {
            Vector::Const(c) => c.value.size() * c.len as usize,
            _ => (0..self.len()).map(|slot| self.value(slot).size()).sum(),
        }
    }
}

#[cfg(test)]
mod vector_test;
