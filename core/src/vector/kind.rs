use crate::types::{Primitive, TypeKind};

use super::{Any, Vector};

/// Physical encoding of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Form {
    Flat = 0,
    Dict = 1,
    View = 2,
    Const = 3,
    Dynamic = 4,
}

impl Form {
    pub fn of(v: &Vector) -> Form {
        match v {
            Vector::Dict(_) => Form::Dict,
            Vector::View(_) => Form::View,
            Vector::Const(_) => Form::Const,
            Vector::Dynamic(_) => Form::Dynamic,
            _ => Form::Flat,
        }
    }
}

/// Value category of a vector, as seen by expression kernels. Named types
/// report the kind of their underlying type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Invalid = 0,
    Null,
    Int,
    Uint,
    Float,
    Bool,
    Bytes,
    String,
    Ip,
    Net,
    Type,
    Record,
    Array,
    Set,
    Map,
    Union,
    Enum,
    Error,
}

impl Kind {
    pub fn of(v: &Vector) -> Kind {
        if v.is_dynamic() {
            return Kind::Invalid;
        }
        match v.ty().under().kind() {
            TypeKind::Primitive(p) => match p {
                p if p.is_signed() => Kind::Int,
                p if p.is_unsigned() => Kind::Uint,
                p if p.is_float() => Kind::Float,
                Primitive::Bool => Kind::Bool,
                Primitive::Bytes => Kind::Bytes,
                Primitive::String => Kind::String,
                Primitive::Ip => Kind::Ip,
                Primitive::Net => Kind::Net,
                Primitive::Type => Kind::Type,
                _ => Kind::Null,
            },
            TypeKind::Record(_) => Kind::Record,
            TypeKind::Array(_) => Kind::Array,
            TypeKind::Set(_) => Kind::Set,
            TypeKind::Map(_, _) => Kind::Map,
            TypeKind::Union(_) => Kind::Union,
            TypeKind::Enum(_) => Kind::Enum,
            TypeKind::Error(_) => Kind::Error,
            TypeKind::Named(_, _) => Kind::Invalid,
        }
    }

    pub fn is_number(self) -> bool {
        matches!(self, Kind::Int | Kind::Uint | Kind::Float)
    }
}
