use core::fmt::{self, Display};
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;
use static_assertions::const_assert_eq;

/// Primitive types. The discriminants are the type IDs and are part of the
/// binary encoding of type values, so they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Primitive {
    Uint8 = 0,
    Uint16 = 1,
    Uint32 = 2,
    Uint64 = 3,
    Int8 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    Duration = 8,
    Time = 9,
    Float16 = 10,
    Float32 = 11,
    Float64 = 12,
    Bool = 13,
    Bytes = 14,
    String = 15,
    Ip = 16,
    Net = 17,
    Type = 18,
    Null = 19,
}

/// First ID handed out to a composite type by a [`super::TypeContext`].
pub const ID_FIRST_COMPOSITE: u32 = 32;

const_assert_eq!(Primitive::Null as u32, 19);
const_assert_eq!(Primitive::ALL.len(), 20);

impl Primitive {
    pub const ALL: [Primitive; 20] = [
        Primitive::Uint8,
        Primitive::Uint16,
        Primitive::Uint32,
        Primitive::Uint64,
        Primitive::Int8,
        Primitive::Int16,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Duration,
        Primitive::Time,
        Primitive::Float16,
        Primitive::Float32,
        Primitive::Float64,
        Primitive::Bool,
        Primitive::Bytes,
        Primitive::String,
        Primitive::Ip,
        Primitive::Net,
        Primitive::Type,
        Primitive::Null,
    ];

    pub const fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Primitive> {
        Primitive::ALL.get(id as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Uint8 => "uint8",
            Primitive::Uint16 => "uint16",
            Primitive::Uint32 => "uint32",
            Primitive::Uint64 => "uint64",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Duration => "duration",
            Primitive::Time => "time",
            Primitive::Float16 => "float16",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Bool => "bool",
            Primitive::Bytes => "bytes",
            Primitive::String => "string",
            Primitive::Ip => "ip",
            Primitive::Net => "net",
            Primitive::Type => "type",
            Primitive::Null => "null",
        }
    }

    pub fn from_name(name: &str) -> Option<Primitive> {
        Primitive::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Signed integers, including time and duration which share the int64 layout.
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Int8
                | Primitive::Int16
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::Duration
                | Primitive::Time
        )
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Primitive::Uint8 | Primitive::Uint16 | Primitive::Uint32 | Primitive::Uint64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Primitive::Float16 | Primitive::Float32 | Primitive::Float64
        )
    }

    pub const fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits for numeric types, zero otherwise.
    pub const fn bits(self) -> u32 {
        match self {
            Primitive::Uint8 | Primitive::Int8 => 8,
            Primitive::Uint16 | Primitive::Int16 | Primitive::Float16 => 16,
            Primitive::Uint32 | Primitive::Int32 | Primitive::Float32 => 32,
            Primitive::Uint64
            | Primitive::Int64
            | Primitive::Duration
            | Primitive::Time
            | Primitive::Float64 => 64,
            _ => 0,
        }
    }
}

/// Semantic category of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Primitive,
    Record,
    Array,
    Set,
    Map,
    Union,
    Enum,
    Named,
    Error,
    TypeValue,
}

bitflags::bitflags! {
    /// Per-field flags carried by record types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u8 {
        /// The field may be absent ("none") in a value of this type.
        const OPT = 0b0000_0001;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub flags: FieldFlags,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Field {
            name: name.into(),
            ty,
            flags: FieldFlags::empty(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: Type) -> Self {
        Field {
            name: name.into(),
            ty,
            flags: FieldFlags::OPT,
        }
    }

    pub fn is_opt(&self) -> bool {
        self.flags.contains(FieldFlags::OPT)
    }

    pub fn with_opt(mut self, opt: bool) -> Self {
        self.flags.set(FieldFlags::OPT, opt);
        self
    }
}

/// Structural description of a type. Children are interned [`Type`]s, so
/// the derived `Hash`/`Eq` compare children by identity, which is exactly
/// structural equality inside one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(Primitive),
    Record(Vec<Field>),
    Array(Type),
    Set(Type),
    Map(Type, Type),
    Union(Vec<Type>),
    Enum(Vec<String>),
    Named(String, Type),
    Error(Type),
}

pub(crate) struct TypeData {
    pub(crate) id: u32,
    pub(crate) kind: TypeKind,
}

/// An interned type. Cloning is cheap and identity is the allocation, so
/// comparing two types from the same context is a pointer comparison.
#[derive(Clone)]
pub struct Type(pub(crate) Arc<TypeData>);

static PRIMITIVES: Lazy<Vec<Type>> = Lazy::new(|| {
    Primitive::ALL
        .iter()
        .map(|p| {
            Type(Arc::new(TypeData {
                id: p.id(),
                kind: TypeKind::Primitive(*p),
            }))
        })
        .collect()
});

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({}: {})", self.id(), self)
    }
}

impl Type {
    /// The process-wide singleton for a primitive type.
    pub fn primitive(p: Primitive) -> Type {
        PRIMITIVES[p as usize].clone()
    }

    pub fn null() -> Type {
        Type::primitive(Primitive::Null)
    }

    pub fn int64() -> Type {
        Type::primitive(Primitive::Int64)
    }

    pub fn uint64() -> Type {
        Type::primitive(Primitive::Uint64)
    }

    pub fn float64() -> Type {
        Type::primitive(Primitive::Float64)
    }

    pub fn bool() -> Type {
        Type::primitive(Primitive::Bool)
    }

    pub fn string() -> Type {
        Type::primitive(Primitive::String)
    }

    pub fn bytes() -> Type {
        Type::primitive(Primitive::Bytes)
    }

    pub fn type_type() -> Type {
        Type::primitive(Primitive::Type)
    }

    pub(crate) fn from_data(id: u32, kind: TypeKind) -> Type {
        Type(Arc::new(TypeData { id, kind }))
    }

    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn kind_tag(&self) -> Kind {
        match &self.0.kind {
            TypeKind::Primitive(Primitive::Type) => Kind::TypeValue,
            TypeKind::Primitive(_) => Kind::Primitive,
            TypeKind::Record(_) => Kind::Record,
            TypeKind::Array(_) => Kind::Array,
            TypeKind::Set(_) => Kind::Set,
            TypeKind::Map(_, _) => Kind::Map,
            TypeKind::Union(_) => Kind::Union,
            TypeKind::Enum(_) => Kind::Enum,
            TypeKind::Named(_, _) => Kind::Named,
            TypeKind::Error(_) => Kind::Error,
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.0.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn is(&self, p: Primitive) -> bool {
        self.as_primitive() == Some(p)
    }

    /// Strips any `Named` wrappers. Idempotent.
    pub fn under(&self) -> &Type {
        let mut ty = self;
        while let TypeKind::Named(_, inner) = &ty.0.kind {
            ty = inner;
        }
        ty
    }

    pub fn is_null(&self) -> bool {
        self.under().is(Primitive::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.under().kind(), TypeKind::Error(_))
    }

    pub fn is_union(&self) -> bool {
        matches!(self.under().kind(), TypeKind::Union(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.under().kind(), TypeKind::Record(_))
    }

    /// Whether values of this type are framed as containers. Errors share
    /// the framing of their payload.
    pub fn is_container(&self) -> bool {
        let mut ty = self.under();
        while let TypeKind::Error(inner) = ty.kind() {
            ty = inner.under();
        }
        matches!(
            ty.kind(),
            TypeKind::Record(_)
                | TypeKind::Array(_)
                | TypeKind::Set(_)
                | TypeKind::Map(_, _)
                | TypeKind::Union(_)
        )
    }

    pub fn record_fields(&self) -> Option<&[Field]> {
        match self.under().kind() {
            TypeKind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.record_fields()?.iter().position(|f| f.name == name)
    }

    /// Number of optional fields of a record type.
    pub fn opt_count(&self) -> usize {
        self.record_fields()
            .map(|fields| fields.iter().filter(|f| f.is_opt()).count())
            .unwrap_or(0)
    }

    /// Element type of arrays and sets.
    pub fn elem(&self) -> Option<&Type> {
        match self.under().kind() {
            TypeKind::Array(inner) | TypeKind::Set(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn map_types(&self) -> Option<(&Type, &Type)> {
        match self.under().kind() {
            TypeKind::Map(key, val) => Some((key, val)),
            _ => None,
        }
    }

    pub fn enum_symbols(&self) -> Option<&[String]> {
        match self.under().kind() {
            TypeKind::Enum(symbols) => Some(symbols),
            _ => None,
        }
    }

    pub fn union_members(&self) -> Option<&[Type]> {
        match self.under().kind() {
            TypeKind::Union(members) => Some(members),
            _ => None,
        }
    }

    /// Payload type of an error type.
    pub fn error_inner(&self) -> Option<&Type> {
        match self.under().kind() {
            TypeKind::Error(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            TypeKind::Named(name, _) => Some(name),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Primitive(p) => write!(f, "{}", p.name()),
            TypeKind::Record(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", field.name, field.ty)?;
                    if field.is_opt() {
                        write!(f, "?")?;
                    }
                }
                write!(f, "}}")
            }
            TypeKind::Array(inner) => write!(f, "[{}]", inner),
            TypeKind::Set(inner) => write!(f, "|[{}]|", inner),
            TypeKind::Map(key, val) => write!(f, "|{{{}:{}}}|", key, val),
            TypeKind::Union(members) => {
                write!(f, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ")")
            }
            TypeKind::Enum(symbols) => write!(f, "enum({})", symbols.join(",")),
            TypeKind::Named(name, inner) => write!(f, "{}={}", name, inner),
            TypeKind::Error(inner) => write!(f, "error({})", inner),
        }
    }
}
