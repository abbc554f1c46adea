//! Builders that assemble vectors from encoded value bodies.

use std::net::IpAddr;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::codec::prims::{decode_bool, decode_float, decode_int, decode_ip, decode_net, decode_uint};
use crate::codec::{Iter, RecordIter};
use crate::types::{Primitive, Type, TypeKind};
use crate::value::Value;

use super::{
    Bitmap, Bools, Dynamic, ErrorVec, Floats, Ints, Ips, List, MapVec, Named, Nets, OptField,
    Record, RecordField, Strs, Uints, UnionVec, Vector, new_dynamic, nonempty,
};

/// Accumulates value bodies of a single type into a vector.
pub trait VectorBuilder: Send {
    /// Appends one value body; `None` is null.
    fn write(&mut self, body: Option<&[u8]>);
    fn build(self: Box<Self>) -> Vector;
}

/// Returns a builder for vectors of type `ty`.
pub fn new_builder(ty: &Type) -> Box<dyn VectorBuilder> {
    match ty.kind() {
        TypeKind::Primitive(p) => match p {
            p if p.is_signed() => Box::new(IntBuilder::new(ty.clone())),
            p if p.is_unsigned() => Box::new(UintBuilder::new(ty.clone(), false)),
            p if p.is_float() => Box::new(FloatBuilder::new(ty.clone())),
            Primitive::Bool => Box::new(BoolBuilder::default()),
            Primitive::String | Primitive::Bytes | Primitive::Type => {
                Box::new(StrBuilder::new(ty.clone()))
            }
            Primitive::Ip => Box::new(IpBuilder::default()),
            Primitive::Net => Box::new(NetBuilder::default()),
            _ => Box::new(NullBuilder::default()),
        },
        TypeKind::Record(fields) => Box::new(RecordBuilder {
            ty: ty.clone(),
            len: 0,
            fields: fields
                .iter()
                .map(|f| {
                    if f.is_opt() {
                        FieldBuilder::Optional(new_builder(&f.ty), Vec::new())
                    } else {
                        FieldBuilder::Plain(new_builder(&f.ty))
                    }
                })
                .collect(),
            nulls: Bitmap::default(),
        }),
        TypeKind::Array(inner) | TypeKind::Set(inner) => Box::new(ListBuilder {
            ty: ty.clone(),
            offsets: vec![0],
            values: new_builder(inner),
            nulls: Bitmap::default(),
        }),
        TypeKind::Map(key, val) => Box::new(MapBuilder {
            ty: ty.clone(),
            offsets: vec![0],
            keys: new_builder(key),
            values: new_builder(val),
            nulls: Bitmap::default(),
        }),
        TypeKind::Union(members) => Box::new(UnionBuilder {
            ty: ty.clone(),
            tags: Vec::new(),
            members: members.iter().map(new_builder).collect(),
            nulls: Bitmap::default(),
        }),
        TypeKind::Enum(_) => Box::new(UintBuilder::new(ty.clone(), true)),
        TypeKind::Named(_, inner) => Box::new(NamedBuilder {
            ty: ty.clone(),
            inner: new_builder(inner),
        }),
        TypeKind::Error(inner) => Box::new(ErrorBuilder {
            ty: ty.clone(),
            inner: new_builder(inner),
        }),
    }
}

/// Builds a vector from values. Values of a single type produce a vector
/// of that type; mixed types produce a dynamic whose tags follow the
/// order in which each type first appears.
pub fn from_values(values: &[Value]) -> Vector {
    if values.is_empty() {
        return Vector::Null(0);
    }
    let first = values[0].ty();
    if values.iter().all(|v| v.ty() == first) {
        let mut b = new_builder(first);
        for v in values {
            b.write(v.bytes());
        }
        return b.build();
    }
    let mut index: HashMap<Type, u32> = HashMap::new();
    let mut builders: Vec<Box<dyn VectorBuilder>> = Vec::new();
    let mut tags = Vec::with_capacity(values.len());
    for v in values {
        let tag = *index.entry(v.ty().clone()).or_insert_with(|| {
            builders.push(new_builder(v.ty()));
            (builders.len() - 1) as u32
        });
        builders[tag as usize].write(v.bytes());
        tags.push(tag);
    }
    new_dynamic(tags, builders.into_iter().map(|b| b.build()).collect())
}

#[derive(Default)]
struct NullBuilder {
    len: u32,
}

impl VectorBuilder for NullBuilder {
    fn write(&mut self, _body: Option<&[u8]>) {
        self.len += 1;
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Null(self.len)
    }
}

struct IntBuilder {
    ty: Type,
    values: Vec<i64>,
    nulls: Bitmap,
}

impl IntBuilder {
    fn new(ty: Type) -> Self {
        IntBuilder {
            ty,
            values: Vec::new(),
            nulls: Bitmap::default(),
        }
    }
}

impl VectorBuilder for IntBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.values.push(body.map_or(0, decode_int));
        self.nulls.push(body.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Int(Arc::new(Ints::new(self.ty, self.values, nonempty(self.nulls))))
    }
}

struct UintBuilder {
    ty: Type,
    values: Vec<u64>,
    nulls: Bitmap,
    is_enum: bool,
}

impl UintBuilder {
    fn new(ty: Type, is_enum: bool) -> Self {
        UintBuilder {
            ty,
            values: Vec::new(),
            nulls: Bitmap::default(),
            is_enum,
        }
    }
}

impl VectorBuilder for UintBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.values.push(body.map_or(0, decode_uint));
        self.nulls.push(body.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        let v = Arc::new(Uints::new(self.ty, self.values, nonempty(self.nulls)));
        if self.is_enum {
            Vector::Enum(v)
        } else {
            Vector::Uint(v)
        }
    }
}

struct FloatBuilder {
    ty: Type,
    values: Vec<f64>,
    nulls: Bitmap,
}

impl FloatBuilder {
    fn new(ty: Type) -> Self {
        FloatBuilder {
            ty,
            values: Vec::new(),
            nulls: Bitmap::default(),
        }
    }
}

impl VectorBuilder for FloatBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        let v = body.and_then(|b| decode_float(b).ok());
        self.values.push(v.unwrap_or(0.0));
        self.nulls.push(v.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Float(Arc::new(Floats::new(self.ty, self.values, nonempty(self.nulls))))
    }
}

#[derive(Default)]
struct BoolBuilder {
    values: Bitmap,
    nulls: Bitmap,
}

impl VectorBuilder for BoolBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.values.push(body.is_some_and(decode_bool));
        self.nulls.push(body.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Bool(Arc::new(Bools::new(self.values, nonempty(self.nulls))))
    }
}

struct StrBuilder {
    strs: Strs,
    nulls: Bitmap,
}

impl StrBuilder {
    fn new(ty: Type) -> Self {
        StrBuilder {
            strs: Strs::new(ty),
            nulls: Bitmap::default(),
        }
    }
}

impl VectorBuilder for StrBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.strs.push(body.unwrap_or(&[]));
        self.nulls.push(body.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        let mut strs = self.strs;
        strs.nulls = nonempty(self.nulls);
        Vector::Bytes(Arc::new(strs))
    }
}

#[derive(Default)]
struct IpBuilder {
    values: Vec<IpAddr>,
    nulls: Bitmap,
}

impl VectorBuilder for IpBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        let ip = body.and_then(|b| decode_ip(b).ok());
        self.values
            .push(ip.unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)));
        self.nulls.push(ip.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Ip(Arc::new(Ips {
            values: self.values,
            nulls: nonempty(self.nulls),
        }))
    }
}

#[derive(Default)]
struct NetBuilder {
    values: Vec<crate::codec::prims::Net>,
    nulls: Bitmap,
}

impl VectorBuilder for NetBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        let net = body.and_then(|b| decode_net(b).ok());
        self.values.push(net.unwrap_or(crate::codec::prims::Net::new(
            IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            0,
        )));
        self.nulls.push(net.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Net(Arc::new(Nets {
            values: self.values,
            nulls: nonempty(self.nulls),
        }))
    }
}

enum FieldBuilder {
    Plain(Box<dyn VectorBuilder>),
    /// Builder for the present values plus presence runs.
    Optional(Box<dyn VectorBuilder>, Vec<u32>),
}

fn push_run(runs: &mut Vec<u32>, present: bool) {
    if runs.is_empty() && !present {
        runs.push(0);
    }
    // Odd length means the last run counts present slots.
    let last_present = runs.len() % 2 == 1;
    match runs.last_mut() {
        Some(run) if last_present == present => *run += 1,
        _ => runs.push(1),
    }
}

struct RecordBuilder {
    ty: Type,
    len: u32,
    fields: Vec<FieldBuilder>,
    nulls: Bitmap,
}

impl VectorBuilder for RecordBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.len += 1;
        self.nulls.push(body.is_none());
        let Some(body) = body else {
            for field in &mut self.fields {
                match field {
                    FieldBuilder::Plain(b) => b.write(None),
                    FieldBuilder::Optional(_, runs) => push_run(runs, false),
                }
            }
            return;
        };
        let fields = self.ty.record_fields().unwrap_or(&[]);
        for (field, (bytes, none)) in self.fields.iter_mut().zip(RecordIter::new(body, fields)) {
            match field {
                FieldBuilder::Plain(b) => b.write(bytes),
                FieldBuilder::Optional(b, runs) => {
                    push_run(runs, !none);
                    if !none {
                        b.write(bytes);
                    }
                }
            }
        }
    }

    fn build(self: Box<Self>) -> Vector {
        let fields = self
            .fields
            .into_iter()
            .map(|f| match f {
                FieldBuilder::Plain(b) => RecordField::Plain(b.build()),
                FieldBuilder::Optional(b, runs) => {
                    RecordField::Optional(OptField::new(b.build(), runs))
                }
            })
            .collect();
        Vector::Record(Arc::new(Record::new(
            self.ty,
            self.len,
            fields,
            nonempty(self.nulls),
        )))
    }
}

struct ListBuilder {
    ty: Type,
    offsets: Vec<u32>,
    values: Box<dyn VectorBuilder>,
    nulls: Bitmap,
}

impl VectorBuilder for ListBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        let mut end = *self.offsets.last().unwrap_or(&0);
        if let Some(body) = body {
            for elem in Iter::new(body) {
                self.values.write(elem);
                end += 1;
            }
        }
        self.offsets.push(end);
        self.nulls.push(body.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        let is_set = matches!(self.ty.kind(), TypeKind::Set(_));
        let list = Arc::new(List {
            ty: self.ty,
            offsets: self.offsets,
            values: self.values.build(),
            nulls: nonempty(self.nulls),
        });
        if is_set {
            Vector::Set(list)
        } else {
            Vector::Array(list)
        }
    }
}

struct MapBuilder {
    ty: Type,
    offsets: Vec<u32>,
    keys: Box<dyn VectorBuilder>,
    values: Box<dyn VectorBuilder>,
    nulls: Bitmap,
}

impl VectorBuilder for MapBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        let mut end = *self.offsets.last().unwrap_or(&0);
        if let Some(body) = body {
            let mut it = Iter::new(body);
            while let (Some(key), Some(val)) = (it.next(), it.next()) {
                self.keys.write(key);
                self.values.write(val);
                end += 1;
            }
        }
        self.offsets.push(end);
        self.nulls.push(body.is_none());
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Map(Arc::new(MapVec {
            ty: self.ty,
            offsets: self.offsets,
            keys: self.keys.build(),
            values: self.values.build(),
            nulls: nonempty(self.nulls),
        }))
    }
}

struct UnionBuilder {
    ty: Type,
    tags: Vec<u32>,
    members: Vec<Box<dyn VectorBuilder>>,
    nulls: Bitmap,
}

impl VectorBuilder for UnionBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.nulls.push(body.is_none());
        let decoded = body.and_then(|body| {
            let mut it = Iter::new(body);
            let tag = decode_uint(it.next()??) as u32;
            let member = it.next()?;
            ((tag as usize) < self.members.len()).then_some((tag, member))
        });
        match decoded {
            Some((tag, member)) => {
                self.tags.push(tag);
                self.members[tag as usize].write(member);
            }
            None => {
                self.tags.push(0);
                self.members[0].write(None);
            }
        }
    }

    fn build(self: Box<Self>) -> Vector {
        let values = self.members.into_iter().map(|b| b.build()).collect();
        Vector::Union(Arc::new(UnionVec {
            ty: self.ty,
            dynamic: Dynamic::new(self.tags, values),
            nulls: nonempty(self.nulls),
        }))
    }
}

struct NamedBuilder {
    ty: Type,
    inner: Box<dyn VectorBuilder>,
}

impl VectorBuilder for NamedBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.inner.write(body)
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Named(Arc::new(Named {
            ty: self.ty,
            inner: self.inner.build(),
        }))
    }
}

struct ErrorBuilder {
    ty: Type,
    inner: Box<dyn VectorBuilder>,
}

impl VectorBuilder for ErrorBuilder {
    fn write(&mut self, body: Option<&[u8]>) {
        self.inner.write(body)
    }

    fn build(self: Box<Self>) -> Vector {
        Vector::Error(Arc::new(ErrorVec {
            ty: self.ty,
            inner: self.inner.build(),
        }))
    }
}
