//! Record, array, set, map, union, named and error vectors.

use once_cell::sync::OnceCell;

use crate::codec::Builder;
use crate::codec::prims::encode_uint;
use crate::types::Type;

use super::{Any, Bitmap, Dynamic, Vector};

fn is_null(nulls: &Option<Bitmap>, slot: u32) -> bool {
    nulls.as_ref().is_some_and(|n| n.get(slot))
}

/// A record field column.
#[derive(Debug, Clone)]
pub enum RecordField {
    /// One inner value per record slot.
    Plain(Vector),
    /// An optional field: `values` holds only the present elements.
    Optional(OptField),
}

/// Values of an optional field with run lengths describing presence.
///
/// `runs` alternates present and absent run lengths, starting with a
/// (possibly empty) present run. The slot-to-inner-index map is built on
/// first use.
#[derive(Debug, Clone)]
pub struct OptField {
    pub values: Vector,
    pub runs: Vec<u32>,
    forward: OnceCell<Vec<Option<u32>>>,
}

impl OptField {
    pub fn new(values: Vector, runs: Vec<u32>) -> Self {
        OptField {
            values,
            runs,
            forward: OnceCell::new(),
        }
    }

    fn forward(&self) -> &[Option<u32>] {
        self.forward.get_or_init(|| {
            let mut out = Vec::new();
            let mut inner = 0;
            for (i, run) in self.runs.iter().enumerate() {
                let present = i % 2 == 0;
                for _ in 0..*run {
                    if present {
                        out.push(Some(inner));
                        inner += 1;
                    } else {
                        out.push(None);
                    }
                }
            }
            out
        })
    }

    /// The inner index of `slot`, or `None` when the field is absent there.
    pub fn slot(&self, slot: u32) -> Option<u32> {
        self.forward().get(slot as usize).copied().flatten()
    }
}

impl RecordField {
    pub fn values(&self) -> &Vector {
        match self {
            RecordField::Plain(v) => v,
            RecordField::Optional(o) => &o.values,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    pub ty: Type,
    pub len: u32,
    pub fields: Vec<RecordField>,
    pub nulls: Option<Bitmap>,
}

impl Record {
    pub fn new(ty: Type, len: u32, fields: Vec<RecordField>, nulls: Option<Bitmap>) -> Self {
        debug_assert_eq!(ty.record_fields().map(|f| f.len()), Some(fields.len()));
        Record {
            ty,
            len,
            fields,
            nulls,
        }
    }

    pub fn is_null(&self, slot: u32) -> bool {
        is_null(&self.nulls, slot)
    }
}

impl Any for Record {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.len
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        if self.is_null(slot) {
            return b.append_null();
        }
        b.begin_container();
        let mut nones = Vec::new();
        let mut opt = 0;
        for field in &self.fields {
            match field {
                RecordField::Plain(v) => v.serialize(b, slot),
                RecordField::Optional(o) => {
                    match o.slot(slot) {
                        Some(inner) => o.values.serialize(b, inner),
                        None => nones.push(opt),
                    }
                    opt += 1;
                }
            }
        }
        b.end_container_with_nones(opt, &nones);
    }
}

/// Arrays and sets: `offsets` has one more entry than there are slots.
#[derive(Debug, Clone)]
pub struct List {
    pub ty: Type,
    pub offsets: Vec<u32>,
    pub values: Vector,
    pub nulls: Option<Bitmap>,
}

impl List {
    pub fn range(&self, slot: u32) -> core::ops::Range<u32> {
        self.offsets[slot as usize]..self.offsets[slot as usize + 1]
    }

    pub fn is_null(&self, slot: u32) -> bool {
        is_null(&self.nulls, slot)
    }
}

impl Any for List {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        if self.is_null(slot) {
            return b.append_null();
        }
        b.begin_container();
        for i in self.range(slot) {
            self.values.serialize(b, i);
        }
        b.end_container();
    }
}

#[derive(Debug, Clone)]
pub struct MapVec {
    pub ty: Type,
    pub offsets: Vec<u32>,
    pub keys: Vector,
    pub values: Vector,
    pub nulls: Option<Bitmap>,
}

impl MapVec {
    pub fn range(&self, slot: u32) -> core::ops::Range<u32> {
        self.offsets[slot as usize]..self.offsets[slot as usize + 1]
    }

    pub fn is_null(&self, slot: u32) -> bool {
        is_null(&self.nulls, slot)
    }
}

impl Any for MapVec {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        if self.is_null(slot) {
            return b.append_null();
        }
        b.begin_container();
        for i in self.range(slot) {
            self.keys.serialize(b, i);
            self.values.serialize(b, i);
        }
        b.end_container();
    }
}

/// A union vector: a dynamic whose tags are the union's member indexes.
/// `values` has one vector per member, each typed by that member. A null
/// union slot is carried as a null of the first member.
#[derive(Debug, Clone)]
pub struct UnionVec {
    pub ty: Type,
    pub dynamic: Dynamic,
    pub nulls: Option<Bitmap>,
}

impl UnionVec {
    pub fn is_null(&self, slot: u32) -> bool {
        is_null(&self.nulls, slot)
    }
}

impl Any for UnionVec {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.dynamic.len()
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        if self.is_null(slot) {
            return b.append_null();
        }
        let tag = self.dynamic.tags[slot as usize];
        let inner = self.dynamic.tag_map().forward[slot as usize];
        b.begin_container();
        b.append(Some(&encode_uint(tag as u64)));
        self.dynamic.values[tag as usize].serialize(b, inner);
        b.end_container();
    }
}

/// A named vector shares its inner vector's layout.
#[derive(Debug, Clone)]
pub struct Named {
    pub ty: Type,
    pub inner: Vector,
}

impl Any for Named {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.inner.len()
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        self.inner.serialize(b, slot)
    }
}

/// Error values; `inner` holds the payloads.
#[derive(Debug, Clone)]
pub struct ErrorVec {
    pub ty: Type,
    pub inner: Vector,
}

impl Any for ErrorVec {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.inner.len()
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        self.inner.serialize(b, slot)
    }
}
