//! Const, Dict, View and Dynamic forms.

use once_cell::sync::OnceCell;

use crate::codec::Builder;
use crate::types::Type;
use crate::value::Value;

use super::{Any, Vector};

/// A single value repeated `len` times.
#[derive(Debug, Clone)]
pub struct Const {
    pub value: Value,
    pub len: u32,
}

impl Any for Const {
    fn ty(&self) -> Type {
        self.value.ty().clone()
    }

    fn len(&self) -> u32 {
        self.len
    }

    fn serialize(&self, b: &mut Builder, _slot: u32) {
        self.value.append_to(b)
    }
}

/// Dictionary-encoded vector: slot `i` is `base[index[i]]`. `counts[u]`
/// is the number of slots referencing base entry `u`.
#[derive(Debug, Clone)]
pub struct Dict {
    pub base: Vector,
    pub index: Vec<u8>,
    pub counts: Vec<u32>,
}

impl Dict {
    pub fn new(base: Vector, index: Vec<u8>) -> Self {
        let mut counts = vec![0u32; base.len() as usize];
        for &i in &index {
            counts[i as usize] += 1;
        }
        Dict {
            base,
            index,
            counts,
        }
    }
}

impl Any for Dict {
    fn ty(&self) -> Type {
        self.base.ty()
    }

    fn len(&self) -> u32 {
        self.index.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        self.base.serialize(b, self.index[slot as usize] as u32)
    }
}

/// Indirection: slot `i` is `base[index[i]]`.
#[derive(Debug, Clone)]
pub struct View {
    pub base: Vector,
    pub index: Vec<u32>,
}

impl Any for View {
    fn ty(&self) -> Type {
        self.base.ty()
    }

    fn len(&self) -> u32 {
        self.index.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        self.base.serialize(b, self.index[slot as usize])
    }
}

/// Forward and reverse maps between a dynamic's slots and the positions
/// inside its value vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMap {
    /// Slot to position within `values[tags[slot]]`.
    pub forward: Vec<u32>,
    /// Tag to the slots carrying it, ascending.
    pub reverse: Vec<Vec<u32>>,
}

impl TagMap {
    pub fn new(tags: &[u32], ntags: usize) -> Self {
        let mut forward = Vec::with_capacity(tags.len());
        let mut reverse = vec![Vec::new(); ntags];
        for (slot, &tag) in tags.iter().enumerate() {
            let slots = &mut reverse[tag as usize];
            forward.push(slots.len() as u32);
            slots.push(slot as u32);
        }
        TagMap { forward, reverse }
    }
}

/// A heterogeneous vector. `tags[i]` selects the vector in `values` that
/// holds slot `i`; each value vector is densely packed with its own slots
/// in order.
#[derive(Debug, Clone)]
pub struct Dynamic {
    pub tags: Vec<u32>,
    pub values: Vec<Vector>,
    tag_map: OnceCell<TagMap>,
}

impl Dynamic {
    pub fn new(tags: Vec<u32>, values: Vec<Vector>) -> Self {
        debug_assert!(tags.iter().all(|t| (*t as usize) < values.len()));
        Dynamic {
            tags,
            values,
            tag_map: OnceCell::new(),
        }
    }

    pub fn len(&self) -> u32 {
        self.tags.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tag_map(&self) -> &TagMap {
        self.tag_map
            .get_or_init(|| TagMap::new(&self.tags, self.values.len()))
    }

    /// The value vector and position holding `slot`.
    pub fn locate(&self, slot: u32) -> (&Vector, u32) {
        let tag = self.tags[slot as usize];
        (
            &self.values[tag as usize],
            self.tag_map().forward[slot as usize],
        )
    }
}

impl Any for Dynamic {
    /// # Panics
    /// A dynamic has no single type; use [`Vector::type_of`] per slot.
    fn ty(&self) -> Type {
        panic!("ty() called on a dynamic vector")
    }

    fn len(&self) -> u32 {
        self.tags.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        let (vec, inner) = self.locate(slot);
        vec.serialize(b, inner)
    }
}

/// Builds a dynamic from `tags` and `values`, flattening nested dynamics
/// and dropping empty value vectors. A single remaining value vector is
/// returned as is.
pub fn new_dynamic(tags: Vec<u32>, values: Vec<Vector>) -> Vector {
    let n = tags.len();
    let needs_flatten = values
        .iter()
        .any(|v| v.len() == 0 || matches!(v, Vector::Dynamic(_)));
    if !needs_flatten {
        if values.len() <= 1 {
            return values.into_iter().next().unwrap_or(Vector::Null(0));
        }
        return Vector::Dynamic(std::sync::Arc::new(Dynamic::new(tags, values)));
    }
    // Map every (outer tag, position) to a flat tag.
    let mut flat: Vec<Vector> = Vec::new();
    let mut base = Vec::with_capacity(values.len());
    for v in &values {
        base.push(flat.len() as u32);
        match v {
            Vector::Dynamic(d) => flat.extend(d.values.iter().cloned()),
            v if v.len() > 0 => flat.push(v.clone()),
            _ => {}
        }
    }
    let mut positions = vec![0u32; values.len()];
    let mut out = Vec::with_capacity(n);
    for tag in tags {
        let t = tag as usize;
        let pos = positions[t];
        positions[t] += 1;
        match &values[t] {
            Vector::Dynamic(d) => out.push(base[t] + d.tags[pos as usize]),
            _ => out.push(base[t]),
        }
    }
    // Nested dynamics have no empty values, but drop any that remain.
    let mut used = vec![false; flat.len()];
    for &t in &out {
        used[t as usize] = true;
    }
    if used.iter().any(|u| !*u) {
        let mut remap = vec![0u32; flat.len()];
        let mut kept = Vec::new();
        for (i, v) in flat.into_iter().enumerate() {
            if used[i] {
                remap[i] = kept.len() as u32;
                kept.push(v);
            }
        }
        for t in &mut out {
            *t = remap[*t as usize];
        }
        flat = kept;
    }
    match flat.len() {
        0 => Vector::Null(0),
        1 => flat.pop().unwrap_or(Vector::Null(0)),
        _ => Vector::Dynamic(std::sync::Arc::new(Dynamic::new(out, flat))),
    }
}
