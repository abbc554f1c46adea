//! Structural operations on vectors: `under`, `pick`, `reverse_pick`,
//! `combine` and the `apply` dispatcher.

use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::codec::Builder;

use super::{Any, Dict, Vector, new_builder, new_dynamic};

/// Strips named wrappers, looking through views and dicts.
pub fn under(v: &Vector) -> Vector {
    match v {
        Vector::Named(n) => under(&n.inner),
        Vector::View(view) if is_named(&view.base) => {
            Vector::new_view(under(&view.base), view.index.clone())
        }
        Vector::Dict(d) if is_named(&d.base) => {
            Vector::Dict(Arc::new(Dict::new(under(&d.base), d.index.clone())))
        }
        Vector::Const(c) if c.value.ty().name().is_some() => {
            Vector::new_const(c.value.retype(c.value.ty().under().clone()), c.len)
        }
        _ => v.clone(),
    }
}

fn is_named(v: &Vector) -> bool {
    matches!(v, Vector::Named(_))
}

/// Returns the slots of `v` listed in `index`, in that order.
pub fn pick(v: &Vector, index: &[u32]) -> Vector {
    if index.len() as u32 == v.len() && index.iter().enumerate().all(|(i, s)| i as u32 == *s) {
        return v.clone();
    }
    match v {
        Vector::Null(_) => Vector::Null(index.len() as u32),
        Vector::Const(c) => Vector::new_const(c.value.clone(), index.len() as u32),
        Vector::View(view) => Vector::new_view(
            view.base.clone(),
            index.iter().map(|&i| view.index[i as usize]).collect(),
        ),
        Vector::Dict(d) => Vector::Dict(Arc::new(Dict::new(
            d.base.clone(),
            index.iter().map(|&i| d.index[i as usize]).collect(),
        ))),
        Vector::Dynamic(d) => {
            let map = d.tag_map();
            let mut tags = Vec::with_capacity(index.len());
            let mut inner: Vec<Vec<u32>> = vec![Vec::new(); d.values.len()];
            for &slot in index {
                let tag = d.tags[slot as usize];
                tags.push(tag);
                inner[tag as usize].push(map.forward[slot as usize]);
            }
            let values = d
                .values
                .iter()
                .zip(inner)
                .map(|(v, idx)| pick(v, &idx))
                .collect();
            new_dynamic(tags, values)
        }
        _ => Vector::new_view(v.clone(), index.to_vec()),
    }
}

/// Returns the slots of `v` *not* listed in `index`, which must be ascending.
pub fn reverse_pick(v: &Vector, index: &[u32]) -> Vector {
    let mut keep = Vec::with_capacity((v.len() as usize).saturating_sub(index.len()));
    let mut it = index.iter().peekable();
    for slot in 0..v.len() {
        if it.peek() == Some(&&slot) {
            it.next();
        } else {
            keep.push(slot);
        }
    }
    pick(v, &keep)
}

/// Interleaves `inserted` into `base`: the result has `base.len() +
/// inserted.len()` slots, the slots listed in `index` (strictly
/// increasing) come from `inserted` and the rest from `base`, both in order.
///
/// # Panics
/// If `index` and `inserted` differ in length or `index` is out of range.
pub fn combine(base: &Vector, index: &[u32], inserted: &Vector) -> Vector {
    assert_eq!(
        index.len() as u32,
        inserted.len(),
        "combine: index and inserted lengths differ"
    );
    let n = base.len() + inserted.len();
    let mut tags = vec![0u32; n as usize];
    for (i, &slot) in index.iter().enumerate() {
        assert!(slot < n, "combine: slot {} out of range {}", slot, n);
        debug_assert!(i == 0 || index[i - 1] < slot, "combine: index not increasing");
        tags[slot as usize] = 1;
    }
    if !base.is_dynamic()
        && !inserted.is_dynamic()
        && !matches!(base, Vector::Null(_))
        && base.ty() == inserted.ty()
    {
        // Same type on both sides: build a single flat vector.
        let ty = base.ty();
        let mut out = new_builder(&ty);
        let mut enc = Builder::new();
        let (mut bi, mut ii) = (0, 0);
        for tag in &tags {
            if *tag == 0 {
                base.serialize(&mut enc, bi);
                bi += 1;
            } else {
                inserted.serialize(&mut enc, ii);
                ii += 1;
            }
            out.write(enc.take_value().as_deref());
        }
        return out.build();
    }
    new_dynamic(tags, vec![base.clone(), inserted.clone()])
}

/// Materializes a const, view or dict vector into a flat one of the same type.
pub fn flatten(v: &Vector) -> Vector {
    match v {
        Vector::View(_) | Vector::Dict(_) | Vector::Const(_) => {
            let ty = v.ty();
            let mut out = new_builder(&ty);
            let mut enc = Builder::new();
            for slot in 0..v.len() {
                v.serialize(&mut enc, slot);
                out.write(enc.take_value().as_deref());
            }
            out.build()
        }
        _ => v.clone(),
    }
}

/// Exposes a union vector as the dynamic of its members.
fn rip_union(v: &Vector) -> Vector {
    match v {
        Vector::Union(u) => new_dynamic(u.dynamic.tags.clone(), u.dynamic.values.clone()),
        Vector::View(view) if matches!(view.base, Vector::Union(_)) => {
            pick(&rip_union(&view.base), &view.index)
        }
        Vector::Dict(d) if matches!(d.base, Vector::Union(_)) => {
            let index: Vec<u32> = d.index.iter().map(|&i| i as u32).collect();
            pick(&rip_union(&d.base), &index)
        }
        Vector::Const(c) if c.value.ty().is_union() && !c.value.is_null() => {
            Vector::new_const(c.value.under(), c.len)
        }
        _ => v.clone(),
    }
}

/// Calls `f` on type-homogeneous slices of `vecs` and stitches the results
/// back together in slot order.
///
/// When no input is dynamic, `f` is called once on the inputs as they are.
/// Otherwise the slots are grouped by the combination of tags across the
/// dynamic inputs, every input is picked down to each group, `apply`
/// recurses on the group, and the results are combined into a dynamic.
/// With `rip_unions`, union vectors are treated as dynamics of their members.
///
/// # Panics
/// If `f` returns a vector whose length differs from its inputs.
pub fn apply(
    rip_unions: bool,
    f: &mut dyn FnMut(&[Vector]) -> Vector,
    vecs: &[Vector],
) -> Vector {
    let vecs: SmallVec<[Vector; 4]> = if rip_unions {
        vecs.iter().map(rip_union).collect()
    } else {
        vecs.iter().cloned().collect()
    };
    let n = vecs.first().map_or(0, |v| v.len());
    let dynamics: SmallVec<[usize; 4]> = vecs
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_dynamic())
        .map(|(i, _)| i)
        .collect();
    if dynamics.is_empty() {
        let out = f(&vecs);
        assert_eq!(out.len(), n, "apply: function changed vector length");
        return out;
    }
    let mut groups: HashMap<SmallVec<[u32; 4]>, u32> = HashMap::new();
    let mut group_slots: Vec<Vec<u32>> = Vec::new();
    let mut tags = Vec::with_capacity(n as usize);
    for slot in 0..n {
        let key: SmallVec<[u32; 4]> = dynamics
            .iter()
            .map(|&i| match &vecs[i] {
                Vector::Dynamic(d) => d.tags[slot as usize],
                _ => unreachable!(),
            })
            .collect();
        let tag = *groups.entry(key).or_insert_with(|| {
            group_slots.push(Vec::new());
            (group_slots.len() - 1) as u32
        });
        group_slots[tag as usize].push(slot);
        tags.push(tag);
    }
    let mut results = Vec::with_capacity(group_slots.len());
    for slots in &group_slots {
        let args: SmallVec<[Vector; 4]> = vecs.iter().map(|v| pick(v, slots)).collect();
        let out = apply(rip_unions, &mut *f, &args);
        assert_eq!(
            out.len(),
            slots.len() as u32,
            "apply: function changed vector length"
        );
        results.push(out);
    }
    new_dynamic(tags, results)
}
