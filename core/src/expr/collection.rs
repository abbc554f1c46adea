//! Array, set and map literals.
//!
//! Elements are gathered per slot along with their types; a collection
//! whose elements have more than one type gets a union element type and
//! each element is tagged with its member.

use std::sync::Arc;

use crate::types::TypeContext;
use crate::value::{Value, build};
use crate::vector::{Any, Vector};

use super::{Evaluator, map_slots};

pub enum ListElem {
    Value(Box<dyn Evaluator>),
    /// `...expr`: splices the elements of an array or set.
    Spread(Box<dyn Evaluator>),
}

fn collect(elems: &[ListElem], vals: &[Vector], slot: u32) -> Vec<Value> {
    let mut out = Vec::new();
    for (elem, vec) in elems.iter().zip(vals) {
        let val = vec.value(slot);
        match elem {
            ListElem::Value(_) => out.push(val),
            ListElem::Spread(_) => {
                if let Some(inner) = val.under().elements() {
                    out.extend(inner.into_iter().map(|v| v.under()));
                }
            }
        }
    }
    out
}

fn eval_elems(elems: &[ListElem], this: &Vector) -> Vec<Vector> {
    elems
        .iter()
        .map(|elem| match elem {
            ListElem::Value(e) | ListElem::Spread(e) => e.eval(this),
        })
        .collect()
}

pub struct ArrayExpr {
    ctx: Arc<TypeContext>,
    elems: Vec<ListElem>,
}

impl ArrayExpr {
    pub fn new(ctx: Arc<TypeContext>, elems: Vec<ListElem>) -> Self {
        ArrayExpr { ctx, elems }
    }
}

impl Evaluator for ArrayExpr {
    fn eval(&self, this: &Vector) -> Vector {
        let vals = eval_elems(&self.elems, this);
        map_slots(this.len(), |slot| {
            build::array(&self.ctx, &collect(&self.elems, &vals, slot))
        })
    }
}

pub struct SetExpr {
    ctx: Arc<TypeContext>,
    elems: Vec<ListElem>,
}

impl SetExpr {
    pub fn new(ctx: Arc<TypeContext>, elems: Vec<ListElem>) -> Self {
        SetExpr { ctx, elems }
    }
}

impl Evaluator for SetExpr {
    fn eval(&self, this: &Vector) -> Vector {
        let vals = eval_elems(&self.elems, this);
        map_slots(this.len(), |slot| {
            build::set(&self.ctx, &collect(&self.elems, &vals, slot))
        })
    }
}

pub struct MapExpr {
    ctx: Arc<TypeContext>,
    entries: Vec<(Box<dyn Evaluator>, Box<dyn Evaluator>)>,
}

impl MapExpr {
    pub fn new(ctx: Arc<TypeContext>, entries: Vec<(Box<dyn Evaluator>, Box<dyn Evaluator>)>) -> Self {
        MapExpr { ctx, entries }
    }
}

impl Evaluator for MapExpr {
    fn eval(&self, this: &Vector) -> Vector {
        let vals: Vec<(Vector, Vector)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.eval(this), v.eval(this)))
            .collect();
        map_slots(this.len(), |slot| {
            let pairs: Vec<(Value, Value)> = vals
                .iter()
                .map(|(k, v)| (k.value(slot), v.value(slot)))
                .collect();
            build::map(&self.ctx, &pairs)
        })
    }
}
