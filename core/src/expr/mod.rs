//! Vector expression evaluators.
//!
//! An [`Evaluator`] maps the current "this" vector to a result vector of
//! the same length. Null, missing and error slots travel in-band. Most
//! evaluators split their inputs with [`crate::vector::apply`] so the
//! per-type code only ever sees type-homogeneous vectors.

mod arith;
mod cast;
mod collection;
mod compare;
mod conditional;
mod dequiet;
mod dot;
pub mod function;
mod in_expr;
mod logic;
mod record;
mod slice;
mod sort;
mod udf;
mod var;


use std::sync::Arc;

use parking_lot::Mutex;

pub use arith::Arith;
pub use cast::{Cast, cast_value};
pub use collection::{ArrayExpr, ListElem, MapExpr, SetExpr};
pub use compare::Compare;
pub use conditional::Conditional;
pub use dequiet::{Dequiet, dequiet_value};
pub use dot::{Dot, Index};
pub use in_expr::In;
pub use logic::{And, Not, Or};
pub use record::{RecordElem, RecordExpr};
pub use slice::Slice;
pub use sort::{Comparator, SortKey, guess_sort_key};
pub use udf::{Call, DEFAULT_MAX_DEPTH, Lambda};
pub use var::{Frame, Var};

use crate::value::Value;
use crate::vector::{Any, Vector, from_values};

/// Maps a vector to a vector of the same length.
pub trait Evaluator: Send + Sync {
    fn eval(&self, this: &Vector) -> Vector;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn eval(&self, this: &Vector) -> Vector {
        (**self).eval(this)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn eval(&self, this: &Vector) -> Vector {
        (**self).eval(this)
    }
}

/// Owner of per-stream state that must be cleared at end of stream.
pub trait Resetter: Send + Sync {
    fn reset(&self);
}

/// The resetters accumulated while building one operator's expressions.
#[derive(Clone, Default)]
pub struct Resetters(Arc<Mutex<Vec<Arc<dyn Resetter>>>>);

impl Resetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, r: Arc<dyn Resetter>) {
        self.0.lock().push(r);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        for r in self.0.lock().iter() {
            r.reset();
        }
    }
}

/// The identity evaluator.
#[derive(Debug, Default, Clone, Copy)]
pub struct This;

impl Evaluator for This {
    fn eval(&self, this: &Vector) -> Vector {
        this.clone()
    }
}

/// A constant, replicated to the length of the input.
#[derive(Debug, Clone)]
pub struct Literal(pub Value);

impl Evaluator for Literal {
    fn eval(&self, this: &Vector) -> Vector {
        Vector::new_const(self.0.clone(), this.len())
    }
}

/// Builds a vector by computing one value per slot.
pub(crate) fn map_slots(n: u32, f: impl FnMut(u32) -> Value) -> Vector {
    let vals: Vec<Value> = (0..n).map(f).collect();
    if vals.is_empty() {
        return Vector::Null(0);
    }
    from_values(&vals)
}

/// Row-wise evaluation of `f` over a single vector.
pub(crate) fn map_values(v: &Vector, mut f: impl FnMut(Value) -> Value) -> Vector {
    map_slots(v.len(), |slot| f(v.value(slot)))
}
