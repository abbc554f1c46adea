//! Three-valued boolean logic.
//!
//! `false` dominates `and` and `true` dominates `or`, even over errors and
//! nulls. Otherwise errors win over nulls.

use std::sync::Arc;

use crate::types::{Type, TypeContext};
use crate::value::Value;
use crate::vector::{Any, Bitmap, Bools, Vector};

use super::{Evaluator, map_slots};

enum Truth {
    Bool(bool),
    Null,
    Error(Value),
}

fn truth(ctx: &TypeContext, val: &Value) -> Truth {
    let val = val.under();
    if val.is_error() {
        return Truth::Error(val);
    }
    if val.is_null() {
        return Truth::Null;
    }
    match val.as_bool() {
        Some(b) => Truth::Bool(b),
        None => Truth::Error(ctx.wrap_error("not type bool", &val)),
    }
}

fn null_bool() -> Value {
    Value::null_of(Type::bool())
}

/// Flat booleans without nulls, which the fast paths operate on.
fn plain_bools(v: &Vector) -> Option<&Bitmap> {
    match v {
        Vector::Bool(b) if b.nulls.is_none() => Some(&b.values),
        _ => None,
    }
}

fn from_bitmap(values: Bitmap) -> Vector {
    Vector::Bool(Arc::new(Bools::new(values, None)))
}

pub struct And {
    ctx: Arc<TypeContext>,
    lhs: Box<dyn Evaluator>,
    rhs: Box<dyn Evaluator>,
}

impl And {
    pub fn new(ctx: Arc<TypeContext>, lhs: Box<dyn Evaluator>, rhs: Box<dyn Evaluator>) -> Self {
        And { ctx, lhs, rhs }
    }
}

impl Evaluator for And {
    fn eval(&self, this: &Vector) -> Vector {
        let l = self.lhs.eval(this);
        let r = self.rhs.eval(this);
        if let (Some(a), Some(b)) = (plain_bools(&l), plain_bools(&r)) {
            return from_bitmap(Bitmap::from_fn(a.len(), |i| a.get(i) && b.get(i)));
        }
        map_slots(this.len(), |slot| {
            match (truth(&self.ctx, &l.value(slot)), truth(&self.ctx, &r.value(slot))) {
                (Truth::Bool(false), _) | (_, Truth::Bool(false)) => Value::bool(false),
                (Truth::Error(e), _) | (_, Truth::Error(e)) => e,
                (Truth::Null, _) | (_, Truth::Null) => null_bool(),
                _ => Value::bool(true),
            }
        })
    }
}

pub struct Or {
    ctx: Arc<TypeContext>,
    lhs: Box<dyn Evaluator>,
    rhs: Box<dyn Evaluator>,
}

impl Or {
    pub fn new(ctx: Arc<TypeContext>, lhs: Box<dyn Evaluator>, rhs: Box<dyn Evaluator>) -> Self {
        Or { ctx, lhs, rhs }
    }
}

impl Evaluator for Or {
    fn eval(&self, this: &Vector) -> Vector {
        let l = self.lhs.eval(this);
        let r = self.rhs.eval(this);
        if let (Some(a), Some(b)) = (plain_bools(&l), plain_bools(&r)) {
            return from_bitmap(a.or(b));
        }
        map_slots(this.len(), |slot| {
            match (truth(&self.ctx, &l.value(slot)), truth(&self.ctx, &r.value(slot))) {
                (Truth::Bool(true), _) | (_, Truth::Bool(true)) => Value::bool(true),
                (Truth::Error(e), _) | (_, Truth::Error(e)) => e,
                (Truth::Null, _) | (_, Truth::Null) => null_bool(),
                _ => Value::bool(false),
            }
        })
    }
}

pub struct Not {
    ctx: Arc<TypeContext>,
    expr: Box<dyn Evaluator>,
}

impl Not {
    pub fn new(ctx: Arc<TypeContext>, expr: Box<dyn Evaluator>) -> Self {
        Not { ctx, expr }
    }
}

impl Evaluator for Not {
    fn eval(&self, this: &Vector) -> Vector {
        let v = self.expr.eval(this);
        if let Some(a) = plain_bools(&v) {
            return from_bitmap(Bitmap::from_fn(a.len(), |i| !a.get(i)));
        }
        map_slots(this.len(), |slot| match truth(&self.ctx, &v.value(slot)) {
            Truth::Bool(b) => Value::bool(!b),
            Truth::Null => null_bool(),
            Truth::Error(e) => e,
        })
    }
}
