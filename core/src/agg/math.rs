use core::cmp::Ordering;

use crate::types::{Primitive, Type, TypeContext};
use crate::value::{Number, Value, coerce};

use super::{Aggregator, input};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MathOp {
    Sum,
    Min,
    Max,
}

/// `sum`, `min` and `max`. The running state takes the promoted type of
/// every number seen so far; non-numeric inputs are skipped.
pub(super) struct Math {
    op: MathOp,
    acc: Option<(Primitive, Number)>,
}

impl Math {
    pub(super) fn new(op: MathOp) -> Self {
        Math { op, acc: None }
    }

    fn fold(&self, a: Number, b: Number) -> Number {
        match self.op {
            MathOp::Sum => match (a, b) {
                (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_add(b)),
                (Number::Uint(a), Number::Uint(b)) => Number::Uint(a.wrapping_add(b)),
                (a, b) => Number::Float(a.to_f64() + b.to_f64()),
            },
            MathOp::Min if b.compare(a) == Ordering::Less => b,
            MathOp::Max if b.compare(a) == Ordering::Greater => b,
            MathOp::Min | MathOp::Max => a,
        }
    }
}

/// Re-expresses `n` in the class of primitive `p`.
fn convert(n: Number, p: Primitive) -> Number {
    if p.is_float() {
        Number::Float(n.to_f64())
    } else if p.is_signed() {
        match n {
            Number::Uint(v) => Number::Int(v as i64),
            Number::Float(v) => Number::Int(v as i64),
            n => n,
        }
    } else {
        match n {
            Number::Int(v) => Number::Uint(v as u64),
            Number::Float(v) => Number::Uint(v as u64),
            n => n,
        }
    }
}

impl Aggregator for Math {
    fn consume(&mut self, val: &Value) {
        let Some(val) = input(val) else {
            return;
        };
        let (Some(p), Some(n)) = (val.ty().as_primitive(), Number::from_value(&val)) else {
            return;
        };
        self.acc = Some(match self.acc {
            None => (p, n),
            Some((ap, a)) => {
                let p = coerce::promote(ap, p).unwrap_or(Primitive::Float64);
                (p, self.fold(convert(a, p), convert(n, p)))
            }
        });
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        self.consume(partial)
    }

    fn result(&mut self, _ctx: &TypeContext) -> Value {
        match self.acc {
            Some((p, n)) => n.to_value(p),
            None => Value::null_of(Type::int64()),
        }
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}
