use std::sync::Arc;

use crate::types::{Kind as TypeKindTag, Primitive, Type, TypeContext};
use crate::value::{Number, Value, compare, equal};
use crate::vector::kernels::{self, Op};
use crate::vector::{Any, Kind, Vector, apply, under};

use super::arith::promote_vector;
use super::{Evaluator, map_slots};

/// `lhs <op> rhs` for `== != < <= > >=`. Numbers are compared after
/// promotion; values of incompatible types are unequal rather than errors.
pub struct Compare {
    ctx: Arc<TypeContext>,
    op: Op,
    lhs: Box<dyn Evaluator>,
    rhs: Box<dyn Evaluator>,
}

impl Compare {
    pub fn new(
        ctx: Arc<TypeContext>,
        op: Op,
        lhs: Box<dyn Evaluator>,
        rhs: Box<dyn Evaluator>,
    ) -> Self {
        debug_assert!(op.is_compare(), "{:?} is not a comparison", op);
        Compare { ctx, op, lhs, rhs }
    }

    fn compare(&self, l: &Vector, r: &Vector) -> Vector {
        let n = l.len();
        let (l, r) = (under(l), under(r));
        if l.is_error() {
            return l;
        }
        if r.is_error() {
            return r;
        }
        let (lk, rk) = (Kind::of(&l), Kind::of(&r));
        if lk == Kind::Null || rk == Kind::Null {
            return Vector::new_const(Value::null_of(Type::bool()), n);
        }
        if lk == rk {
            if let Some(out) = kernels::eval(&self.ctx, self.op, &l, &r) {
                return out;
            }
        }
        // Integers against floats compare as float64.
        if lk.is_number() && rk.is_number() && (lk == Kind::Float || rk == Kind::Float) {
            let target = Type::primitive(Primitive::Float64);
            let (l, r) = (promote_vector(&l, &target), promote_vector(&r, &target));
            if let Some(out) = kernels::eval(&self.ctx, self.op, &l, &r) {
                return out;
            }
        }
        map_slots(n, |slot| compare_values(self.op, &l.value(slot), &r.value(slot)))
    }
}

impl Evaluator for Compare {
    fn eval(&self, this: &Vector) -> Vector {
        let l = self.lhs.eval(this);
        let r = self.rhs.eval(this);
        apply(true, &mut |args: &[Vector]| self.compare(&args[0], &args[1]), &[l, r])
    }
}

/// Row-wise comparison used when no kernel applies.
pub(crate) fn compare_values(op: Op, a: &Value, b: &Value) -> Value {
    let (a, b) = (a.under(), b.under());
    if a.is_error() {
        return a;
    }
    if b.is_error() {
        return b;
    }
    if a.is_null() || b.is_null() {
        return Value::null_of(Type::bool());
    }
    if let (Some(x), Some(y)) = (Number::from_value(&a), Number::from_value(&b)) {
        return Value::bool(op.test(x.compare(y)));
    }
    let (ta, tb) = (a.ty().under(), b.ty().under());
    let comparable = ta == tb
        || (ta.kind_tag() == tb.kind_tag() && ta.kind_tag() != TypeKindTag::Primitive);
    if !comparable {
        return Value::bool(op == Op::Ne);
    }
    let hit = match op {
        Op::Eq => equal(&a, &b),
        Op::Ne => !equal(&a, &b),
        // Type values only support equality.
        _ if ta.kind_tag() == TypeKindTag::TypeValue => false,
        _ => op.test(compare(&a, &b, true)),
    };
    Value::bool(hit)
}
