use std::sync::Arc;

use crate::types::{Primitive, Type, TypeContext};
use crate::value::{Number, Value, coerce};
use crate::vector::kernels::{self, Op};
use crate::vector::{Any, Bitmap, Floats, Form, Ints, Kind, Uints, Vector, apply, under};

use super::{Evaluator, map_slots, map_values};

/// `lhs <op> rhs` for `+ - * / %`. Operands are promoted to a common
/// numeric type; `+` also concatenates strings.
pub struct Arith {
    ctx: Arc<TypeContext>,
    op: Op,
    lhs: Box<dyn Evaluator>,
    rhs: Box<dyn Evaluator>,
}

impl Arith {
    pub fn new(
        ctx: Arc<TypeContext>,
        op: Op,
        lhs: Box<dyn Evaluator>,
        rhs: Box<dyn Evaluator>,
    ) -> Self {
        debug_assert!(!op.is_compare(), "{:?} is not arithmetic", op);
        Arith { ctx, op, lhs, rhs }
    }

    fn arith(&self, l: &Vector, r: &Vector) -> Vector {
        let n = l.len();
        if n == 0 {
            return Vector::Null(0);
        }
        let (l, r) = (under(l), under(r));
        if l.is_error() {
            return l;
        }
        if r.is_error() {
            return r;
        }
        let (lk, rk) = (Kind::of(&l), Kind::of(&r));
        if lk == Kind::Null || rk == Kind::Null {
            return Vector::new_const(Value::null(), n);
        }
        if lk.is_number() && rk.is_number() {
            return self.numbers(&l, &r);
        }
        if self.op == Op::Add && lk == Kind::String && rk == Kind::String {
            return map_slots(n, |slot| concat(&l.value(slot), &r.value(slot)));
        }
        map_values(&l, |val| {
            self.ctx.wrap_error(
                &format!("incompatible types for '{}' operator", self.op.symbol()),
                &val,
            )
        })
    }

    fn numbers(&self, l: &Vector, r: &Vector) -> Vector {
        let (lp, rp) = (primitive(l), primitive(r));
        let Some(p) = coerce::promote(lp, rp) else {
            unreachable!("numeric kinds without numeric types");
        };
        if self.op == Op::Mod && p.is_float() {
            let msg = format!("type {} incompatible with '%' operator", p.name());
            return map_values(l, |val| self.ctx.wrap_error(&msg, &val));
        }
        // Same-typed time and duration operands keep their type.
        let target = if lp == rp {
            l.ty().under().clone()
        } else {
            Type::primitive(p)
        };
        let l = promote_vector(l, &target);
        let r = promote_vector(r, &target);
        match kernels::eval(&self.ctx, self.op, &l, &r) {
            Some(out) => out,
            None => unreachable!(
                "no {} kernel for {:?}/{:?}",
                self.op.symbol(),
                Form::of(&l),
                Form::of(&r)
            ),
        }
    }
}

impl Evaluator for Arith {
    fn eval(&self, this: &Vector) -> Vector {
        let l = self.lhs.eval(this);
        let r = self.rhs.eval(this);
        apply(true, &mut |args: &[Vector]| self.arith(&args[0], &args[1]), &[l, r])
    }
}

fn primitive(v: &Vector) -> Primitive {
    v.ty().under().as_primitive().unwrap_or(Primitive::Null)
}

/// Converts a numeric vector to the numeric type `target`.
pub(crate) fn promote_vector(v: &Vector, target: &Type) -> Vector {
    if &v.ty() == target {
        return v.clone();
    }
    let Some(p) = target.as_primitive() else {
        return v.clone();
    };
    let convert = |val: Value| match Number::from_value(&val) {
        Some(num) => num.to_value(p).retype(target.clone()),
        None => Value::null_of(target.clone()),
    };
    let nums: Option<(Vec<Number>, Option<Bitmap>)> = match v {
        Vector::Int(x) => Some((x.values.iter().map(|&n| Number::Int(n)).collect(), x.nulls.clone())),
        Vector::Uint(x) => Some((x.values.iter().map(|&n| Number::Uint(n)).collect(), x.nulls.clone())),
        Vector::Float(x) => Some((x.values.iter().map(|&n| Number::Float(n)).collect(), x.nulls.clone())),
        _ => None,
    };
    match (v, nums) {
        (Vector::Const(c), _) => Vector::new_const(convert(c.value.clone()), c.len),
        (_, Some((nums, nulls))) if p != Primitive::Float16 => {
            number_column(&nums, nulls, p, target.clone())
        }
        _ => map_values(v, convert),
    }
}

/// A flat vector of type `target` (numeric primitive `p`) from decoded
/// numbers, converted column-wise.
fn number_column(nums: &[Number], nulls: Option<Bitmap>, p: Primitive, target: Type) -> Vector {
    if p == Primitive::Float32 {
        let values = nums.iter().map(|n| n.to_f64() as f32 as f64).collect();
        Vector::Float(Arc::new(Floats::new(target, values, nulls)))
    } else if p.is_float() {
        let values = nums.iter().map(|n| n.to_f64()).collect();
        Vector::Float(Arc::new(Floats::new(target, values, nulls)))
    } else if p.is_signed() {
        let values = nums.iter().map(|n| n.as_signed(p)).collect();
        Vector::Int(Arc::new(Ints::new(target, values, nulls)))
    } else {
        let values = nums.iter().map(|n| n.as_unsigned(p)).collect();
        Vector::Uint(Arc::new(Uints::new(target, values, nulls)))
    }
}

fn concat(a: &Value, b: &Value) -> Value {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => Value::string(&format!("{a}{b}")),
        _ => Value::null_of(Type::string()),
    }
}
