//! Vectorized comparison and arithmetic kernels.
//!
//! Kernels are looked up by [`func_code`], which packs the operator, the
//! operand kind and both operand forms into one key. The table is built
//! once on first use. Both operands must already have the same kind
//! (callers promote numbers first); views are flattened before lookup.

use std::net::IpAddr;
use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::types::TypeContext;

use super::{
    Any, Bitmap, Bools, Dict, Floats, Form, Ints, Kind, Strs, Uints, Vector, combine, flatten,
    nonempty, reverse_pick,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Op {
    pub const ALL: [Op; 11] = [
        Op::Eq,
        Op::Ne,
        Op::Lt,
        Op::Le,
        Op::Gt,
        Op::Ge,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Mod,
    ];

    pub fn is_compare(self) -> bool {
        matches!(self, Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
        }
    }

    /// The operator that gives the same answer with operands swapped.
    pub fn flip(self) -> Op {
        match self {
            Op::Lt => Op::Gt,
            Op::Le => Op::Ge,
            Op::Gt => Op::Lt,
            Op::Ge => Op::Le,
            op => op,
        }
    }

    /// Applies a comparison operator to an ordering.
    pub fn test(self, ord: core::cmp::Ordering) -> bool {
        use core::cmp::Ordering::*;
        match self {
            Op::Eq => ord == Equal,
            Op::Ne => ord != Equal,
            Op::Lt => ord == Less,
            Op::Le => ord != Greater,
            Op::Gt => ord == Greater,
            Op::Ge => ord != Less,
            _ => false,
        }
    }
}

pub type Kernel = fn(&TypeContext, Op, &Vector, &Vector) -> Vector;

pub fn func_code(op: Op, kind: Kind, lform: Form, rform: Form) -> u32 {
    ((op as u32) << 24) | ((kind as u32) << 16) | ((lform as u32) << 8) | rform as u32
}

static KERNELS: Lazy<HashMap<u32, Kernel>> = Lazy::new(|| {
    let mut table: HashMap<u32, Kernel> = HashMap::new();
    let lanes = [
        (Form::Flat, Form::Flat),
        (Form::Flat, Form::Const),
        (Form::Const, Form::Flat),
        (Form::Const, Form::Const),
    ];
    for op in Op::ALL {
        for (lf, rf) in lanes {
            if op.is_compare() {
                table.insert(func_code(op, Kind::Int, lf, rf), compare_ints);
                table.insert(func_code(op, Kind::Uint, lf, rf), compare_uints);
                table.insert(func_code(op, Kind::Float, lf, rf), compare_floats);
                table.insert(func_code(op, Kind::String, lf, rf), compare_strs);
                table.insert(func_code(op, Kind::Bytes, lf, rf), compare_strs);
                table.insert(func_code(op, Kind::Bool, lf, rf), compare_bools);
                table.insert(func_code(op, Kind::Ip, lf, rf), compare_ips);
            } else {
                table.insert(func_code(op, Kind::Int, lf, rf), arith_ints);
                table.insert(func_code(op, Kind::Uint, lf, rf), arith_uints);
                if op != Op::Mod {
                    table.insert(func_code(op, Kind::Float, lf, rf), arith_floats);
                }
            }
        }
        if op.is_compare() {
            for kind in [Kind::Int, Kind::Uint, Kind::Float, Kind::String, Kind::Bytes] {
                table.insert(func_code(op, kind, Form::Dict, Form::Const), compare_dict_const);
                table.insert(func_code(op, kind, Form::Const, Form::Dict), compare_const_dict);
            }
        }
    }
    table
});

/// Runs the kernel for `op` on `l` and `r`, or returns `None` when no
/// kernel handles this combination of kinds and forms.
pub fn eval(ctx: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Option<Vector> {
    let l = if Form::of(l) == Form::View { flatten(l) } else { l.clone() };
    let r = if Form::of(r) == Form::View { flatten(r) } else { r.clone() };
    let kind = Kind::of(&l);
    if kind != Kind::of(&r) {
        return None;
    }
    let code = func_code(op, kind, Form::of(&l), Form::of(&r));
    let kernel = match KERNELS.get(&code) {
        Some(k) => *k,
        // Dicts without a dedicated kernel are expanded.
        None if Form::of(&l) == Form::Dict || Form::of(&r) == Form::Dict => {
            let (l, r) = (flatten(&l), flatten(&r));
            let code = func_code(op, kind, Form::of(&l), Form::of(&r));
            return KERNELS.get(&code).map(|k| k(ctx, op, &l, &r));
        }
        None => return None,
    };
    Some(kernel(ctx, op, &l, &r))
}

// ============================================================================
// Operands
// ============================================================================

enum Operand<'a, T> {
    Flat(&'a [T], Option<&'a Bitmap>),
    Const(Option<T>),
}

impl<T: Copy> Operand<'_, T> {
    fn get(&self, i: u32) -> Option<T> {
        match self {
            Operand::Flat(values, nulls) => {
                if nulls.is_some_and(|n| n.get(i)) {
                    None
                } else {
                    Some(values[i as usize])
                }
            }
            Operand::Const(v) => *v,
        }
    }
}

fn ints(v: &Vector) -> Operand<'_, i64> {
    match v {
        Vector::Int(x) => Operand::Flat(&x.values, x.nulls.as_ref()),
        Vector::Const(c) => Operand::Const(c.value.as_i64()),
        _ => unreachable!("int kernel on {:?}", Form::of(v)),
    }
}

fn uints(v: &Vector) -> Operand<'_, u64> {
    match v {
        Vector::Uint(x) => Operand::Flat(&x.values, x.nulls.as_ref()),
        Vector::Const(c) => Operand::Const(c.value.as_u64()),
        _ => unreachable!("uint kernel on {:?}", Form::of(v)),
    }
}

fn floats(v: &Vector) -> Operand<'_, f64> {
    match v {
        Vector::Float(x) => Operand::Flat(&x.values, x.nulls.as_ref()),
        Vector::Const(c) => Operand::Const(c.value.as_f64()),
        _ => unreachable!("float kernel on {:?}", Form::of(v)),
    }
}

fn ips(v: &Vector) -> Operand<'_, IpAddr> {
    match v {
        Vector::Ip(x) => Operand::Flat(&x.values, x.nulls.as_ref()),
        Vector::Const(c) => Operand::Const(c.value.as_ip()),
        _ => unreachable!("ip kernel on {:?}", Form::of(v)),
    }
}

enum StrOperand<'a> {
    Flat(&'a Strs),
    Const(Option<&'a [u8]>),
}

impl<'a> StrOperand<'a> {
    fn new(v: &'a Vector) -> Self {
        match v {
            Vector::Bytes(x) => StrOperand::Flat(x),
            Vector::Const(c) => StrOperand::Const(c.value.bytes()),
            _ => unreachable!("string kernel on {:?}", Form::of(v)),
        }
    }

    fn get(&self, i: u32) -> Option<&'a [u8]> {
        match self {
            StrOperand::Flat(s) => s.get(i),
            StrOperand::Const(v) => *v,
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

fn compare_with<T: PartialOrd>(
    op: Op,
    n: u32,
    l: impl Fn(u32) -> Option<T>,
    r: impl Fn(u32) -> Option<T>,
) -> Vector {
    let mut values = Bitmap::new(n);
    let mut nulls = Bitmap::new(n);
    for i in 0..n {
        match (l(i), r(i)) {
            (Some(a), Some(b)) => {
                let hit = match op {
                    Op::Eq => a == b,
                    Op::Ne => a != b,
                    Op::Lt => a < b,
                    Op::Le => a <= b,
                    Op::Gt => a > b,
                    Op::Ge => a >= b,
                    _ => false,
                };
                if hit {
                    values.set(i);
                }
            }
            _ => nulls.set(i),
        }
    }
    Vector::Bool(Arc::new(Bools::new(values, nonempty(nulls))))
}

fn compare_ints(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (ints(l), ints(r));
    compare_with(op, l.len(), |i| a.get(i), |i| b.get(i))
}

fn compare_uints(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (uints(l), uints(r));
    compare_with(op, l.len(), |i| a.get(i), |i| b.get(i))
}

fn compare_floats(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (floats(l), floats(r));
    compare_with(op, l.len(), |i| a.get(i), |i| b.get(i))
}

fn compare_strs(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (StrOperand::new(l), StrOperand::new(r));
    compare_with(op, l.len(), |i| a.get(i), |i| b.get(i))
}

fn compare_ips(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (ips(l), ips(r));
    compare_with(op, l.len(), |i| a.get(i), |i| b.get(i))
}

fn compare_bools(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let get = |v: &Vector, i: u32| match v {
        Vector::Bool(x) => x.get(i),
        Vector::Const(c) => c.value.as_bool(),
        _ => None,
    };
    compare_with(op, l.len(), |i| get(l, i), |i| get(r, i))
}

/// Compares only the dict's distinct entries, then re-expands through the index.
fn compare_dict_const(ctx: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (Vector::Dict(d), Vector::Const(c)) = (l, r) else {
        unreachable!("dict kernel on {:?}/{:?}", Form::of(l), Form::of(r));
    };
    let rhs = Vector::new_const(c.value.clone(), d.base.len());
    match eval(ctx, op, &d.base, &rhs) {
        Some(base) => Vector::Dict(Arc::new(Dict::new(base, d.index.clone()))),
        None => compare_with::<bool>(op, l.len(), |_| None, |_| None),
    }
}

fn compare_const_dict(ctx: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    compare_dict_const(ctx, op.flip(), r, l)
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Replaces the slots in `errs` with `error("divide by zero")`.
fn with_div_errors(ctx: &TypeContext, out: Vector, errs: Vec<u32>) -> Vector {
    if errs.is_empty() {
        return out;
    }
    let good = reverse_pick(&out, &errs);
    let err = Vector::new_const(ctx.new_error("divide by zero"), errs.len() as u32);
    combine(&good, &errs, &err)
}

fn arith_ints(ctx: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (ints(l), ints(r));
    let n = l.len();
    let mut values = Vec::with_capacity(n as usize);
    let mut nulls = Bitmap::new(n);
    let mut errs = Vec::new();
    for i in 0..n {
        let v = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => match op {
                Op::Add => x.wrapping_add(y),
                Op::Sub => x.wrapping_sub(y),
                Op::Mul => x.wrapping_mul(y),
                Op::Div | Op::Mod if y == 0 => {
                    errs.push(i);
                    0
                }
                Op::Div => x.wrapping_div(y),
                _ => x.wrapping_rem(y),
            },
            _ => {
                nulls.set(i);
                0
            }
        };
        values.push(v);
    }
    let out = Vector::Int(Arc::new(Ints::new(l.ty(), values, nonempty(nulls))));
    with_div_errors(ctx, out, errs)
}

fn arith_uints(ctx: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (uints(l), uints(r));
    let n = l.len();
    let mut values = Vec::with_capacity(n as usize);
    let mut nulls = Bitmap::new(n);
    let mut errs = Vec::new();
    for i in 0..n {
        let v = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => match op {
                Op::Add => x.wrapping_add(y),
                Op::Sub => x.wrapping_sub(y),
                Op::Mul => x.wrapping_mul(y),
                Op::Div | Op::Mod if y == 0 => {
                    errs.push(i);
                    0
                }
                Op::Div => x / y,
                _ => x % y,
            },
            _ => {
                nulls.set(i);
                0
            }
        };
        values.push(v);
    }
    let out = Vector::Uint(Arc::new(Uints::new(l.ty(), values, nonempty(nulls))));
    with_div_errors(ctx, out, errs)
}

fn arith_floats(_: &TypeContext, op: Op, l: &Vector, r: &Vector) -> Vector {
    let (a, b) = (floats(l), floats(r));
    let n = l.len();
    let mut values = Vec::with_capacity(n as usize);
    let mut nulls = Bitmap::new(n);
    for i in 0..n {
        let v = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => match op {
                Op::Add => x + y,
                Op::Sub => x - y,
                Op::Mul => x * y,
                _ => x / y,
            },
            _ => {
                nulls.set(i);
                0.0
            }
        };
        values.push(v);
    }
    Vector::Float(Arc::new(Floats::new(l.ty(), values, nonempty(nulls))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::vector::from_values;
    use pretty_assertions::assert_eq;

    fn ints_vec(vals: &[i64]) -> Vector {
        from_values(&vals.iter().map(|v| Value::int64(*v)).collect::<Vec<_>>())
    }

    #[test]
    fn test_compare_flat_const() {
        let ctx = TypeContext::new();
        let l = ints_vec(&[1, 5, 3]);
        let r = Vector::new_const(Value::int64(3), 3);
        let out = eval(&ctx, Op::Ge, &l, &r).unwrap();
        assert_eq!(
            out.values(),
            vec![Value::bool(false), Value::bool(true), Value::bool(true)]
        );
    }

    #[test]
    fn test_divide_by_zero_is_per_slot() {
        let ctx = TypeContext::new();
        let l = ints_vec(&[6, 7, 8]);
        let r = ints_vec(&[2, 0, 4]);
        let out = eval(&ctx, Op::Div, &l, &r).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.value(0), Value::int64(3));
        assert_eq!(out.value(1), ctx.new_error("divide by zero"));
        assert_eq!(out.value(2), Value::int64(2));
    }

    #[test]
    fn test_dict_const_compares_distinct_entries() {
        let ctx = TypeContext::new();
        let base = ints_vec(&[10, 20]);
        let dict = Vector::Dict(Arc::new(Dict::new(base, vec![0, 1, 1, 0])));
        let r = Vector::new_const(Value::int64(20), 4);
        let out = eval(&ctx, Op::Eq, &dict, &r).unwrap();
        assert_eq!(Form::of(&out), Form::Dict);
        let got: Vec<bool> = out.values().iter().map(|v| v.is_true()).collect();
        assert_eq!(got, vec![false, true, true, false]);
    }

    #[test]
    fn test_no_kernel_for_mixed_kinds() {
        let ctx = TypeContext::new();
        let l = ints_vec(&[1]);
        let r = Vector::new_const(Value::string("a"), 1);
        assert!(eval(&ctx, Op::Eq, &l, &r).is_none());
        let f = Vector::new_const(Value::float64(1.0), 1);
        assert!(eval(&ctx, Op::Mod, &f, &f).is_none());
    }
}
