use std::net::IpAddr;
use std::sync::Arc;

use crate::codec::prims::Net;
use crate::codec::{Builder, normalize_map, normalize_set};
use crate::types::{Primitive, Type, TypeContext, TypeKind};
use crate::value::build::{append_as, record_of};
use crate::value::coerce::fits;
use crate::value::{Number, Value};
use crate::vector::{Any, Vector};

use super::arith::promote_vector;
use super::{Evaluator, Literal, map_slots, map_values};

/// `cast(expr, target)`. The target evaluates to type values; when it is
/// not a type the whole result is a single error.
pub struct Cast {
    ctx: Arc<TypeContext>,
    expr: Box<dyn Evaluator>,
    target: Box<dyn Evaluator>,
}

impl Cast {
    pub fn new(ctx: Arc<TypeContext>, expr: Box<dyn Evaluator>, target: Box<dyn Evaluator>) -> Self {
        Cast { ctx, expr, target }
    }

    /// A cast to a fixed type.
    pub fn to(ctx: Arc<TypeContext>, expr: Box<dyn Evaluator>, target: &Type) -> Self {
        let target = Box::new(Literal(ctx.lookup_type_value(target)));
        Cast::new(ctx, expr, target)
    }
}

impl Evaluator for Cast {
    fn eval(&self, this: &Vector) -> Vector {
        let vals = self.expr.eval(this);
        let targets = self.target.eval(this);
        if let Vector::Const(c) = &targets {
            let Some(ty) = c.value.as_type(&self.ctx) else {
                let err = self.ctx.wrap_error("cast target must be a type", &c.value);
                return Vector::new_const(err, this.len());
            };
            if !vals.is_dynamic() && vals.ty() == ty {
                return vals;
            }
            if let Some(out) = ints_to_float(&vals, &ty) {
                return out;
            }
            return map_values(&vals, |val| cast_value(&self.ctx, &val, &ty));
        }
        map_slots(this.len(), |slot| {
            let target = targets.value(slot);
            match target.as_type(&self.ctx) {
                Some(ty) => cast_value(&self.ctx, &vals.value(slot), &ty),
                None => self.ctx.wrap_error("cast target must be a type", &target),
            }
        })
    }
}

/// Integer columns without nulls cast to a float type column-wise; every
/// integer fits a float.
fn ints_to_float(vals: &Vector, target: &Type) -> Option<Vector> {
    if !matches!(target.as_primitive()?, Primitive::Float32 | Primitive::Float64) {
        return None;
    }
    let source = match vals {
        Vector::Int(x) if x.nulls.is_none() => &x.ty,
        Vector::Uint(x) if x.nulls.is_none() => &x.ty,
        _ => return None,
    };
    match source.as_primitive()? {
        Primitive::Time | Primitive::Duration => None,
        p if p.is_integer() => Some(promote_vector(vals, target)),
        _ => None,
    }
}

fn cannot(ctx: &TypeContext, val: &Value, target: &Type) -> Value {
    ctx.wrap_error(&format!("cannot cast to {}", target), val)
}

/// Casts one value to `target`. Errors pass through untouched; failures
/// yield a wrapped error carrying the input.
pub fn cast_value(ctx: &TypeContext, val: &Value, target: &Type) -> Value {
    if val.ty() == target || val.is_error() {
        return val.clone();
    }
    match target.kind() {
        TypeKind::Named(_, inner) => {
            let out = cast_value(ctx, val, inner);
            return if out.is_error() && !inner.is_error() {
                out
            } else {
                out.retype(target.clone())
            };
        }
        TypeKind::Error(inner) => {
            let out = cast_value(ctx, val, inner);
            if out.is_error() && !inner.is_error() {
                return out;
            }
            return Value::new(target.clone(), out.bytes().map(<[u8]>::to_vec));
        }
        _ => {}
    }
    // Unions cast through their member unless the target is a union too.
    let val = if target.is_union() {
        val.retype(val.ty().under().clone())
    } else {
        val.under()
    };
    if val.ty() == target {
        return val;
    }
    if val.is_null() {
        return Value::null_of(target.clone());
    }
    match target.kind() {
        TypeKind::Primitive(p) => {
            cast_primitive(ctx, &val, *p).unwrap_or_else(|| cannot(ctx, &val, target))
        }
        TypeKind::Record(fields) => {
            let Some(entries) = val.record_entries() else {
                return cannot(ctx, &val, target);
            };
            let vals: Vec<Option<Value>> = fields
                .iter()
                .map(|f| match entries.iter().find(|(ef, _)| ef.name == f.name) {
                    Some((_, Some(v))) => Some(cast_value(ctx, v, &f.ty)),
                    _ if f.is_opt() => None,
                    _ => Some(Value::null_of(f.ty.clone())),
                })
                .collect();
            record_of(target, &vals)
        }
        TypeKind::Array(elem) | TypeKind::Set(elem) => {
            let Some(elems) = val.elements() else {
                return cannot(ctx, &val, target);
            };
            let mut b = Builder::new();
            for e in &elems {
                append_as(&mut b, elem, &cast_value(ctx, e, elem));
            }
            let body = b.into_bytes();
            let body = if matches!(target.kind(), TypeKind::Set(_)) {
                normalize_set(&body)
            } else {
                body
            };
            Value::new(target.clone(), Some(body))
        }
        TypeKind::Map(key, elem) => {
            let Some(entries) = val.map_entries() else {
                return cannot(ctx, &val, target);
            };
            let mut b = Builder::new();
            for (k, v) in &entries {
                append_as(&mut b, key, &cast_value(ctx, k, key));
                append_as(&mut b, elem, &cast_value(ctx, v, elem));
            }
            Value::new(target.clone(), Some(normalize_map(&b.into_bytes())))
        }
        TypeKind::Union(members) => {
            if members.contains(val.ty()) {
                return Value::union(target, &val);
            }
            let kind = val.ty().kind_tag();
            let same_kind = members.iter().filter(|m| m.kind_tag() == kind);
            for member in same_kind.chain(members.iter()) {
                let out = cast_value(ctx, &val, member);
                if !out.is_error() {
                    return Value::union(target, &out);
                }
            }
            cannot(ctx, &val, target)
        }
        TypeKind::Enum(symbols) => match val.as_str() {
            Some(s) => match symbols.iter().position(|sym| sym == s) {
                Some(i) => Value::enum_value(target.clone(), i as u64),
                None => cannot(ctx, &val, target),
            },
            None => cannot(ctx, &val, target),
        },
        TypeKind::Named(..) | TypeKind::Error(_) => unreachable!("handled above"),
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(Number::Int(v));
    }
    if let Ok(v) = s.parse::<u64>() {
        return Some(Number::Uint(v));
    }
    s.parse::<f64>().ok().map(Number::Float)
}

fn cast_primitive(ctx: &TypeContext, val: &Value, p: Primitive) -> Option<Value> {
    if p.is_number() {
        let num = match val.as_bool() {
            Some(b) => Number::Uint(b as u64),
            None => match val.as_str() {
                Some(s) => parse_number(s)?,
                None => Number::from_value(val)?,
            },
        };
        let num = match num {
            // Floats truncate toward zero when cast to integers.
            Number::Float(f) if p.is_integer() && f.is_finite() => Number::Float(f.trunc()),
            num => num,
        };
        return fits(num, p).then(|| num.to_value(p));
    }
    match p {
        Primitive::Bool => match val.as_str() {
            Some(s) => s.trim().parse::<bool>().ok().map(Value::bool),
            None => Number::from_value(val).map(|n| Value::bool(n.to_f64() != 0.0)),
        },
        Primitive::String => Some(match (val.as_str(), val.as_bytes(), val.enum_symbol()) {
            (Some(s), _, _) => Value::string(s),
            (_, Some(b), _) => Value::string(core::str::from_utf8(b).ok()?),
            (_, _, Some(sym)) => Value::string(sym),
            _ => Value::string(&val.to_string()),
        }),
        Primitive::Bytes => match (val.as_str(), val.as_bytes()) {
            (Some(s), _) => Some(Value::bytes_value(s.as_bytes())),
            (_, Some(b)) => Some(Value::bytes_value(b)),
            _ => val.bytes().map(Value::bytes_value),
        },
        Primitive::Ip => val.as_str()?.trim().parse::<IpAddr>().ok().map(Value::ip),
        Primitive::Net => {
            let (addr, prefix) = val.as_str()?.trim().split_once('/')?;
            Some(Value::net(Net::new(addr.parse().ok()?, prefix.parse().ok()?)))
        }
        Primitive::Type => val.as_type(ctx).map(|ty| ctx.lookup_type_value(&ty)),
        _ => None,
    }
}
