//! Built-in function dispatch.
//!
//! [`lookup`] resolves a function name and argument list to an evaluator.
//! The functions here are the ones the error model and the operators rely
//! on; each one is a row-wise body run by [`Func`] through `apply`, so a
//! body always sees type-homogeneous inputs.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Kind as TypeKindTag, Type, TypeContext};
use crate::value::{Number, Value};
use crate::vector::{Any, Vector, apply};

use super::{Evaluator, map_slots};

type Body = fn(&TypeContext, &[Value]) -> Value;

/// A built-in function call.
pub struct Func {
    ctx: Arc<TypeContext>,
    name: &'static str,
    body: Body,
    args: Vec<Box<dyn Evaluator>>,
}

impl Evaluator for Func {
    fn eval(&self, this: &Vector) -> Vector {
        let args: Vec<Vector> = self.args.iter().map(|a| a.eval(this)).collect();
        if args.is_empty() {
            return map_slots(this.len(), |_| (self.body)(&self.ctx, &[]));
        }
        apply(
            false,
            &mut |args: &[Vector]| {
                map_slots(args[0].len(), |slot| {
                    let vals: Vec<Value> = args.iter().map(|a| a.value(slot)).collect();
                    (self.body)(&self.ctx, &vals)
                })
            },
            &args,
        )
    }
}

impl core::fmt::Debug for Func {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.name, self.args.len())
    }
}

/// Argument count accepted by a function.
enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

const FUNCS: &[(&str, Arity, Body)] = &[
    ("abs", Arity::Exactly(1), abs),
    ("coalesce", Arity::AtLeast(1), coalesce),
    ("error", Arity::Exactly(1), error),
    ("has", Arity::AtLeast(1), has),
    ("has_error", Arity::Exactly(1), has_error),
    ("is_error", Arity::Exactly(1), is_error),
    ("kind", Arity::Exactly(1), kind),
    ("len", Arity::Exactly(1), len),
    ("lower", Arity::Exactly(1), lower),
    ("missing", Arity::AtLeast(1), missing),
    ("nameof", Arity::Exactly(1), nameof),
    ("quiet", Arity::Exactly(1), quiet),
    ("typeof", Arity::Exactly(1), type_of),
    ("under", Arity::Exactly(1), under),
    ("upper", Arity::Exactly(1), upper),
];

/// Resolves `name(args...)`. Unknown names and wrong argument counts are
/// compile errors.
pub fn lookup(
    ctx: &Arc<TypeContext>,
    name: &str,
    args: Vec<Box<dyn Evaluator>>,
) -> Result<Box<dyn Evaluator>> {
    let Some((name, arity, body)) = FUNCS.iter().find(|(n, _, _)| *n == name) else {
        return Err(Error::compile(format!("no such function: {}", name)));
    };
    let ok = match arity {
        Arity::Exactly(n) => args.len() == *n,
        Arity::AtLeast(n) => args.len() >= *n,
    };
    if !ok {
        return Err(Error::compile(format!(
            "{}: wrong number of arguments ({})",
            name,
            args.len()
        )));
    }
    Ok(Box::new(Func {
        ctx: ctx.clone(),
        name: *name,
        body: *body,
        args,
    }))
}

fn type_of(ctx: &TypeContext, args: &[Value]) -> Value {
    ctx.lookup_type_value(args[0].ty())
}

fn kind(_: &TypeContext, args: &[Value]) -> Value {
    let name = match args[0].ty().under().kind_tag() {
        TypeKindTag::Primitive => "primitive",
        TypeKindTag::Record => "record",
        TypeKindTag::Array => "array",
        TypeKindTag::Set => "set",
        TypeKindTag::Map => "map",
        TypeKindTag::Union => "union",
        TypeKindTag::Enum => "enum",
        TypeKindTag::Error => "error",
        TypeKindTag::TypeValue => "type",
        TypeKindTag::Named => unreachable!("under strips named types"),
    };
    Value::string(name)
}

fn nameof(ctx: &TypeContext, args: &[Value]) -> Value {
    match args[0].ty().name() {
        Some(name) => Value::string(name),
        None => ctx.missing(),
    }
}

fn under(_: &TypeContext, args: &[Value]) -> Value {
    let val = args[0].under();
    val.error_payload().unwrap_or(val)
}

fn is_error(_: &TypeContext, args: &[Value]) -> Value {
    Value::bool(args[0].is_error())
}

fn contains_error(val: &Value) -> bool {
    if val.is_error() {
        return true;
    }
    let val = val.under();
    if val.is_null() {
        return false;
    }
    if let Some(entries) = val.record_entries() {
        return entries.iter().any(|(_, v)| v.as_ref().is_some_and(contains_error));
    }
    if let Some(elems) = val.elements() {
        return elems.iter().any(contains_error);
    }
    if let Some(entries) = val.map_entries() {
        return entries
            .iter()
            .any(|(k, v)| contains_error(k) || contains_error(v));
    }
    false
}

fn has_error(_: &TypeContext, args: &[Value]) -> Value {
    Value::bool(contains_error(&args[0]))
}

fn error(ctx: &TypeContext, args: &[Value]) -> Value {
    ctx.error_value(&args[0])
}

fn quiet(ctx: &TypeContext, args: &[Value]) -> Value {
    if args[0].is_missing() {
        ctx.quiet()
    } else {
        args[0].clone()
    }
}

fn missing(_: &TypeContext, args: &[Value]) -> Value {
    Value::bool(args.iter().any(Value::is_missing))
}

fn has(_: &TypeContext, args: &[Value]) -> Value {
    Value::bool(!args.iter().any(Value::is_missing))
}

fn len(ctx: &TypeContext, args: &[Value]) -> Value {
    let val = args[0].under();
    if val.is_error() {
        return val;
    }
    if val.is_null() {
        return Value::int64(0);
    }
    let n = if let Some(s) = val.as_str() {
        s.chars().count()
    } else if let Some(b) = val.as_bytes() {
        b.len()
    } else if let Some(elems) = val.elements() {
        elems.len()
    } else if let Some(entries) = val.map_entries() {
        entries.len()
    } else if let Some(fields) = val.ty().record_fields() {
        fields.len()
    } else if let Some(ty) = val.as_type(ctx) {
        ty.record_fields().map_or(1, <[_]>::len)
    } else {
        return ctx.wrap_error("len: bad type", &val);
    };
    Value::int64(n as i64)
}

fn map_str(ctx: &TypeContext, val: &Value, name: &str, f: fn(&str) -> String) -> Value {
    let val = val.under();
    if val.is_error() || val.is_null() {
        return val;
    }
    match val.as_str() {
        Some(s) => Value::string(&f(s)),
        None => ctx.wrap_error(&format!("{}: string arg required", name), &val),
    }
}

fn lower(ctx: &TypeContext, args: &[Value]) -> Value {
    map_str(ctx, &args[0], "lower", str::to_lowercase)
}

fn upper(ctx: &TypeContext, args: &[Value]) -> Value {
    map_str(ctx, &args[0], "upper", str::to_uppercase)
}

fn abs(ctx: &TypeContext, args: &[Value]) -> Value {
    let val = args[0].under();
    if val.is_error() || val.is_null() {
        return val;
    }
    let Some(p) = val.ty().as_primitive() else {
        return ctx.wrap_error("abs: not a number", &val);
    };
    match Number::from_value(&val) {
        Some(Number::Int(v)) => Number::Int(v.wrapping_abs()).to_value(p),
        Some(Number::Uint(_)) => val,
        Some(Number::Float(v)) => Number::Float(v.abs()).to_value(p),
        None => ctx.wrap_error("abs: not a number", &val),
    }
}

fn coalesce(_: &TypeContext, args: &[Value]) -> Value {
    args.iter()
        .find(|v| !v.is_null() && !v.is_error())
        .cloned()
        .unwrap_or_else(|| Value::null_of(Type::null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Literal, This};
    use crate::vector::from_values;
    use pretty_assertions::assert_eq;

    fn call(ctx: &Arc<TypeContext>, name: &str, arg: Value) -> Value {
        let f = lookup(ctx, name, vec![Box::new(Literal(arg))]).unwrap();
        f.eval(&Vector::Null(1)).value(0)
    }

    #[test]
    fn test_unknown_function() {
        let ctx = Arc::new(TypeContext::new());
        let err = lookup(&ctx, "nope", vec![]).err().unwrap();
        assert_eq!(err.to_string(), "no such function: nope");
        let err = lookup(&ctx, "len", vec![]).err().unwrap();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn test_error_helpers() {
        let ctx = Arc::new(TypeContext::new());
        assert_eq!(call(&ctx, "quiet", ctx.missing()), ctx.quiet());
        assert_eq!(call(&ctx, "is_error", ctx.missing()), Value::bool(true));
        assert_eq!(call(&ctx, "missing", ctx.missing()), Value::bool(true));
        assert_eq!(call(&ctx, "has", Value::int64(1)), Value::bool(true));
        assert_eq!(
            call(&ctx, "error", Value::string("x")).to_string(),
            "error(\"x\")"
        );
    }

    #[test]
    fn test_len_and_case() {
        let ctx = Arc::new(TypeContext::new());
        assert_eq!(call(&ctx, "len", Value::string("héllo")), Value::int64(5));
        assert_eq!(call(&ctx, "upper", Value::string("ab")), Value::string("AB"));
        assert_eq!(call(&ctx, "abs", Value::int64(-3)), Value::int64(3));
    }

    #[test]
    fn test_typeof_over_mixed_vector() {
        let ctx = Arc::new(TypeContext::new());
        let f = lookup(&ctx, "typeof", vec![Box::new(This)]).unwrap();
        let v = from_values(&[Value::int64(1), Value::string("a")]);
        let out = f.eval(&v);
        assert_eq!(out.value(0).to_string(), "<int64>");
        assert_eq!(out.value(1).to_string(), "<string>");
    }
}
