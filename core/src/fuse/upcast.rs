//! Lossless conversion of a value into one of its supertypes.

use crate::codec::{Builder, normalize_map, normalize_set};
use crate::expr::cast_value;
use crate::types::{Type, TypeContext, TypeKind};
use crate::value::Value;
use crate::value::build::{append_as, record_of};

/// Converts `val` to `target`, which must subsume `val`'s type (as
/// produced by [`super::fuse`]). Fields the value lacks become absent
/// optional fields and values land in the matching union member.
pub fn upcast(ctx: &TypeContext, val: &Value, target: &Type) -> Value {
    if val.ty() == target {
        return val.clone();
    }
    if val.is_null() && !val.ty().is_union() {
        return Value::null_of(target.clone());
    }
    if let Some((_, member)) = val.union_member() {
        return upcast(ctx, &member, target);
    }
    match target.kind() {
        TypeKind::Named(_, inner) => {
            let val = match val.ty().kind() {
                TypeKind::Named(_, _) => val.under(),
                _ => val.clone(),
            };
            upcast(ctx, &val, inner).retype(target.clone())
        }
        TypeKind::Union(members) => {
            let member = members
                .iter()
                .find(|m| *m == val.ty())
                .or_else(|| members.iter().find(|m| m.kind_tag() == val.ty().kind_tag()))
                .cloned();
            match member {
                Some(member) => Value::union(target, &upcast(ctx, val, &member)),
                None => cast_value(ctx, val, target),
            }
        }
        TypeKind::Record(fields) => {
            if val.record_entries().is_none() {
                return cast_value(ctx, val, target);
            }
            let vals: Vec<Option<Value>> = fields
                .iter()
                .map(|f| match val.deref(&f.name) {
                    Some(v) => Some(upcast(ctx, &v, &f.ty)),
                    None if f.is_opt() => None,
                    None => Some(Value::null_of(f.ty.clone())),
                })
                .collect();
            record_of(target, &vals)
        }
        TypeKind::Array(inner) | TypeKind::Set(inner) => {
            let Some(elems) = val.elements() else {
                return cast_value(ctx, val, target);
            };
            let mut b = Builder::new();
            for elem in &elems {
                append_as(&mut b, inner, &upcast(ctx, elem, inner));
            }
            let body = b.into_bytes();
            let body = if matches!(target.kind(), TypeKind::Set(_)) {
                normalize_set(&body)
            } else {
                body
            };
            Value::new(target.clone(), Some(body))
        }
        TypeKind::Map(key, inner) => {
            let Some(entries) = val.map_entries() else {
                return cast_value(ctx, val, target);
            };
            let mut b = Builder::new();
            for (k, v) in &entries {
                append_as(&mut b, key, &upcast(ctx, k, key));
                append_as(&mut b, inner, &upcast(ctx, v, inner));
            }
            Value::new(target.clone(), Some(normalize_map(&b.into_bytes())))
        }
        TypeKind::Error(inner) => match val.error_payload() {
            Some(payload) => upcast(ctx, &payload, inner).retype(target.clone()),
            None => cast_value(ctx, val, target),
        },
        TypeKind::Enum(symbols) => match val.enum_symbol() {
            Some(sym) => match symbols.iter().position(|s| s == sym) {
                Some(i) => Value::enum_value(target.clone(), i as u64),
                None => cast_value(ctx, val, target),
            },
            None => cast_value(ctx, val, target),
        },
        TypeKind::Primitive(_) => cast_value(ctx, val, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuse::fuse;
    use crate::value::build;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_upcast_fills_optional_and_unions() {
        let ctx = TypeContext::new();
        let a = build::record(&ctx, vec![("a".into(), Value::int64(1))]).unwrap();
        let b = build::record(&ctx, vec![("a".into(), Value::string("x"))]).unwrap();
        let c = build::record(&ctx, vec![("c".into(), Value::bool(true))]).unwrap();
        let target = fuse(&ctx, &fuse(&ctx, a.ty(), b.ty()), c.ty());
        assert_eq!(target.to_string(), "{a:(int64|string)?,c:bool?}");
        for (val, text) in [(&a, "{a:1}"), (&b, "{a:\"x\"}"), (&c, "{c:true}")] {
            let up = upcast(&ctx, val, &target);
            assert_eq!(up.ty(), &target);
            assert_eq!(up.to_string(), text);
        }
    }

    #[test]
    fn test_upcast_array_elements() {
        let ctx = TypeContext::new();
        let ints = build::array(&ctx, &[Value::int64(1), Value::int64(2)]);
        let strs = build::array(&ctx, &[Value::string("a")]);
        let target = fuse(&ctx, ints.ty(), strs.ty());
        assert_eq!(upcast(&ctx, &ints, &target).to_string(), "[1,2]");
        assert_eq!(upcast(&ctx, &strs, &target).ty(), &target);
    }
}
