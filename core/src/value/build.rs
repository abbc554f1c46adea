//! Constructors for composite values.

use hashbrown::HashSet;

use crate::codec::{Builder, normalize_map, normalize_set};
use crate::error::Result;
use crate::types::{Field, Type, TypeContext};

use super::Value;

/// Builds a record from `(name, value)` pairs. Every field is required.
pub fn record(ctx: &TypeContext, fields: Vec<(String, Value)>) -> Result<Value> {
    let ty = ctx.lookup_type_record(
        fields
            .iter()
            .map(|(name, val)| Field::new(name.clone(), val.ty().clone()))
            .collect(),
    )?;
    let mut b = Builder::new();
    for (_, val) in &fields {
        val.append_to(&mut b);
    }
    Ok(Value::new(ty, Some(b.into_bytes())))
}

/// Encodes a record of type `ty` from its field values in type order.
/// `None` marks an absent optional field.
///
/// # Panics
/// If a required field is `None` or the arity does not match.
pub fn record_of(ty: &Type, vals: &[Option<Value>]) -> Value {
    let fields = ty
        .record_fields()
        .unwrap_or_else(|| panic!("record_of on non-record type {}", ty));
    assert_eq!(fields.len(), vals.len(), "record arity mismatch for {}", ty);
    let mut b = Builder::new();
    b.begin_container();
    let mut nones = Vec::new();
    let mut opt = 0;
    for (field, val) in fields.iter().zip(vals) {
        match val {
            Some(val) => val.append_to(&mut b),
            None => {
                assert!(field.is_opt(), "required field {} is absent", field.name);
                nones.push(opt);
            }
        }
        if field.is_opt() {
            opt += 1;
        }
    }
    b.end_container_with_nones(ty.opt_count(), &nones);
    Value::new(ty.clone(), b.take_value())
}

/// The element type for a collection holding values of `types`: the type
/// itself when homogeneous, otherwise a union of the distinct types.
pub fn unify_types(ctx: &TypeContext, types: impl IntoIterator<Item = Type>) -> Type {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for ty in types {
        if seen.insert(ty.clone()) {
            unique.push(ty);
        }
    }
    match unique.len() {
        0 => Type::null(),
        1 => unique.pop().unwrap_or_else(Type::null),
        _ => ctx.lookup_type_union(unique),
    }
}

/// Appends `val` as an element of type `elem`, tagging it when `elem` is a
/// union the value is a member of.
pub(crate) fn append_as(b: &mut Builder, elem: &Type, val: &Value) {
    if val.ty() != elem && elem.union_members().is_some() && !val.is_null() {
        Value::union(elem, val).append_to(b);
    } else {
        b.append_body(val.bytes(), elem.is_container());
    }
}

fn collection_body(ctx: &TypeContext, elems: &[Value]) -> (Type, Vec<u8>) {
    let elem = unify_types(ctx, elems.iter().map(|v| v.ty().clone()));
    let mut b = Builder::new();
    for val in elems {
        append_as(&mut b, &elem, val);
    }
    (elem, b.into_bytes())
}

pub fn array(ctx: &TypeContext, elems: &[Value]) -> Value {
    let (elem, body) = collection_body(ctx, elems);
    Value::new(ctx.lookup_type_array(&elem), Some(body))
}

/// Builds a set; elements are sorted and deduplicated.
pub fn set(ctx: &TypeContext, elems: &[Value]) -> Value {
    let (elem, body) = collection_body(ctx, elems);
    Value::new(ctx.lookup_type_set(&elem), Some(normalize_set(&body)))
}

/// Builds a map; pairs are sorted by key and the last duplicate key wins.
pub fn map(ctx: &TypeContext, pairs: &[(Value, Value)]) -> Value {
    let key = unify_types(ctx, pairs.iter().map(|(k, _)| k.ty().clone()));
    let val = unify_types(ctx, pairs.iter().map(|(_, v)| v.ty().clone()));
    let mut b = Builder::new();
    for (k, v) in pairs {
        append_as(&mut b, &key, k);
        append_as(&mut b, &val, v);
    }
    let body = normalize_map(&b.into_bytes());
    Value::new(ctx.lookup_type_map(&key, &val), Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_heterogeneous_array_is_union() {
        let ctx = TypeContext::new();
        let arr = array(&ctx, &[Value::int64(1), Value::string("a")]);
        assert_eq!(arr.ty().to_string(), "[(int64|string)]");
        let elems = arr.elements().unwrap();
        assert_eq!(elems[0].under(), Value::int64(1));
        assert_eq!(elems[1].under(), Value::string("a"));
    }

    #[test]
    fn test_set_is_canonical() {
        let ctx = TypeContext::new();
        let s = set(&ctx, &[Value::int64(3), Value::int64(1), Value::int64(3)]);
        assert_eq!(s.to_string(), "|[1,3]|");
    }

    #[test]
    fn test_record_of_with_nones() {
        let ctx = TypeContext::new();
        let ty = ctx
            .lookup_type_record(vec![
                Field::optional("a", Type::int64()),
                Field::optional("b", Type::string()),
            ])
            .unwrap();
        let v = record_of(&ty, &[None, Some(Value::string("x"))]);
        assert_eq!(v.deref("a"), None);
        assert_eq!(v.deref("b"), Some(Value::string("x")));
        assert_eq!(v.to_string(), "{b:\"x\"}");
    }
}
