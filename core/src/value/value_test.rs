use crate::types::{Field, Primitive, Type, TypeContext};
use crate::value::{Value, build};
use pretty_assertions::assert_eq;

#[test]
fn test_int_accessors() {
    let v = Value::int(Primitive::Int8, -3);
    assert_eq!(v.as_i64(), Some(-3));
    assert_eq!(v.as_u64(), None);
    assert_eq!(Value::uint64(9).as_u64(), Some(9));
    assert_eq!(Value::time(5).as_i64(), Some(5));
}

#[test]
fn test_float_widths() {
    assert_eq!(Value::float(Primitive::Float32, 2.5).as_f64(), Some(2.5));
    assert_eq!(Value::float(Primitive::Float16, 0.5).as_f64(), Some(0.5));
}

#[test]
fn test_null_is_absent_bytes() {
    let v = Value::null_of(Type::int64());
    assert!(v.is_null());
    assert_eq!(v.as_i64(), None);
    assert!(!v.is_error());
}

#[test]
fn test_deref_and_entries() {
    let ctx = TypeContext::new();
    let inner = build::record(&ctx, vec![("b".into(), Value::int64(2))]).unwrap();
    let outer = build::record(&ctx, vec![("a".into(), inner)]).unwrap();
    assert_eq!(
        outer.deref_path(&["a".to_string(), "b".to_string()]),
        Some(Value::int64(2))
    );
    assert_eq!(outer.deref("z"), None);
    let entries = outer.record_entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0.name, "a");
}

#[test]
fn test_union_round_trip() {
    let ctx = TypeContext::new();
    let u = ctx.lookup_type_union(vec![Type::int64(), Type::string()]);
    let v = Value::union(&u, &Value::string("hi"));
    let (tag, member) = v.union_member().unwrap();
    assert_eq!(u.union_members().unwrap()[tag], Type::string());
    assert_eq!(member, Value::string("hi"));
    assert_eq!(v.under(), Value::string("hi"));
}

#[test]
fn test_named_under() {
    let ctx = TypeContext::new();
    let port = ctx.lookup_type_named("port", &Type::uint64()).unwrap();
    let v = Value::uint64(80).retype(port.clone());
    assert_eq!(v.ty(), &port);
    assert_eq!(v.under(), Value::uint64(80));
    assert_eq!(v.as_u64(), Some(80));
}

#[test]
fn test_error_payload() {
    let ctx = TypeContext::new();
    let err = ctx.error_value(&Value::int64(4));
    assert!(err.is_error());
    assert_eq!(err.error_payload(), Some(Value::int64(4)));
    assert!(!err.is_missing());
}

#[test]
fn test_map_entries() {
    let ctx = TypeContext::new();
    let m = build::map(
        &ctx,
        &[
            (Value::string("b"), Value::int64(2)),
            (Value::string("a"), Value::int64(1)),
        ],
    );
    let entries = m.map_entries().unwrap();
    assert_eq!(entries[0], (Value::string("a"), Value::int64(1)));
    assert_eq!(entries[1], (Value::string("b"), Value::int64(2)));
}

#[test]
fn test_type_value() {
    let ctx = TypeContext::new();
    let ty = ctx
        .lookup_type_record(vec![Field::new("x", Type::float64())])
        .unwrap();
    let tv = ctx.lookup_type_value(&ty);
    assert_eq!(tv.as_type(&ctx), Some(ty));
}
