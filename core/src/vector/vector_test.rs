use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::types::{Field, TypeContext};
use crate::value::{Value, build};

fn ints(vals: &[i64]) -> Vector {
    from_values(&vals.iter().map(|v| Value::int64(*v)).collect::<Vec<_>>())
}

#[test]
fn test_from_values_single_type_is_flat() {
    let v = ints(&[1, 2, 3]);
    assert_eq!(Form::of(&v), Form::Flat);
    assert_eq!(Kind::of(&v), Kind::Int);
    assert_eq!(v.values(), vec![Value::int64(1), Value::int64(2), Value::int64(3)]);
}

#[test]
fn test_from_values_mixed_types_is_dynamic() {
    let vals = vec![
        Value::int64(1),
        Value::string("a"),
        Value::int64(2),
        Value::null(),
    ];
    let v = from_values(&vals);
    assert!(v.is_dynamic());
    assert_eq!(v.len(), 4);
    assert_eq!(v.values(), vals);
    assert!(v.is_null(3));
    assert_eq!(v.type_of(1), Type::string());
}

#[test]
fn test_from_values_empty() {
    assert_eq!(from_values(&[]).len(), 0);
}

#[test]
fn test_pick_and_reverse_pick() {
    let v = ints(&[10, 20, 30, 40]);
    let picked = pick(&v, &[3, 0]);
    assert_eq!(Form::of(&picked), Form::View);
    assert_eq!(picked.values(), vec![Value::int64(40), Value::int64(10)]);
    let rest = reverse_pick(&v, &[0, 2]);
    assert_eq!(rest.values(), vec![Value::int64(20), Value::int64(40)]);
    // Identity picks return the vector unchanged.
    assert_eq!(Form::of(&pick(&v, &[0, 1, 2, 3])), Form::Flat);
}

#[test]
fn test_pick_of_view_composes() {
    let v = ints(&[10, 20, 30]);
    let view = pick(&v, &[2, 1, 0]);
    let again = pick(&view, &[0, 0]);
    match &again {
        Vector::View(view) => assert!(matches!(view.base, Vector::Int(_))),
        other => panic!("expected view, got {:?}", Form::of(other)),
    }
    assert_eq!(again.values(), vec![Value::int64(30), Value::int64(30)]);
}

#[test]
fn test_pick_dynamic_keeps_tags() {
    let v = from_values(&[
        Value::int64(1),
        Value::string("a"),
        Value::int64(2),
        Value::string("b"),
    ]);
    let picked = pick(&v, &[3, 2]);
    assert_eq!(picked.values(), vec![Value::string("b"), Value::int64(2)]);
    let same = pick(&v, &[0, 2]);
    assert!(!same.is_dynamic());
}

#[test]
fn test_combine_same_type_is_flat() {
    let base = ints(&[1, 3]);
    let ins = ints(&[2, 4]);
    let out = combine(&base, &[1, 3], &ins);
    assert_eq!(Form::of(&out), Form::Flat);
    assert_eq!(
        out.values(),
        vec![Value::int64(1), Value::int64(2), Value::int64(3), Value::int64(4)]
    );
}

#[test]
fn test_combine_different_types_is_dynamic() {
    let base = ints(&[1, 3]);
    let ins = Vector::new_const(Value::string("x"), 1);
    let out = combine(&base, &[0], &ins);
    assert!(out.is_dynamic());
    assert_eq!(
        out.values(),
        vec![Value::string("x"), Value::int64(1), Value::int64(3)]
    );
}

#[test]
#[should_panic(expected = "combine: index and inserted lengths differ")]
fn test_combine_length_mismatch_panics() {
    combine(&ints(&[1]), &[0, 1], &ints(&[2]));
}

#[test]
fn test_apply_preserves_length_and_order() {
    let v = from_values(&[
        Value::int64(1),
        Value::string("a"),
        Value::int64(2),
        Value::float64(0.5),
        Value::string("b"),
    ]);
    let mut calls = 0;
    let out = apply(
        false,
        &mut |args: &[Vector]| {
            calls += 1;
            assert!(!args[0].is_dynamic());
            let kind = Kind::of(&args[0]);
            Vector::new_const(Value::string(&format!("{:?}", kind)), args[0].len())
        },
        &[v],
    );
    assert_eq!(calls, 3);
    assert_eq!(out.len(), 5);
    let got: Vec<String> = out
        .values()
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(got, vec!["Int", "String", "Int", "Float", "String"]);
}

#[test]
fn test_apply_groups_by_tag_tuple() {
    let a = from_values(&[Value::int64(1), Value::string("a"), Value::int64(2)]);
    let b = from_values(&[Value::int64(5), Value::int64(6), Value::string("z")]);
    let mut groups = Vec::new();
    apply(
        false,
        &mut |args: &[Vector]| {
            groups.push((Kind::of(&args[0]), Kind::of(&args[1]), args[0].len()));
            args[0].clone()
        },
        &[a, b],
    );
    groups.sort_by_key(|g| format!("{:?}", g));
    assert_eq!(
        groups,
        vec![
            (Kind::Int, Kind::Int, 1),
            (Kind::Int, Kind::String, 1),
            (Kind::String, Kind::Int, 1),
        ]
    );
}

#[test]
#[should_panic(expected = "apply: function changed vector length")]
fn test_apply_length_change_panics() {
    apply(false, &mut |_args: &[Vector]| Vector::Null(1), &[ints(&[1, 2])]);
}

#[test]
fn test_apply_rips_unions() {
    let ctx = TypeContext::new();
    let uty = ctx.lookup_type_union(vec![Type::int64(), Type::string()]);
    let vals = vec![
        Value::union(&uty, &Value::int64(7)),
        Value::union(&uty, &Value::string("s")),
    ];
    let v = from_values(&vals);
    assert!(matches!(v, Vector::Union(_)));
    assert_eq!(v.values(), vals);
    let mut kinds = Vec::new();
    apply(
        true,
        &mut |args: &[Vector]| {
            kinds.push(Kind::of(&args[0]));
            args[0].clone()
        },
        &[v.clone()],
    );
    kinds.sort_by_key(|k| *k as u8);
    assert_eq!(kinds, vec![Kind::Int, Kind::String]);
    let mut whole = Vec::new();
    apply(
        false,
        &mut |args: &[Vector]| {
            whole.push(Kind::of(&args[0]));
            args[0].clone()
        },
        &[v],
    );
    assert_eq!(whole, vec![Kind::Union]);
}

#[test]
fn test_optional_fields_round_trip() {
    let ctx = TypeContext::new();
    let ty = ctx
        .lookup_type_record(vec![
            Field::new("a", Type::int64()),
            Field::optional("b", Type::string()),
        ])
        .unwrap();
    let vals = vec![
        build::record_of(&ty, &[Some(Value::int64(1)), None]),
        build::record_of(&ty, &[Some(Value::int64(2)), Some(Value::string("x"))]),
        build::record_of(&ty, &[Some(Value::int64(3)), None]),
        build::record_of(&ty, &[Some(Value::int64(4)), Some(Value::string("y"))]),
    ];
    let v = from_values(&vals);
    let Vector::Record(rec) = &v else {
        panic!("expected record vector");
    };
    match &rec.fields[1] {
        RecordField::Optional(opt) => {
            assert_eq!(opt.values.len(), 2);
            assert_eq!(opt.slot(0), None);
            assert_eq!(opt.slot(1), Some(0));
            assert_eq!(opt.slot(3), Some(1));
        }
        RecordField::Plain(_) => panic!("expected optional field"),
    }
    assert_eq!(v.values(), vals);
    assert_eq!(v.value(0).deref("b"), None);
}

#[test]
fn test_const_and_dict_values() {
    let c = Vector::new_const(Value::string("k"), 3);
    assert_eq!(c.len(), 3);
    assert_eq!(c.value(2), Value::string("k"));
    let d = Vector::Dict(Arc::new(Dict::new(ints(&[7, 8]), vec![1, 1, 0])));
    assert_eq!(
        d.values(),
        vec![Value::int64(8), Value::int64(8), Value::int64(7)]
    );
    assert_eq!(Form::of(&flatten(&d)), Form::Flat);
    assert_eq!(flatten(&d).values(), d.values());
}

#[test]
fn test_under_strips_named() {
    let ctx = TypeContext::new();
    let named = ctx.lookup_type_named("port", &Type::uint64()).unwrap();
    let vals = vec![
        Value::uint64(80).retype(named.clone()),
        Value::uint64(443).retype(named),
    ];
    let v = from_values(&vals);
    assert!(matches!(v, Vector::Named(_)));
    let u = under(&v);
    assert_eq!(Kind::of(&u), Kind::Uint);
    assert_eq!(u.values(), vec![Value::uint64(80), Value::uint64(443)]);
}

#[test]
fn test_error_slots() {
    let ctx = TypeContext::new();
    let v = from_values(&[Value::int64(1), ctx.missing(), Value::int64(2), ctx.quiet()]);
    assert_eq!(v.error_slots(), vec![1, 3]);
    assert!(!v.is_error());
}
