use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::expr::{Compare, Dot, Literal};
use crate::types::Type;
use crate::value::build;
use crate::vector::from_values;
use crate::vector::kernels::Op;

fn run(name: &str, vals: &[Value]) -> Value {
    let ctx = TypeContext::new();
    let pattern = new_pattern(name, false, AggOptions::default()).unwrap();
    let mut agg = pattern();
    for v in vals {
        agg.consume(v);
    }
    agg.result(&ctx)
}

/// Aggregates `left` and `right` separately and merges their partials.
fn run_split(name: &str, left: &[Value], right: &[Value]) -> Value {
    let ctx = TypeContext::new();
    let pattern = new_pattern(name, false, AggOptions::default()).unwrap();
    let mut partials = Vec::new();
    for part in [left, right] {
        let mut agg = pattern();
        for v in part {
            agg.consume(v);
        }
        partials.push(agg.result_as_partial(&ctx));
    }
    let mut merged = pattern();
    for p in &partials {
        merged.consume_as_partial(p);
    }
    merged.result(&ctx)
}

#[test]
fn test_sum_promotes() {
    assert_eq!(run("sum", &[Value::int64(1), Value::int64(2)]), Value::int64(3));
    assert_eq!(
        run("sum", &[Value::int64(1), Value::float64(1.5)]),
        Value::float64(2.5)
    );
    assert_eq!(run("sum", &[]), Value::null_of(Type::int64()));
}

#[test]
fn test_numeric_aggs_skip_non_numbers() {
    let ctx = TypeContext::new();
    let vals = [
        Value::int64(5),
        Value::string("x"),
        Value::null_of(Type::int64()),
        ctx.missing(),
        Value::int64(-2),
    ];
    assert_eq!(run("sum", &vals), Value::int64(3));
    assert_eq!(run("min", &vals), Value::int64(-2));
    assert_eq!(run("max", &vals), Value::int64(5));
    assert_eq!(run("count", &vals), Value::uint64(3));
}

#[test]
fn test_avg() {
    let vals = [Value::int64(1), Value::int64(2), Value::int64(6)];
    assert_eq!(run("avg", &vals), Value::float64(3.0));
    assert_eq!(run("avg", &[]), Value::null_of(Type::float64()));
    let ctx = TypeContext::new();
    let mut agg = new_pattern("avg", false, AggOptions::default()).unwrap()();
    agg.consume(&Value::int64(4));
    assert_eq!(agg.result_as_partial(&ctx).to_string(), "{sum:4.0,count:1}");
}

#[test]
fn test_partials_merge_like_a_single_pass() {
    let left = [Value::int64(1), Value::int64(7), Value::int64(3)];
    let right = [Value::int64(7), Value::int64(10)];
    let all: Vec<Value> = left.iter().chain(right.iter()).cloned().collect();
    for name in ["count", "sum", "min", "max", "avg", "dcount", "and", "or", "union"] {
        assert_eq!(run_split(name, &left, &right), run(name, &all), "{}", name);
    }
    assert_eq!(run("dcount", &all), Value::uint64(4));
}

#[test]
fn test_collect_truncates_front() {
    let ctx = TypeContext::new();
    let opts = AggOptions {
        collect_max_bytes: 3,
    };
    let mut agg = new_pattern("collect", false, opts).unwrap()();
    for s in ["a", "b", "c", "d"] {
        agg.consume(&Value::string(s));
    }
    assert_eq!(agg.result(&ctx).to_string(), "[\"b\",\"c\",\"d\"]");
}

#[test]
fn test_union_and_distinct() {
    let vals = [Value::int64(2), Value::int64(1), Value::int64(2)];
    assert_eq!(run("union", &vals).to_string(), "|[1,2]|");
    let ctx = TypeContext::new();
    let mut agg = new_pattern("count", true, AggOptions::default()).unwrap()();
    for v in &vals {
        agg.consume(v);
    }
    assert_eq!(agg.result(&ctx), Value::uint64(2));
}

#[test]
fn test_logical_and_any() {
    let vals = [Value::bool(true), Value::int64(1), Value::bool(false)];
    assert_eq!(run("and", &vals), Value::bool(false));
    assert_eq!(run("or", &vals), Value::bool(true));
    assert_eq!(run("any", &[Value::null(), Value::int64(4)]), Value::int64(4));
}

#[test]
fn test_any_skips_errors() {
    let ctx = TypeContext::new();
    let vals = [ctx.new_error("boom"), Value::int64(1), Value::int64(2)];
    assert_eq!(run("any", &vals), Value::int64(1));
    assert_eq!(run("any", &[ctx.new_error("boom")]), Value::null());
}

#[test]
fn test_fuse_agg() {
    let ctx = TypeContext::new();
    let a = build::record(&ctx, vec![("a".into(), Value::int64(1))]).unwrap();
    let b = build::record(&ctx, vec![("b".into(), Value::string("x"))]).unwrap();
    let mut agg = new_pattern("fuse", false, AggOptions::default()).unwrap()();
    agg.consume(&a);
    agg.consume(&b);
    assert_eq!(agg.result(&ctx).to_string(), "<{a:int64?,b:string?}>");
}

#[test]
fn test_unknown_aggregation() {
    assert!(new_pattern("median", false, AggOptions::default()).is_err());
}

#[test]
fn test_agg_expr_filter() {
    let ctx = Arc::new(TypeContext::new());
    let rows: Vec<Value> = [1, 5, 9]
        .iter()
        .map(|v| build::record(&ctx, vec![("v".into(), Value::int64(*v))]).unwrap())
        .collect();
    let filter = Compare::new(
        ctx.clone(),
        Op::Gt,
        Box::new(Dot::field(ctx.clone(), "v")),
        Box::new(Literal(Value::int64(2))),
    );
    let expr = AggExpr::new(
        new_pattern("sum", false, AggOptions::default()).unwrap(),
        Some(Box::new(Dot::field(ctx.clone(), "v"))),
        Some(Box::new(filter)),
    );
    let mut agg = expr.new_aggregator();
    for v in expr.inputs(&from_values(&rows)).into_iter().flatten() {
        agg.consume(&v);
    }
    assert_eq!(agg.result(&ctx), Value::int64(14));
}
