mod common;

use std::thread;
use std::time::Duration;

use common::{init_test_logging, rec, sorted_text, text};
use pretty_assertions::assert_eq;
use sluice::dag::{AggSpec, Assignment, BinaryOp, Expr, JoinSpec, JoinStyle, Op, SortExpr, path};
use sluice::value::build;
use sluice::types::Primitive;
use sluice::{Batch, Error, Program, Puller, RuntimeContext, RuntimeOptions, Value};

fn program(main: Vec<Op>) -> Program {
    Program { funcs: vec![], main }
}

fn int(n: i64) -> Expr {
    Expr::lit(Value::int64(n))
}

#[test]
fn filter_even_records() {
    let rctx = RuntimeContext::default();
    let input = (0..6).map(|a| rec(&rctx.types, &[("a", Value::int64(a))])).collect();
    let p = program(vec![
        Op::Values(input),
        Op::Filter(Expr::binary(
            BinaryOp::Eq,
            Expr::binary(BinaryOp::Mod, Expr::path("a"), int(2)),
            int(0),
        )),
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    assert_eq!(text(&out["main"]), vec!["{a:0}", "{a:2}", "{a:4}"]);
}

#[test]
fn put_evolves_each_input_type() {
    let rctx = RuntimeContext::default();
    let input = vec![
        rec(&rctx.types, &[("a", Value::int64(1))]),
        rec(&rctx.types, &[("a", Value::float64(1.5))]),
        rec(&rctx.types, &[("a", Value::int64(2)), ("c", Value::string("x"))]),
        Value::int64(7),
    ];
    let p = program(vec![
        Op::Values(input),
        Op::Put(vec![Assignment::new("b", Expr::binary(BinaryOp::Mul, Expr::path("a"), int(2)))]),
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    assert_eq!(
        text(&out["main"]),
        vec![
            "{a:1,b:2}",
            "{a:1.5,b:3.0}",
            "{a:2,c:\"x\",b:4}",
            "error({message:\"put: not a record\",on:7})",
        ]
    );
}

#[test]
fn unnest_arrays() {
    let rctx = RuntimeContext::default();
    let ctx = rctx.types.clone();
    let xs = |vals: &[i64]| {
        let vals: Vec<Value> = vals.iter().copied().map(Value::int64).collect();
        build::array(&ctx, &vals)
    };
    let input = vec![
        rec(&ctx, &[("xs", xs(&[1, 2]))]),
        rec(&ctx, &[("xs", xs(&[]))]),
        rec(&ctx, &[("xs", xs(&[3]))]),
    ];
    let p = program(vec![
        Op::Values(input),
        Op::Unnest {
            expr: Expr::path("xs"),
            body: None,
        },
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    assert_eq!(text(&out["main"]), vec!["1", "2", "3"]);
}

#[test]
fn aggregate_sum_by_key() {
    let rctx = RuntimeContext::default();
    let row = |k: &str, v: i64| rec(&rctx.types, &[("k", Value::string(k)), ("v", Value::int64(v))]);
    let input = vec![row("x", 1), row("y", 10), row("x", 2), row("y", 5), row("z", 0)];
    let p = program(vec![
        Op::Values(input),
        Op::Aggregate {
            keys: vec![Assignment::new("k", Expr::path("k"))],
            aggs: vec![
                AggSpec {
                    lhs: path("sum"),
                    name: "sum".into(),
                    distinct: false,
                    arg: Some(Expr::path("v")),
                    filter: None,
                },
                AggSpec {
                    lhs: path("n"),
                    name: "count".into(),
                    distinct: false,
                    arg: None,
                    filter: None,
                },
            ],
            partials_in: false,
            partials_out: false,
            input_sort_dir: 0,
        },
    ]);
    let out = sluice::run_with(rctx.clone(), &p, vec![]).unwrap();
    assert_eq!(
        text(&out["main"]),
        vec![
            "{k:\"x\",sum:3,n:2}",
            "{k:\"y\",sum:15,n:2}",
            "{k:\"z\",sum:0,n:1}",
        ]
    );
}

#[test]
fn fuse_heterogeneous_records() {
    let rctx = RuntimeContext::default();
    let ctx = rctx.types.clone();
    let input = vec![
        rec(&ctx, &[("a", Value::int64(1))]),
        rec(&ctx, &[("b", Value::string("x"))]),
        rec(&ctx, &[("a", Value::int64(2)), ("b", Value::string("y"))]),
    ];
    let p = program(vec![Op::Values(input), Op::Fuse]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    let main = &out["main"];
    assert_eq!(text(main), vec!["{a:1}", "{b:\"x\"}", "{a:2,b:\"y\"}"]);
    assert_eq!(main[0].ty(), main[1].ty());
    assert_eq!(main[1].ty(), main[2].ty());
    assert_eq!(main[0].ty().to_string(), "{a:int64?,b:string?}");
}

#[test]
fn sort_spills_to_disk_and_cleans_up() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let opts = RuntimeOptions {
        batch_size: 3,
        sort_mem_max_bytes: 16,
        spill_dir: Some(dir.path().to_path_buf()),
        ..RuntimeOptions::default()
    };
    let input: Vec<Value> = (0..40).map(|i| Value::int64((i * 17) % 40)).collect();
    let p = program(vec![
        Op::Values(input),
        Op::Sort {
            keys: vec![SortExpr {
                key: Expr::This,
                reverse: true,
            }],
            reverse: false,
            nulls_first: false,
        },
    ]);
    let out = sluice::run(&p, opts).unwrap();
    let got: Vec<i64> = out["main"].iter().filter_map(Value::as_i64).collect();
    assert_eq!(got, (0..40).rev().collect::<Vec<_>>());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn cut_keeps_error_inputs() {
    let rctx = RuntimeContext::default();
    let input = vec![
        rctx.types.new_error("boom"),
        rec(&rctx.types, &[("b", Value::int64(1)), ("c", Value::int64(2))]),
    ];
    let p = program(vec![
        Op::Values(input),
        Op::Cut(vec![Assignment::new("b", Expr::path("b"))]),
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    assert_eq!(text(&out["main"]), vec!["error(\"boom\")", "{b:1}"]);
}

#[test]
fn any_ignores_errors() {
    let rctx = RuntimeContext::default();
    let input = vec![rctx.types.new_error("boom"), Value::int64(1)];
    let p = program(vec![
        Op::Values(input),
        Op::Aggregate {
            keys: vec![],
            aggs: vec![AggSpec {
                lhs: path("a"),
                name: "any".into(),
                distinct: false,
                arg: Some(Expr::This),
                filter: None,
            }],
            partials_in: false,
            partials_out: false,
            input_sort_dir: 0,
        },
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    assert_eq!(text(&out["main"]), vec!["{a:1}"]);
}

#[test]
fn join_matches_numeric_keys_across_widths() {
    let rctx = RuntimeContext::default();
    let ctx = rctx.types.clone();
    let left = vec![rec(&ctx, &[("id", Value::int(Primitive::Int32, 2))])];
    let right = vec![rec(&ctx, &[("id", Value::int64(2)), ("name", Value::string("two"))])];
    let p = program(vec![
        Op::Fork(vec![vec![Op::Values(left)], vec![Op::Values(right)]]),
        Op::Join(JoinSpec {
            style: JoinStyle::Inner,
            left_key: Expr::path("id"),
            right_key: Expr::path("id"),
            splices: vec![Assignment::new("name", Expr::path("name"))],
        }),
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    assert_eq!(text(&out["main"]), vec!["{id:2,name:\"two\"}"]);
}

fn join(style: JoinStyle) -> Vec<String> {
    let rctx = RuntimeContext::default();
    let ctx = rctx.types.clone();
    let left = (1..=4).map(|id| rec(&ctx, &[("id", Value::int64(id))])).collect();
    let right = vec![
        rec(&ctx, &[("id", Value::int64(2)), ("name", Value::string("two"))]),
        rec(&ctx, &[("id", Value::int64(4)), ("name", Value::string("four"))]),
    ];
    let splices = match style {
        JoinStyle::Anti => vec![],
        _ => vec![Assignment::new("name", Expr::path("name"))],
    };
    let p = program(vec![
        Op::Fork(vec![vec![Op::Values(left)], vec![Op::Values(right)]]),
        Op::Join(JoinSpec {
            style,
            left_key: Expr::path("id"),
            right_key: Expr::path("id"),
            splices,
        }),
    ]);
    let out = sluice::run_with(rctx, &p, vec![]).unwrap();
    sorted_text(&out["main"])
}

#[test]
fn join_inner() {
    assert_eq!(join(JoinStyle::Inner), vec!["{id:2,name:\"two\"}", "{id:4,name:\"four\"}"]);
}

#[test]
fn join_anti() {
    assert_eq!(join(JoinStyle::Anti), vec!["{id:1}", "{id:3}"]);
}

/// Emits one batch, then blocks until the query is cancelled.
struct Stall {
    rctx: RuntimeContext,
    sent: bool,
}

impl Puller for Stall {
    fn pull(&mut self, done: bool) -> sluice::Result<Option<Batch>> {
        if done {
            return Ok(None);
        }
        if !self.sent {
            self.sent = true;
            return Ok(Some(Batch::from_values(&[Value::int64(1)])));
        }
        let _ = self.rctx.done().recv();
        Err(Error::Cancelled)
    }
}

#[test]
fn cancel_unblocks_combine() {
    let rctx = RuntimeContext::default();
    let stall: Box<dyn Puller> = Box::new(Stall {
        rctx: rctx.clone(),
        sent: false,
    });
    let p = program(vec![
        Op::Fork(vec![vec![Op::Source("slow".into())], vec![Op::Values(vec![Value::int64(2)])]]),
        Op::Combine,
    ]);
    let canceller = rctx.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        canceller.cancel();
    });
    let err = sluice::run_with(rctx, &p, vec![("slow".into(), stall)]).unwrap_err();
    assert!(err.is_cancelled(), "unexpected error: {}", err);
    handle.join().unwrap();
}
