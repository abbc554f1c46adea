//! Sluice - a vectorized, pull-based dataflow runtime for self-describing
//! values
//!
//! # Overview
//!
//! A query is a [`Program`]: a graph of operators (filter, put, sort,
//! aggregate, join, ...) over streams of typed values. The
//! [`Builder`] turns a program into [`Puller`]s, one per named output,
//! and each pull returns the next [`Batch`] of values.
//!
//! # Quick Start
//!
//! ```ignore
//! use sluice::dag::{Assignment, BinaryOp, Expr, Op};
//! use sluice::{Program, RuntimeOptions, Value};
//!
//! let program = Program {
//!     funcs: vec![],
//!     main: vec![
//!         Op::Values((0..10).map(Value::int64).collect()),
//!         Op::Filter(Expr::binary(BinaryOp::Gt, Expr::This, Expr::lit(Value::int64(5)))),
//!     ],
//! };
//! let outputs = sluice::run(&program, RuntimeOptions::default())?;
//! assert_eq!(outputs["main"].len(), 4);
//! ```

use std::collections::HashMap;

pub use sluice_core::*;
pub use sluice_core::runtime::dag;

/// Builds `program` and drains every output, returning their values by
/// name. Outputs are drained one after another on the calling thread.
pub fn run(program: &Program, options: RuntimeOptions) -> Result<HashMap<String, Vec<Value>>> {
    run_with(RuntimeContext::new(options), program, Vec::new())
}

/// Like [`run`], with named sources and an existing context.
pub fn run_with(
    rctx: RuntimeContext,
    program: &Program,
    sources: Vec<(String, Box<dyn Puller>)>,
) -> Result<HashMap<String, Vec<Value>>> {
    let builder = sources
        .into_iter()
        .fold(Builder::new(rctx), |b, (name, source)| b.with_source(name, source));
    let outputs = builder.build(program)?;
    let mut results = HashMap::with_capacity(outputs.len());
    for (name, mut output) in outputs {
        let vals = collect_values(&mut output)?;
        results.insert(name, vals);
    }
    Ok(results)
}
