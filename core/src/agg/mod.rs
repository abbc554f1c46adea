//! Aggregate functions.
//!
//! An [`Aggregator`] folds values into running state. Aggregation can be
//! split across nodes: each node emits its state with
//! [`Aggregator::result_as_partial`] and a downstream node merges those
//! partials with [`Aggregator::consume_as_partial`].

mod any;
mod avg;
mod collect;
mod count;
mod distinct;
mod expr;
mod fuse;
mod logical;
mod math;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::TypeContext;
use crate::value::Value;

pub use expr::AggExpr;

pub trait Aggregator: Send {
    fn consume(&mut self, val: &Value);
    fn consume_as_partial(&mut self, partial: &Value);
    fn result(&mut self, ctx: &TypeContext) -> Value;
    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value;
}

/// Creates fresh aggregators of one kind, one per group.
pub type Pattern = Arc<dyn Fn() -> Box<dyn Aggregator> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct AggOptions {
    /// Byte limit of the `collect` and `union` state.
    pub collect_max_bytes: usize,
}

impl Default for AggOptions {
    fn default() -> Self {
        AggOptions {
            collect_max_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Resolves an aggregate function by name. With `distinct` the
/// aggregator only sees the first occurrence of each input value.
pub fn new_pattern(name: &str, distinct: bool, opts: AggOptions) -> Result<Pattern> {
    let pattern: Pattern = match name {
        "count" => Arc::new(|| Box::new(count::Count::default())),
        "dcount" => Arc::new(|| Box::new(count::DCount::default())),
        "sum" => Arc::new(|| Box::new(math::Math::new(math::MathOp::Sum))),
        "min" => Arc::new(|| Box::new(math::Math::new(math::MathOp::Min))),
        "max" => Arc::new(|| Box::new(math::Math::new(math::MathOp::Max))),
        "avg" => Arc::new(|| Box::new(avg::Avg::default())),
        "any" => Arc::new(|| Box::new(any::AnyAgg::default())),
        "and" => Arc::new(|| Box::new(logical::Logical::and())),
        "or" => Arc::new(|| Box::new(logical::Logical::or())),
        "fuse" => Arc::new(|| Box::new(fuse::FuseAgg::default())),
        "collect" => {
            let max = opts.collect_max_bytes;
            Arc::new(move || Box::new(collect::Collect::new(max)))
        }
        "union" => {
            let max = opts.collect_max_bytes;
            Arc::new(move || Box::new(collect::Union::new(max)))
        }
        _ => return Err(Error::compile(format!("unknown aggregation: {}", name))),
    };
    if !distinct {
        return Ok(pattern);
    }
    Ok(Arc::new(move || Box::new(distinct::Distinct::new(pattern()))))
}

/// Strips named types and skips nulls and errors, which every
/// aggregator but `fuse` ignores.
pub(crate) fn input(val: &Value) -> Option<Value> {
    let val = val.under();
    if val.is_null() || val.is_error() {
        return None;
    }
    Some(val)
}

#[cfg(test)]
mod agg_test;
