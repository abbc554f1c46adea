//! Grouped aggregation.
//!
//! Groups live in a hash table keyed by the values of the grouping keys
//! and are emitted in first-seen order. With no grouping keys there is a
//! single group that is emitted even when the input is empty.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::debug;

use crate::agg::{AggExpr, Aggregator};
use crate::error::Result;
use crate::expr::{Evaluator, Resetters};
use crate::runtime::{Batch, Puller, RuntimeContext};
use crate::value::Value;
use crate::vector::{Any, Vector, from_values};

use super::put::put_values;

/// A grouping key: output path and expression.
pub struct GroupKey {
    pub lhs: Vec<String>,
    pub expr: Box<dyn Evaluator>,
}

/// An aggregate: output path and call site.
pub struct AggAssignment {
    pub lhs: Vec<String>,
    pub agg: AggExpr,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    /// Inputs are partial states rather than values.
    pub partials_in: bool,
    /// Emit partial states rather than results.
    pub partials_out: bool,
    /// Nonzero when the input is sorted by the first key (ascending for a
    /// positive direction). Groups are then emitted as soon as that key
    /// changes.
    pub input_sort_dir: i32,
}

struct Group {
    keys: Vec<Value>,
    aggs: Vec<Box<dyn Aggregator>>,
}

pub struct Aggregate {
    rctx: RuntimeContext,
    parent: Box<dyn Puller>,
    keys: Vec<GroupKey>,
    aggs: Vec<AggAssignment>,
    opts: AggregateOptions,
    resetters: Resetters,
    index: HashMap<Vec<Value>, usize>,
    groups: Vec<Group>,
    last_primary: Option<Value>,
    out: VecDeque<Value>,
    eos: bool,
}

impl Aggregate {
    pub fn new(
        rctx: RuntimeContext,
        parent: Box<dyn Puller>,
        keys: Vec<GroupKey>,
        aggs: Vec<AggAssignment>,
        opts: AggregateOptions,
        resetters: Resetters,
    ) -> Self {
        Aggregate {
            rctx,
            parent,
            keys,
            aggs,
            opts,
            resetters,
            index: HashMap::new(),
            groups: Vec::new(),
            last_primary: None,
            out: VecDeque::new(),
            eos: false,
        }
    }

    fn group(&mut self, keys: Vec<Value>) -> &mut Group {
        let n = self.groups.len();
        let i = *self.index.entry(keys.clone()).or_insert(n);
        if i == n {
            let aggs = self.aggs.iter().map(|a| a.agg.new_aggregator()).collect();
            self.groups.push(Group { keys, aggs });
        }
        &mut self.groups[i]
    }

    fn consume(&mut self, batch: &Batch) {
        let this = batch.vector();
        let keys: Vec<Vector> = self.keys.iter().map(|k| k.expr.eval(this)).collect();
        let inputs: Vec<Vec<Option<Value>>> = self.aggs.iter().map(|a| a.agg.inputs(this)).collect();
        let partials_in = self.opts.partials_in;
        for slot in 0..this.len() {
            let keyvals: Vec<Value> = keys.iter().map(|k| k.value(slot)).collect();
            if keyvals.iter().any(Value::is_missing) {
                continue;
            }
            if self.opts.input_sort_dir != 0 {
                if let Some(primary) = keyvals.first() {
                    if self.last_primary.as_ref().is_some_and(|last| last != primary) {
                        self.flush();
                    }
                    self.last_primary = Some(primary.clone());
                }
            }
            let group = self.group(keyvals);
            for (agg, input) in group.aggs.iter_mut().zip(&inputs) {
                let Some(val) = &input[slot as usize] else {
                    continue;
                };
                if partials_in {
                    agg.consume_as_partial(val);
                } else {
                    agg.consume(val);
                }
            }
        }
    }

    /// Moves every group to the output queue.
    fn flush(&mut self) {
        self.index.clear();
        let groups = std::mem::take(&mut self.groups);
        for mut group in groups {
            let val = self.emit(&mut group);
            self.out.push_back(val);
        }
    }

    fn emit(&self, group: &mut Group) -> Value {
        let ctx = &self.rctx.types;
        let mut paths = Vec::with_capacity(self.keys.len() + self.aggs.len());
        let mut vals = Vec::with_capacity(paths.capacity());
        for (key, val) in self.keys.iter().zip(&group.keys) {
            paths.push(key.lhs.clone());
            vals.push(val.clone());
        }
        for (assign, agg) in self.aggs.iter().zip(group.aggs.iter_mut()) {
            paths.push(assign.lhs.clone());
            vals.push(if self.opts.partials_out {
                agg.result_as_partial(ctx)
            } else {
                agg.result(ctx)
            });
        }
        put_values(ctx, None, &paths, &vals).unwrap_or_else(|err| ctx.new_error(err))
    }

    fn reset(&mut self) {
        self.index.clear();
        self.groups.clear();
        self.last_primary = None;
        self.out.clear();
        self.eos = false;
    }

    fn next_batch(&mut self) -> Option<Batch> {
        let n = self.out.len().min(self.rctx.options.batch_size.max(1));
        if n == 0 {
            return None;
        }
        let vals: Vec<Value> = self.out.drain(..n).collect();
        Some(Batch::from_values(&vals))
    }
}

impl Puller for Aggregate {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.reset();
            return self.parent.pull(true);
        }
        loop {
            if let Some(batch) = self.next_batch() {
                return Ok(Some(batch));
            }
            if self.eos {
                self.reset();
                self.resetters.reset();
                return Ok(None);
            }
            match self.parent.pull(false)? {
                Some(batch) => self.consume(&batch),
                None => {
                    if self.keys.is_empty() && self.groups.is_empty() {
                        self.group(Vec::new());
                    }
                    debug!(groups = self.groups.len(), "aggregate: end of input");
                    self.flush();
                    self.eos = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agg::{AggOptions, new_pattern};
    use crate::expr::Dot;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::types::TypeContext;
    use crate::value::build;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn rec(ctx: &TypeContext, k: &str, v: i64) -> Value {
        build::record(
            ctx,
            vec![("k".into(), Value::string(k)), ("v".into(), Value::int64(v))],
        )
        .unwrap()
    }

    fn sum_by_k(rctx: &RuntimeContext, input: Vec<Value>, opts: AggregateOptions) -> Vec<String> {
        let ctx: &Arc<TypeContext> = &rctx.types;
        let pattern = new_pattern("sum", false, AggOptions::default()).unwrap();
        let agg = AggExpr::new(pattern, Some(Box::new(Dot::field(ctx.clone(), "v"))), None);
        let mut op = Aggregate::new(
            rctx.clone(),
            Box::new(ValuesScan::new(input, 2)),
            vec![GroupKey {
                lhs: vec!["k".into()],
                expr: Box::new(Dot::field(ctx.clone(), "k")),
            }],
            vec![AggAssignment {
                lhs: vec!["sum".into()],
                agg,
            }],
            opts,
            Resetters::new(),
        );
        collect_values(&mut op)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_sum_by_key() {
        let rctx = RuntimeContext::default();
        let ctx = &rctx.types;
        let input = vec![rec(ctx, "a", 1), rec(ctx, "b", 10), rec(ctx, "a", 2)];
        let out = sum_by_k(&rctx, input, AggregateOptions::default());
        assert_eq!(out, vec!["{k:\"a\",sum:3}", "{k:\"b\",sum:10}"]);
    }

    #[test]
    fn test_sorted_input_emits_early() {
        let rctx = RuntimeContext::default();
        let ctx = &rctx.types;
        let input = vec![rec(ctx, "a", 1), rec(ctx, "a", 2), rec(ctx, "b", 10), rec(ctx, "a", 5)];
        let opts = AggregateOptions {
            input_sort_dir: 1,
            ..AggregateOptions::default()
        };
        let out = sum_by_k(&rctx, input, opts);
        assert_eq!(
            out,
            vec!["{k:\"a\",sum:3}", "{k:\"b\",sum:10}", "{k:\"a\",sum:5}"]
        );
    }

    #[test]
    fn test_no_keys_always_emits() {
        let rctx = RuntimeContext::default();
        let pattern = new_pattern("count", false, AggOptions::default()).unwrap();
        let mut op = Aggregate::new(
            rctx.clone(),
            Box::new(ValuesScan::new(vec![], 2)),
            vec![],
            vec![AggAssignment {
                lhs: vec!["n".into()],
                agg: AggExpr::new(pattern, None, None),
            }],
            AggregateOptions::default(),
            Resetters::new(),
        );
        let out: Vec<String> = collect_values(&mut op)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(out, vec!["{n:0}"]);
    }

    #[test]
    fn test_partials_round_trip() {
        let rctx = RuntimeContext::default();
        let ctx = rctx.types.clone();
        let input: Vec<Value> = (1..=4).map(|i| build::record(&ctx, vec![("v".into(), Value::int64(i))]).unwrap()).collect();
        let avg = |arg: Option<Box<dyn Evaluator>>| {
            AggExpr::new(new_pattern("avg", false, AggOptions::default()).unwrap(), arg, None)
        };
        let mut partial = Vec::new();
        for chunk in input.chunks(2) {
            let mut op = Aggregate::new(
                rctx.clone(),
                Box::new(ValuesScan::new(chunk.to_vec(), 512)),
                vec![],
                vec![AggAssignment {
                    lhs: vec!["avg".into()],
                    agg: avg(Some(Box::new(Dot::field(ctx.clone(), "v")))),
                }],
                AggregateOptions {
                    partials_out: true,
                    ..AggregateOptions::default()
                },
                Resetters::new(),
            );
            partial.extend(collect_values(&mut op).unwrap());
        }
        let mut merge = Aggregate::new(
            rctx.clone(),
            Box::new(ValuesScan::new(partial, 512)),
            vec![],
            vec![AggAssignment {
                lhs: vec!["avg".into()],
                agg: avg(Some(Box::new(Dot::field(ctx.clone(), "avg")))),
            }],
            AggregateOptions {
                partials_in: true,
                ..AggregateOptions::default()
            },
            Resetters::new(),
        );
        let out: Vec<String> = collect_values(&mut merge)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(out, vec!["{avg:2.5}"]);
    }
}
