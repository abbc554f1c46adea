//! Hash join.
//!
//! Both parents run in parallel. Whichever reaches end of stream first
//! becomes the build side and is hashed by its key; the other side then
//! probes the table as its batches arrive. Build rows remember whether
//! they matched so left and anti joins can emit unmatched left rows when
//! the left side was the one hashed.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::debug;

use crate::error::Result;
use crate::expr::{Evaluator, Resetters};
use crate::runtime::{Batch, Event, Mux, Puller, RuntimeContext};
use crate::value::{Value, hash_key};
use crate::vector::{Any, Vector, from_values};

use super::put::put_values;

const LEFT: usize = 0;
const RIGHT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    /// Only left rows with a matching right row.
    Inner,
    /// Every left row; unmatched ones pass through as they are.
    Left,
    /// Only left rows without a matching right row.
    Anti,
}

/// Splices right-row fields into a left row: `lhs := rhs` with `rhs`
/// evaluated over the right row.
pub struct Splice {
    pub lhs: Vec<String>,
    pub rhs: Box<dyn Evaluator>,
}

struct Table {
    build: usize,
    rows: Vec<Value>,
    /// Splice values of each row when the build side is the right side.
    spliced: Vec<Vec<Value>>,
    /// Build rows by `hash_key` of their join key.
    index: HashMap<Value, Vec<usize>>,
    matched: Vec<bool>,
}

enum Phase {
    Start,
    Probing(Table, VecDeque<Batch>),
    Finished,
}

pub struct Join {
    rctx: RuntimeContext,
    mux: Mux,
    keys: [Box<dyn Evaluator>; 2],
    style: JoinStyle,
    splices: Vec<Splice>,
    resetters: Resetters,
    phase: Phase,
}

impl Join {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rctx: RuntimeContext,
        left: Box<dyn Puller>,
        right: Box<dyn Puller>,
        left_key: Box<dyn Evaluator>,
        right_key: Box<dyn Evaluator>,
        style: JoinStyle,
        splices: Vec<Splice>,
        resetters: Resetters,
    ) -> Result<Self> {
        let mux = Mux::new(rctx.clone(), vec![left, right])?;
        Ok(Join {
            rctx,
            mux,
            keys: [left_key, right_key],
            style,
            splices,
            resetters,
            phase: Phase::Start,
        })
    }

    fn splice_values(&self, right: &Vector) -> Vec<Vec<Value>> {
        let cols: Vec<Vector> = self.splices.iter().map(|s| s.rhs.eval(right)).collect();
        (0..right.len())
            .map(|slot| cols.iter().map(|c| c.value(slot)).collect())
            .collect()
    }

    fn splice(&self, left: &Value, rhs: &[Value]) -> Value {
        if self.splices.is_empty() {
            return left.clone();
        }
        let ctx = &self.rctx.types;
        let left = left.under();
        if !left.ty().is_record() {
            return ctx.wrap_error("join: not a record", &left);
        }
        let paths: Vec<Vec<String>> = self.splices.iter().map(|s| s.lhs.clone()).collect();
        put_values(ctx, Some(&left), &paths, rhs).unwrap_or_else(|err| ctx.new_error(err))
    }

    /// Races the parents until one ends, then hashes that one.
    fn build(&mut self) -> Result<Option<(Table, VecDeque<Batch>)>> {
        let mut bufs: [Vec<Batch>; 2] = [Vec::new(), Vec::new()];
        let build = loop {
            match self.mux.next_event()? {
                Some(Event::Batch(label, batch)) => bufs[label].push(batch),
                Some(Event::Eoc(label)) => break label,
                None => return Ok(None),
            }
        };
        debug!(build = if build == LEFT { "left" } else { "right" }, "join: build side selected");
        let rows: Vec<Value> = bufs[build].iter().flat_map(Batch::values).collect();
        let vector = from_values(&rows);
        let keys = self.keys[build].eval(&vector);
        let mut index: HashMap<Value, Vec<usize>> = HashMap::new();
        for slot in 0..keys.len() {
            let key = keys.value(slot);
            if !key.is_missing() {
                index.entry(hash_key(&key)).or_default().push(slot as usize);
            }
        }
        let spliced = if build == RIGHT {
            self.splice_values(&vector)
        } else {
            Vec::new()
        };
        let table = Table {
            build,
            matched: vec![false; rows.len()],
            rows,
            spliced,
            index,
        };
        let probe = std::mem::take(&mut bufs[1 - build]);
        Ok(Some((table, probe.into())))
    }

    fn probe(&self, table: &mut Table, batch: &Batch) -> Vec<Value> {
        let probe = batch.vector();
        let keys = self.keys[1 - table.build].eval(probe);
        let mut out = Vec::new();
        if table.build == RIGHT {
            for slot in 0..probe.len() {
                let left = probe.value(slot);
                let key = keys.value(slot);
                let matches = table.index.get(&hash_key(&key)).filter(|_| !key.is_missing());
                match matches {
                    Some(rows) => {
                        for &i in rows {
                            table.matched[i] = true;
                        }
                        if self.style != JoinStyle::Anti {
                            for &i in rows {
                                out.push(self.splice(&left, &table.spliced[i]));
                            }
                        }
                    }
                    None if self.style != JoinStyle::Inner => out.push(left),
                    None => {}
                }
            }
            return out;
        }
        let spliced = self.splice_values(probe);
        for slot in 0..probe.len() {
            let key = keys.value(slot);
            if key.is_missing() {
                continue;
            }
            let Some(rows) = table.index.get(&hash_key(&key)) else {
                continue;
            };
            for &i in rows {
                table.matched[i] = true;
                if self.style != JoinStyle::Anti {
                    out.push(self.splice(&table.rows[i], &spliced[slot as usize]));
                }
            }
        }
        out
    }

    /// Left rows that never matched, when the left side was hashed.
    fn unmatched(&self, table: &Table) -> Vec<Value> {
        if table.build != LEFT || self.style == JoinStyle::Inner {
            return Vec::new();
        }
        table
            .rows
            .iter()
            .zip(&table.matched)
            .filter(|(_, m)| !**m)
            .map(|(row, _)| row.clone())
            .collect()
    }
}

impl Puller for Join {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.phase = Phase::Start;
            return self.mux.pull_labeled(true).map(|_| None);
        }
        loop {
            match std::mem::replace(&mut self.phase, Phase::Start) {
                Phase::Start => match self.build()? {
                    Some((table, pending)) => self.phase = Phase::Probing(table, pending),
                    None => self.phase = Phase::Finished,
                },
                Phase::Probing(mut table, mut pending) => {
                    if let Some(batch) = pending.pop_front() {
                        let out = self.probe(&mut table, &batch);
                        self.phase = Phase::Probing(table, pending);
                        if !out.is_empty() {
                            return Ok(Some(Batch::from_values(&out)));
                        }
                        continue;
                    }
                    match self.mux.next_event()? {
                        Some(Event::Batch(_, batch)) => {
                            pending.push_back(batch);
                            self.phase = Phase::Probing(table, pending);
                        }
                        Some(Event::Eoc(_)) => self.phase = Phase::Probing(table, pending),
                        None => {
                            let out = self.unmatched(&table);
                            self.phase = Phase::Finished;
                            if !out.is_empty() {
                                return Ok(Some(Batch::from_values(&out)));
                            }
                        }
                    }
                }
                Phase::Finished => {
                    self.resetters.reset();
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Dot;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::types::{Primitive, TypeContext};
    use crate::value::build;
    use pretty_assertions::assert_eq;

    fn rec(ctx: &TypeContext, fields: Vec<(&str, Value)>) -> Value {
        build::record(ctx, fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect()).unwrap()
    }

    fn run(style: JoinStyle, splice: bool) -> Vec<String> {
        let rctx = RuntimeContext::default();
        let ctx = rctx.types.clone();
        let left = vec![
            rec(&ctx, vec![("id", Value::int64(1)), ("l", Value::string("a"))]),
            rec(&ctx, vec![("id", Value::int64(2)), ("l", Value::string("b"))]),
            rec(&ctx, vec![("id", Value::int64(3)), ("l", Value::string("c"))]),
        ];
        let right = vec![
            rec(&ctx, vec![("rid", Value::int64(1)), ("r", Value::string("x"))]),
            rec(&ctx, vec![("rid", Value::int64(3)), ("r", Value::string("y"))]),
            rec(&ctx, vec![("rid", Value::int64(3)), ("r", Value::string("z"))]),
        ];
        let splices = if splice {
            vec![Splice {
                lhs: vec!["r".into()],
                rhs: Box::new(Dot::field(ctx.clone(), "r")),
            }]
        } else {
            vec![]
        };
        let mut join = Join::new(
            rctx,
            Box::new(ValuesScan::new(left, 1)),
            Box::new(ValuesScan::new(right, 1)),
            Box::new(Dot::field(ctx.clone(), "id")),
            Box::new(Dot::field(ctx.clone(), "rid")),
            style,
            splices,
            Resetters::new(),
        )
        .unwrap();
        let mut out: Vec<String> = collect_values(&mut join)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_inner_join() {
        assert_eq!(
            run(JoinStyle::Inner, true),
            vec![
                "{id:1,l:\"a\",r:\"x\"}",
                "{id:3,l:\"c\",r:\"y\"}",
                "{id:3,l:\"c\",r:\"z\"}",
            ]
        );
    }

    #[test]
    fn test_left_join() {
        assert_eq!(
            run(JoinStyle::Left, true),
            vec![
                "{id:1,l:\"a\",r:\"x\"}",
                "{id:2,l:\"b\"}",
                "{id:3,l:\"c\",r:\"y\"}",
                "{id:3,l:\"c\",r:\"z\"}",
            ]
        );
    }

    #[test]
    fn test_anti_join() {
        assert_eq!(run(JoinStyle::Anti, false), vec!["{id:2,l:\"b\"}"]);
    }

    #[test]
    fn test_join_keys_compare_across_widths() {
        let rctx = RuntimeContext::default();
        let ctx = rctx.types.clone();
        let left = vec![
            rec(&ctx, vec![("id", Value::int(Primitive::Int32, 2))]),
            rec(&ctx, vec![("id", Value::uint64(3))]),
        ];
        let right = vec![
            rec(&ctx, vec![("id", Value::int64(2)), ("name", Value::string("two"))]),
            rec(&ctx, vec![("id", Value::float64(3.0)), ("name", Value::string("three"))]),
        ];
        let mut join = Join::new(
            rctx,
            Box::new(ValuesScan::new(left, 1)),
            Box::new(ValuesScan::new(right, 1)),
            Box::new(Dot::field(ctx.clone(), "id")),
            Box::new(Dot::field(ctx.clone(), "id")),
            JoinStyle::Inner,
            vec![Splice {
                lhs: vec!["name".into()],
                rhs: Box::new(Dot::field(ctx.clone(), "name")),
            }],
            Resetters::new(),
        )
        .unwrap();
        let mut out: Vec<String> = collect_values(&mut join)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        out.sort();
        assert_eq!(out, vec!["{id:2,name:\"two\"}", "{id:3,name:\"three\"}"]);
    }
}
