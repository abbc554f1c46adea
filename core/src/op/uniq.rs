use std::sync::Arc;

use hashbrown::HashSet;

use crate::error::Result;
use crate::expr::{Evaluator, Resetters};
use crate::runtime::{Batch, Puller};
use crate::types::TypeContext;
use crate::value::{Value, build};
use crate::vector::{Any, pick};

/// Collapses runs of equal adjacent values. With `count` each run is
/// emitted as `{value, count}`.
pub struct Uniq {
    ctx: Arc<TypeContext>,
    parent: Box<dyn Puller>,
    count: bool,
    last: Option<(Value, u64)>,
    eos: bool,
}

impl Uniq {
    pub fn new(ctx: Arc<TypeContext>, parent: Box<dyn Puller>, count: bool) -> Self {
        Uniq {
            ctx,
            parent,
            count,
            last: None,
            eos: false,
        }
    }

    fn emit(&self, val: Value, n: u64) -> Value {
        if !self.count {
            return val;
        }
        build::record(
            &self.ctx,
            vec![("value".into(), val), ("count".into(), Value::uint64(n))],
        )
        .unwrap_or_else(|err| self.ctx.new_error(err))
    }
}

impl Puller for Uniq {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.last = None;
            self.eos = false;
            return self.parent.pull(true);
        }
        if self.eos {
            self.eos = false;
            return Ok(None);
        }
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                let Some((val, n)) = self.last.take() else {
                    return Ok(None);
                };
                self.eos = true;
                return Ok(Some(Batch::from_values(&[self.emit(val, n)])));
            };
            let mut out = Vec::new();
            for val in batch.values() {
                if let Some((last, n)) = &mut self.last {
                    if *last == val {
                        *n += 1;
                        continue;
                    }
                }
                if let Some((prev, n)) = self.last.replace((val, 1)) {
                    out.push(self.emit(prev, n));
                }
            }
            if !out.is_empty() {
                return Ok(Some(Batch::from_values(&out)));
            }
        }
    }
}

/// Passes the first value seen for each distinct value of `key`.
pub struct Distinct {
    parent: Box<dyn Puller>,
    key: Box<dyn Evaluator>,
    seen: HashSet<Value>,
    resetters: Resetters,
}

impl Distinct {
    pub fn new(parent: Box<dyn Puller>, key: Box<dyn Evaluator>, resetters: Resetters) -> Self {
        Distinct {
            parent,
            key,
            seen: HashSet::new(),
            resetters,
        }
    }
}

impl Puller for Distinct {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.seen.clear();
            return self.parent.pull(true);
        }
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                self.seen.clear();
                self.resetters.reset();
                return Ok(None);
            };
            let keys = self.key.eval(batch.vector());
            let index: Vec<u32> = (0..keys.len())
                .filter(|&slot| self.seen.insert(keys.value(slot)))
                .collect();
            if !index.is_empty() {
                return Ok(Some(batch.derive(pick(batch.vector(), &index))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::This;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use pretty_assertions::assert_eq;

    fn scan(vals: &[i64]) -> Box<dyn Puller> {
        Box::new(ValuesScan::new(vals.iter().copied().map(Value::int64).collect(), 2))
    }

    #[test]
    fn test_uniq_across_batches() {
        let ctx = Arc::new(TypeContext::new());
        let mut uniq = Uniq::new(ctx.clone(), scan(&[1, 1, 1, 2, 1]), false);
        let out: Vec<i64> = collect_values(&mut uniq)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(out, vec![1, 2, 1]);
        let mut uniq = Uniq::new(ctx, scan(&[3, 3, 4]), true);
        let out: Vec<String> = collect_values(&mut uniq)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(out, vec!["{value:3,count:2}", "{value:4,count:1}"]);
    }

    #[test]
    fn test_distinct() {
        let mut distinct = Distinct::new(scan(&[1, 2, 1, 3, 2]), Box::new(This), Resetters::new());
        let out: Vec<i64> = collect_values(&mut distinct)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(out, vec![1, 2, 3]);
    }
}
