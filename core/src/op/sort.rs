//! External sort.
//!
//! Values are buffered with their sort keys. When the buffered bytes pass
//! the memory budget the buffer is sorted and written out as a run; at end
//! of stream the runs are merged.

use core::cmp::Ordering;

use tracing::debug;

use crate::error::Result;
use crate::expr::{Comparator, Dot, Resetters, SortKey, guess_sort_key};
use crate::runtime::spill::{SpillReader, SpillWriter};
use crate::runtime::{Batch, Puller, RuntimeContext};
use crate::value::Value;
use crate::vector::from_values;

type Row = (Vec<Value>, Value);

pub struct Sort {
    rctx: RuntimeContext,
    parent: Box<dyn Puller>,
    reverse: bool,
    nulls_first: bool,
    resetters: Resetters,
    explicit: Option<Comparator>,
    guessed: Option<Comparator>,
    out: Option<Output>,
}

enum Output {
    Memory(std::vec::IntoIter<Row>),
    Merge(Merger),
}

impl Sort {
    /// With no `keys` the key is guessed from the first value of each
    /// stream. `reverse` flips the direction of every key.
    pub fn new(
        rctx: RuntimeContext,
        parent: Box<dyn Puller>,
        keys: Vec<SortKey>,
        reverse: bool,
        nulls_first: bool,
        resetters: Resetters,
    ) -> Self {
        let explicit = (!keys.is_empty()).then(|| {
            let keys = keys
                .into_iter()
                .map(|k| SortKey::new(k.expr, k.reverse != reverse))
                .collect();
            Comparator::new(keys, !nulls_first)
        });
        Sort {
            rctx,
            parent,
            reverse,
            nulls_first,
            resetters,
            explicit,
            guessed: None,
            out: None,
        }
    }

    fn cmp(&self) -> Option<&Comparator> {
        self.explicit.as_ref().or(self.guessed.as_ref())
    }

    fn consume(&mut self) -> Result<Output> {
        let mut rows: Vec<Row> = Vec::new();
        let mut nbytes = 0;
        let mut runs: Vec<SpillWriter> = Vec::new();
        while let Some(batch) = self.parent.pull(false)? {
            if batch.is_empty() {
                continue;
            }
            let vals = batch.values();
            if self.cmp().is_none() {
                let path = guess_sort_key(&vals[0]);
                debug!(key = %path.join("."), "sort: guessed key");
                let key = SortKey::new(Dot::path(&self.rctx.types, &path), self.reverse);
                self.guessed = Some(Comparator::new(vec![key], !self.nulls_first));
            }
            let Some(cmp) = self.cmp() else {
                unreachable!("sort comparator is set above");
            };
            let keys = cmp.eval_keys(batch.vector());
            for (k, v) in keys.into_iter().zip(vals) {
                nbytes += v.size();
                rows.push((k, v));
            }
            if nbytes > self.rctx.options.sort_mem_max_bytes {
                runs.push(spill_run(&self.rctx, cmp, &mut rows)?);
                nbytes = 0;
            }
        }
        let Some(cmp) = self.cmp() else {
            return Ok(Output::Memory(Vec::new().into_iter()));
        };
        if runs.is_empty() {
            rows.sort_by(|a, b| cmp.compare(&a.0, &b.0));
            return Ok(Output::Memory(rows.into_iter()));
        }
        if !rows.is_empty() {
            runs.push(spill_run(&self.rctx, cmp, &mut rows)?);
        }
        debug!(runs = runs.len(), "sort: merging spilled runs");
        let mut readers = Vec::with_capacity(runs.len());
        for run in runs {
            readers.push(run.finish(self.rctx.types.clone())?);
        }
        Merger::new(readers, cmp).map(Output::Merge)
    }

    fn reset(&mut self) {
        self.out = None;
        self.guessed = None;
        self.resetters.reset();
    }
}

fn spill_run(rctx: &RuntimeContext, cmp: &Comparator, rows: &mut Vec<Row>) -> Result<SpillWriter> {
    rows.sort_by(|a, b| cmp.compare(&a.0, &b.0));
    let mut run = SpillWriter::create(rctx.options.spill_dir.as_deref())?;
    for (_, v) in rows.drain(..) {
        run.write(&v)?;
    }
    debug!(values = run.len(), path = %run.path().display(), "sort: spilled run");
    Ok(run)
}

impl Puller for Sort {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.reset();
            return self.parent.pull(true);
        }
        if self.out.is_none() {
            let out = self.consume()?;
            self.out = Some(out);
        }
        let batch_size = self.rctx.options.batch_size;
        let mut vals = Vec::with_capacity(batch_size);
        while vals.len() < batch_size {
            let next = match (self.out.as_mut(), self.explicit.as_ref().or(self.guessed.as_ref())) {
                (Some(Output::Memory(it)), _) => it.next().map(|(_, v)| v),
                (Some(Output::Merge(m)), Some(cmp)) => m.next(cmp)?,
                _ => None,
            };
            match next {
                Some(v) => vals.push(v),
                None => break,
            }
        }
        if vals.is_empty() {
            self.reset();
            return Ok(None);
        }
        Ok(Some(Batch::new(from_values(&vals))))
    }
}

/// K-way merge of sorted runs. Ties go to the earlier run, which keeps the
/// sort stable.
struct Merger {
    readers: Vec<SpillReader>,
    heads: Vec<Option<Row>>,
}

impl Merger {
    fn new(mut readers: Vec<SpillReader>, cmp: &Comparator) -> Result<Self> {
        let mut heads = Vec::with_capacity(readers.len());
        for r in &mut readers {
            heads.push(read_row(r, cmp)?);
        }
        Ok(Merger { readers, heads })
    }

    fn next(&mut self, cmp: &Comparator) -> Result<Option<Value>> {
        let mut min: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Some((keys, _)) = head else {
                continue;
            };
            let better = match min.and_then(|m| self.heads[m].as_ref()) {
                Some((best, _)) => cmp.compare(keys, best) == Ordering::Less,
                None => true,
            };
            if better {
                min = Some(i);
            }
        }
        let Some(i) = min else {
            return Ok(None);
        };
        let next = read_row(&mut self.readers[i], cmp)?;
        Ok(std::mem::replace(&mut self.heads[i], next).map(|(_, v)| v))
    }
}

fn read_row(r: &mut SpillReader, cmp: &Comparator) -> Result<Option<Row>> {
    let Some(v) = r.read()? else {
        return Ok(None);
    };
    let keys = cmp.eval_keys(&from_values(std::slice::from_ref(&v)));
    let keys = keys.into_iter().next().unwrap_or_default();
    Ok(Some((keys, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::This;
    use crate::op::scan::ValuesScan;
    use crate::runtime::{RuntimeOptions, collect_values};
    use crate::test_utils::init_test_logging;
    use crate::value::build;
    use pretty_assertions::assert_eq;

    fn by_this(reverse: bool) -> Vec<SortKey> {
        vec![SortKey::new(Box::new(This), reverse)]
    }

    #[test]
    fn test_sort_nulls_last() {
        let vals = vec![Value::int64(3), Value::null(), Value::int64(1)];
        let scan = Box::new(ValuesScan::new(vals, 2));
        let mut sort = Sort::new(RuntimeContext::default(), scan, by_this(false), false, false, Resetters::new());
        let out = collect_values(&mut sort).unwrap();
        assert_eq!(out, vec![Value::int64(1), Value::int64(3), Value::null()]);
    }

    #[test]
    fn test_sort_guesses_key() {
        let rctx = RuntimeContext::default();
        let ctx = rctx.types.clone();
        let rec = |a: &str, n: i64| {
            build::record(&ctx, vec![("a".into(), Value::string(a)), ("n".into(), Value::int64(n))]).unwrap()
        };
        let scan = Box::new(ValuesScan::new(vec![rec("x", 2), rec("y", 1), rec("z", 3)], 8));
        let mut sort = Sort::new(rctx.clone(), scan, vec![], true, false, Resetters::new());
        let out: Vec<String> = collect_values(&mut sort).unwrap().iter().map(Value::to_string).collect();
        assert_eq!(out, vec!["{a:\"z\",n:3}", "{a:\"x\",n:2}", "{a:\"y\",n:1}"]);
    }

    #[test]
    fn test_sort_spills_and_cleans_up() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let rctx = RuntimeContext::new(RuntimeOptions {
            batch_size: 2,
            sort_mem_max_bytes: 1,
            spill_dir: Some(dir.path().to_path_buf()),
            ..RuntimeOptions::default()
        });
        let vals: Vec<Value> = [5, 3, 9, 1, 7, 2, 8].into_iter().map(Value::int64).collect();
        let scan = Box::new(ValuesScan::new(vals, 2));
        let mut sort = Sort::new(rctx, scan, by_this(false), false, false, Resetters::new());
        let first = sort.pull(false).unwrap().unwrap();
        assert_eq!(first.values(), vec![Value::int64(1), Value::int64(2)]);
        assert!(std::fs::read_dir(dir.path()).unwrap().count() > 1);
        let rest: Vec<i64> = collect_values(&mut sort)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(rest, vec![3, 5, 7, 8, 9]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
