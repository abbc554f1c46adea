use tracing::debug;

use crate::error::Result;
use crate::expr::{Comparator, Dot, Resetters, SortKey, guess_sort_key};
use crate::runtime::{Batch, Puller, RuntimeContext};
use crate::value::Value;
use crate::vector::from_values;

/// Emits the `limit` greatest values by `keys`, greatest first. Only
/// about twice `limit` values are held at any time.
pub struct Top {
    rctx: RuntimeContext,
    parent: Box<dyn Puller>,
    limit: usize,
    explicit: Option<Comparator>,
    guessed: Option<Comparator>,
    resetters: Resetters,
    emitted: bool,
}

impl Top {
    pub fn new(
        rctx: RuntimeContext,
        parent: Box<dyn Puller>,
        limit: usize,
        keys: Vec<SortKey>,
        resetters: Resetters,
    ) -> Self {
        let explicit = (!keys.is_empty()).then(|| {
            let keys = keys
                .into_iter()
                .map(|k| SortKey::new(k.expr, !k.reverse))
                .collect();
            Comparator::new(keys, true)
        });
        Top {
            rctx,
            parent,
            limit,
            explicit,
            guessed: None,
            resetters,
            emitted: false,
        }
    }

    fn cmp(&self) -> Option<&Comparator> {
        self.explicit.as_ref().or(self.guessed.as_ref())
    }
}

impl Puller for Top {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.guessed = None;
            self.emitted = false;
            return self.parent.pull(true);
        }
        if self.emitted {
            self.emitted = false;
            self.resetters.reset();
            return Ok(None);
        }
        let mut rows: Vec<(Vec<Value>, Value)> = Vec::new();
        while let Some(batch) = self.parent.pull(false)? {
            if batch.is_empty() {
                continue;
            }
            let vals = batch.values();
            if self.cmp().is_none() {
                let path = guess_sort_key(&vals[0]);
                debug!(key = %path.join("."), "top: guessed key");
                let key = SortKey::new(Dot::path(&self.rctx.types, &path), true);
                self.guessed = Some(Comparator::new(vec![key], true));
            }
            let Some(cmp) = self.cmp() else {
                unreachable!("top comparator is set above");
            };
            rows.extend(cmp.eval_keys(batch.vector()).into_iter().zip(vals));
            if rows.len() > 2 * self.limit.max(1) {
                rows.sort_by(|a, b| cmp.compare(&a.0, &b.0));
                rows.truncate(self.limit);
            }
        }
        let out = match self.cmp() {
            Some(cmp) if !rows.is_empty() && self.limit > 0 => {
                rows.sort_by(|a, b| cmp.compare(&a.0, &b.0));
                rows.truncate(self.limit);
                let vals: Vec<Value> = rows.into_iter().map(|(_, v)| v).collect();
                Some(Batch::new(from_values(&vals)))
            }
            _ => None,
        };
        self.guessed = None;
        if out.is_some() {
            self.emitted = true;
        } else {
            self.resetters.reset();
        }
        Ok(out)
    }
}
