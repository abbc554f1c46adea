use hashbrown::HashSet;

use crate::types::TypeContext;
use crate::value::Value;

use super::Aggregator;

/// Feeds the wrapped aggregator only the first occurrence of each value.
pub(super) struct Distinct {
    inner: Box<dyn Aggregator>,
    seen: HashSet<Value>,
}

impl Distinct {
    pub(super) fn new(inner: Box<dyn Aggregator>) -> Self {
        Distinct {
            inner,
            seen: HashSet::new(),
        }
    }
}

impl Aggregator for Distinct {
    fn consume(&mut self, val: &Value) {
        if self.seen.insert(val.clone()) {
            self.inner.consume(val);
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        self.inner.consume_as_partial(partial)
    }

    fn result(&mut self, ctx: &TypeContext) -> Value {
        self.inner.result(ctx)
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.inner.result_as_partial(ctx)
    }
}
