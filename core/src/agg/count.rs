use hashbrown::HashSet;

use crate::types::TypeContext;
use crate::value::{Value, build};

use super::{Aggregator, input};

#[derive(Debug, Default)]
pub(super) struct Count {
    n: u64,
}

impl Aggregator for Count {
    fn consume(&mut self, val: &Value) {
        if input(val).is_some() {
            self.n += 1;
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        self.n += partial.as_u64().unwrap_or(0);
    }

    fn result(&mut self, _ctx: &TypeContext) -> Value {
        Value::uint64(self.n)
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}

/// Counts distinct values by type and bytes. The partial state is the
/// set of values seen.
#[derive(Debug, Default)]
pub(super) struct DCount {
    seen: HashSet<Value>,
}

impl Aggregator for DCount {
    fn consume(&mut self, val: &Value) {
        if let Some(val) = input(val) {
            self.seen.insert(val);
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        for val in partial.elements().unwrap_or_default() {
            let val = match val.union_member() {
                Some((_, member)) => member,
                None => val,
            };
            self.seen.insert(val);
        }
    }

    fn result(&mut self, _ctx: &TypeContext) -> Value {
        Value::uint64(self.seen.len() as u64)
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        let vals: Vec<Value> = self.seen.iter().cloned().collect();
        build::set(ctx, &vals)
    }
}
