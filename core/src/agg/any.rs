use crate::types::TypeContext;
use crate::value::Value;

use super::{Aggregator, input};

/// Keeps the first value that is neither null nor an error.
#[derive(Debug, Default)]
pub(super) struct AnyAgg {
    val: Option<Value>,
}

impl Aggregator for AnyAgg {
    fn consume(&mut self, val: &Value) {
        if self.val.is_none() {
            self.val = input(val);
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        self.consume(partial)
    }

    fn result(&mut self, _ctx: &TypeContext) -> Value {
        self.val.clone().unwrap_or_else(Value::null)
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}
