use crate::types::{Type, TypeContext};
use crate::value::Value;

use super::{Aggregator, input};

/// `and` and `or` over booleans; other inputs are skipped.
pub(super) struct Logical {
    and: bool,
    acc: Option<bool>,
}

impl Logical {
    pub(super) fn and() -> Self {
        Logical { and: true, acc: None }
    }

    pub(super) fn or() -> Self {
        Logical {
            and: false,
            acc: None,
        }
    }
}

impl Aggregator for Logical {
    fn consume(&mut self, val: &Value) {
        let Some(b) = input(val).and_then(|v| v.as_bool()) else {
            return;
        };
        self.acc = Some(match self.acc {
            None => b,
            Some(acc) if self.and => acc && b,
            Some(acc) => acc || b,
        });
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        self.consume(partial)
    }

    fn result(&mut self, _ctx: &TypeContext) -> Value {
        match self.acc {
            Some(b) => Value::bool(b),
            None => Value::null_of(Type::bool()),
        }
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}
