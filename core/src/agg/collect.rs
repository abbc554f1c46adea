use std::collections::VecDeque;

use hashbrown::HashSet;
use tracing::warn;

use crate::types::{Type, TypeContext};
use crate::value::{Value, build};

use super::{Aggregator, input};

/// Elements of a collection partial, with union tags removed.
fn partial_elements(partial: &Value) -> Vec<Value> {
    partial
        .elements()
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v.union_member() {
            Some((_, member)) => member,
            None => v,
        })
        .collect()
}

/// Gathers values into an array. Past `max_bytes` the oldest values are
/// dropped to make room.
pub(super) struct Collect {
    vals: VecDeque<Value>,
    nbytes: usize,
    max_bytes: usize,
    warned: bool,
}

impl Collect {
    pub(super) fn new(max_bytes: usize) -> Self {
        Collect {
            vals: VecDeque::new(),
            nbytes: 0,
            max_bytes,
            warned: false,
        }
    }

    fn push(&mut self, val: Value) {
        self.nbytes += val.size();
        self.vals.push_back(val);
        while self.nbytes > self.max_bytes && self.vals.len() > 1 {
            if let Some(old) = self.vals.pop_front() {
                self.nbytes -= old.size();
            }
            if !self.warned {
                warn!(max_bytes = self.max_bytes, "collect: size limit reached, dropping oldest values");
                self.warned = true;
            }
        }
    }
}

impl Aggregator for Collect {
    fn consume(&mut self, val: &Value) {
        if let Some(val) = input(val) {
            self.push(val);
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        for val in partial_elements(partial) {
            self.push(val);
        }
    }

    fn result(&mut self, ctx: &TypeContext) -> Value {
        if self.vals.is_empty() {
            return Value::null_of(ctx.lookup_type_array(&Type::null()));
        }
        build::array(ctx, self.vals.make_contiguous())
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}

/// Gathers distinct values into a set, with the same byte limit as
/// [`Collect`].
pub(super) struct Union {
    seen: HashSet<Value>,
    order: VecDeque<Value>,
    nbytes: usize,
    max_bytes: usize,
    warned: bool,
}

impl Union {
    pub(super) fn new(max_bytes: usize) -> Self {
        Union {
            seen: HashSet::new(),
            order: VecDeque::new(),
            nbytes: 0,
            max_bytes,
            warned: false,
        }
    }

    fn push(&mut self, val: Value) {
        if !self.seen.insert(val.clone()) {
            return;
        }
        self.nbytes += val.size();
        self.order.push_back(val);
        while self.nbytes > self.max_bytes && self.order.len() > 1 {
            if let Some(old) = self.order.pop_front() {
                self.nbytes -= old.size();
                self.seen.remove(&old);
            }
            if !self.warned {
                warn!(max_bytes = self.max_bytes, "union: size limit reached, dropping oldest values");
                self.warned = true;
            }
        }
    }
}

impl Aggregator for Union {
    fn consume(&mut self, val: &Value) {
        if let Some(val) = input(val) {
            self.push(val);
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        for val in partial_elements(partial) {
            self.push(val);
        }
    }

    fn result(&mut self, ctx: &TypeContext) -> Value {
        if self.order.is_empty() {
            return Value::null_of(ctx.lookup_type_set(&Type::null()));
        }
        build::set(ctx, self.order.make_contiguous())
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}
