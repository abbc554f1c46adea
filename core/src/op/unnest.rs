//! `unnest`, with and without a body.
//!
//! Without a body every element of the unnested container is emitted
//! downstream. With a body, the elements of each input value become one
//! complete stream through the body pipeline: the body's source is a
//! [`Feed`] holding that value's elements, and the scope's locals are
//! bound in a [`Frame`] for the duration of the stream.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::Result;
use crate::expr::{Evaluator, Frame, Resetters};
use crate::runtime::{Batch, Puller};
use crate::types::TypeContext;
use crate::value::{Value, build};
use crate::vector::{Any, Vector, from_values};

/// The elements of `val` as unnest sees them. Arrays and sets give their
/// elements, maps and records give `{key,value}` records, null and
/// `missing` give nothing and errors give themselves.
pub(crate) fn unnest_elements(ctx: &TypeContext, val: &Value) -> Vec<Value> {
    let val = val.under();
    if val.is_null() || val.is_missing() || val.is_quiet() {
        return Vec::new();
    }
    if val.is_error() {
        return vec![val];
    }
    let entry = |key: Value, value: Value| {
        build::record(ctx, vec![("key".into(), key), ("value".into(), value)])
            .unwrap_or_else(|err| ctx.new_error(err))
    };
    if let Some(elems) = val.elements() {
        return elems;
    }
    if let Some(entries) = val.map_entries() {
        return entries.into_iter().map(|(k, v)| entry(k, v)).collect();
    }
    if let Some(fields) = val.record_entries() {
        return fields
            .into_iter()
            .filter_map(|(f, v)| Some(entry(Value::string(&f.name), v?)))
            .collect();
    }
    vec![ctx.wrap_error("unnest: encountered non-container value", &val)]
}

/// The source of a scope's body: yields the batch it was last given, once.
#[derive(Clone, Default)]
pub struct Feed(Arc<Mutex<Option<Batch>>>);

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, batch: Batch) {
        *self.0.lock() = Some(batch);
    }
}

impl Puller for Feed {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        let batch = self.0.lock().take();
        Ok(if done { None } else { batch })
    }
}

/// A body pipeline reading from `feed`, with locals bound in `frame`.
pub struct Scope {
    pub feed: Feed,
    pub frame: Frame,
    pub locals: Vec<Box<dyn Evaluator>>,
    pub body: Box<dyn Puller>,
}

struct Input {
    batch: Batch,
    elems: Vector,
    locals: Vec<Vector>,
    slot: u32,
}

pub struct Unnest {
    ctx: Arc<TypeContext>,
    parent: Box<dyn Puller>,
    expr: Box<dyn Evaluator>,
    scope: Option<Scope>,
    resetters: Resetters,
    input: Option<Input>,
    in_body: bool,
}

impl Unnest {
    pub fn new(
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        expr: Box<dyn Evaluator>,
        scope: Option<Scope>,
        resetters: Resetters,
    ) -> Self {
        Unnest {
            ctx,
            parent,
            expr,
            scope,
            resetters,
            input: None,
            in_body: false,
        }
    }

    fn pull_flat(&mut self) -> Result<Option<Batch>> {
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                self.resetters.reset();
                return Ok(None);
            };
            let elems = self.expr.eval(batch.vector());
            let out: Vec<Value> = (0..elems.len())
                .flat_map(|slot| unnest_elements(&self.ctx, &elems.value(slot)))
                .collect();
            if !out.is_empty() {
                return Ok(Some(batch.derive(from_values(&out))));
            }
        }
    }

    /// Starts the body on the next input value with elements. Returns
    /// false at end of the parent's stream.
    fn start_body(&mut self) -> Result<bool> {
        let Some(scope) = self.scope.as_ref() else {
            return Ok(false);
        };
        loop {
            let Some(input) = self.input.as_mut() else {
                let Some(batch) = self.parent.pull(false)? else {
                    return Ok(false);
                };
                let elems = self.expr.eval(batch.vector());
                let locals = scope.locals.iter().map(|l| l.eval(batch.vector())).collect();
                self.input = Some(Input {
                    batch,
                    elems,
                    locals,
                    slot: 0,
                });
                continue;
            };
            if input.slot >= input.elems.len() {
                self.input = None;
                continue;
            }
            let slot = input.slot;
            input.slot += 1;
            let elems = unnest_elements(&self.ctx, &input.elems.value(slot));
            if elems.is_empty() {
                continue;
            }
            let locals: Vec<Value> = input.locals.iter().map(|l| l.value(slot)).collect();
            let mut vars: Vec<Value> = input
                .batch
                .vars()
                .map(<[Value]>::to_vec)
                .unwrap_or_default();
            vars.extend(locals.iter().cloned());
            trace!(elems = elems.len(), "unnest: starting body");
            scope.frame.set(locals);
            scope.feed.set(Batch::with_vars(from_values(&elems), vars));
            return Ok(true);
        }
    }
}

impl Puller for Unnest {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.input = None;
            if let Some(scope) = self.scope.as_mut() {
                if self.in_body {
                    scope.body.pull(true)?;
                }
            }
            self.in_body = false;
            return self.parent.pull(true);
        }
        if self.scope.is_none() {
            return self.pull_flat();
        }
        loop {
            if self.in_body {
                if let Some(scope) = self.scope.as_mut() {
                    if let Some(batch) = scope.body.pull(false)? {
                        return Ok(Some(batch));
                    }
                }
                self.in_body = false;
            }
            if !self.start_body()? {
                self.resetters.reset();
                return Ok(None);
            }
            self.in_body = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Dot, This, Var};
    use crate::op::put::{Assignment, Cut};
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use pretty_assertions::assert_eq;

    fn rec(ctx: &TypeContext, fields: Vec<(&str, Value)>) -> Value {
        build::record(ctx, fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect()).unwrap()
    }

    fn input(ctx: &TypeContext) -> Vec<Value> {
        let xs = build::array(ctx, &[Value::int64(1), Value::int64(2), Value::int64(3)]);
        let empty = build::array(ctx, &[]);
        vec![
            rec(ctx, vec![("xs", xs), ("id", Value::string("a"))]),
            rec(ctx, vec![("xs", empty), ("id", Value::string("b"))]),
        ]
    }

    #[test]
    fn test_unnest_array() {
        let ctx = Arc::new(TypeContext::new());
        let scan = Box::new(ValuesScan::new(input(&ctx), 512));
        let expr = Box::new(Dot::field(ctx.clone(), "xs"));
        let mut unnest = Unnest::new(ctx, scan, expr, None, Resetters::new());
        let out: Vec<i64> = collect_values(&mut unnest)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_unnest_elements() {
        let ctx = TypeContext::new();
        let r = rec(&ctx, vec![("a", Value::int64(1))]);
        let out: Vec<String> = unnest_elements(&ctx, &r).iter().map(|v| v.to_string()).collect();
        assert_eq!(out, vec!["{key:\"a\",value:1}"]);
        assert!(unnest_elements(&ctx, &Value::null()).is_empty());
        assert!(unnest_elements(&ctx, &Value::int64(1))[0].is_error());
    }

    #[test]
    fn test_unnest_body_with_locals() {
        let ctx = Arc::new(TypeContext::new());
        let scan = Box::new(ValuesScan::new(input(&ctx), 512));
        let feed = Feed::new();
        let frame = Frame::new();
        let assigns = vec![
            Assignment::new(vec!["x".into()], Box::new(This)),
            Assignment::new(vec!["id".into()], Box::new(Var::new(ctx.clone(), frame.clone(), 0))),
        ];
        let body = Cut::new(ctx.clone(), Box::new(feed.clone()), assigns, Resetters::new()).unwrap();
        let scope = Scope {
            feed,
            frame,
            locals: vec![Box::new(Dot::field(ctx.clone(), "id"))],
            body: Box::new(body),
        };
        let expr = Box::new(Dot::field(ctx.clone(), "xs"));
        let mut unnest = Unnest::new(ctx, scan, expr, Some(scope), Resetters::new());
        let out: Vec<String> = collect_values(&mut unnest)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(
            out,
            vec!["{x:1,id:\"a\"}", "{x:2,id:\"a\"}", "{x:3,id:\"a\"}"]
        );
    }
}
