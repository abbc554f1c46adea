//! User-defined functions.
//!
//! A [`Lambda`] is shared by every call site, so recursive functions can
//! refer to themselves: the body is bound after the lambda is created.
//! Calls bind their arguments as the fields of a record that becomes the
//! body's "this".

use std::cell::Cell;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::types::TypeContext;
use crate::vector::{Any, Vector};

use super::Evaluator;
use super::record::record_vector;

pub const DEFAULT_MAX_DEPTH: usize = 10_000;

pub struct Lambda {
    name: String,
    params: Vec<String>,
    body: OnceCell<Box<dyn Evaluator>>,
    max_depth: usize,
}

impl Lambda {
    pub fn new(name: impl Into<String>, params: Vec<String>, max_depth: usize) -> Arc<Self> {
        Arc::new(Lambda {
            name: name.into(),
            params,
            body: OnceCell::new(),
            max_depth,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Binds the body. Returns `false` if it was already bound.
    pub fn bind(&self, body: Box<dyn Evaluator>) -> bool {
        self.body.set(body).is_ok()
    }
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// One active invocation on this thread.
struct Frame;

impl Frame {
    fn enter(max_depth: usize) -> Option<Frame> {
        DEPTH.with(|d| {
            let depth = d.get() + 1;
            if depth > max_depth {
                return None;
            }
            d.set(depth);
            Some(Frame)
        })
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// A call of a [`Lambda`].
pub struct Call {
    ctx: Arc<TypeContext>,
    lambda: Arc<Lambda>,
    args: Vec<Box<dyn Evaluator>>,
}

impl Call {
    pub fn new(
        ctx: Arc<TypeContext>,
        lambda: Arc<Lambda>,
        args: Vec<Box<dyn Evaluator>>,
    ) -> crate::error::Result<Self> {
        if args.len() != lambda.arity() {
            return Err(crate::error::Error::compile(format!(
                "{}: expected {} arguments, got {}",
                lambda.name,
                lambda.arity(),
                args.len()
            )));
        }
        Ok(Call { ctx, lambda, args })
    }
}

impl Evaluator for Call {
    fn eval(&self, this: &Vector) -> Vector {
        let n = this.len();
        let Some(body) = self.lambda.body.get() else {
            let err = self
                .ctx
                .new_error(format!("function {} has no body", self.lambda.name));
            return Vector::new_const(err, n);
        };
        let Some(_frame) = Frame::enter(self.lambda.max_depth) else {
            let err = self
                .ctx
                .new_error(format!("stack overflow in function {}", self.lambda.name));
            return Vector::new_const(err, n);
        };
        let args: Vec<Vector> = self.args.iter().map(|a| a.eval(this)).collect();
        let frame = record_vector(&self.ctx, &self.lambda.params, &args, n);
        body.eval(&frame)
    }
}
