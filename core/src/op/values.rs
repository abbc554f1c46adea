use std::sync::Arc;

use crate::error::Result;
use crate::expr::{Evaluator, Resetters, dequiet_value};
use crate::runtime::{Batch, Puller};
use crate::types::TypeContext;
use crate::value::Value;
use crate::vector::{Any, Vector, from_values};

/// Emits the value of each expression for each input value, in input
/// order. Quiet results are not emitted.
pub struct Values {
    ctx: Arc<TypeContext>,
    parent: Box<dyn Puller>,
    exprs: Vec<Box<dyn Evaluator>>,
    resetters: Resetters,
}

impl Values {
    pub fn new(
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        exprs: Vec<Box<dyn Evaluator>>,
        resetters: Resetters,
    ) -> Self {
        Values {
            ctx,
            parent,
            exprs,
            resetters,
        }
    }
}

impl Puller for Values {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                self.resetters.reset();
                return Ok(None);
            };
            let this = batch.vector();
            let cols: Vec<Vector> = self.exprs.iter().map(|e| e.eval(this)).collect();
            let mut out: Vec<Value> = Vec::with_capacity(this.len() as usize * cols.len());
            for slot in 0..this.len() {
                for col in &cols {
                    let val = col.value(slot);
                    if !val.is_quiet() {
                        out.push(dequiet_value(&self.ctx, &val));
                    }
                }
            }
            if !out.is_empty() {
                return Ok(Some(batch.derive(from_values(&out))));
            }
        }
    }
}
