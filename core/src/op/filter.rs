use crate::error::Result;
use crate::expr::{Evaluator, Resetters};
use crate::runtime::{Batch, Puller};
use crate::value::Value;
use crate::vector::{Any, from_values, pick};

/// Keeps the values for which `expr` is `true`. Null, `missing` and
/// `quiet` results drop the value; any other error replaces it.
pub struct Filter {
    parent: Box<dyn Puller>,
    expr: Box<dyn Evaluator>,
    resetters: Resetters,
}

impl Filter {
    pub fn new(parent: Box<dyn Puller>, expr: Box<dyn Evaluator>, resetters: Resetters) -> Self {
        Filter {
            parent,
            expr,
            resetters,
        }
    }

    fn apply(&self, batch: &Batch) -> Option<Batch> {
        let this = batch.vector();
        let mask = self.expr.eval(this);
        let mut index = Vec::new();
        let mut errs = false;
        for slot in 0..mask.len() {
            let val = mask.value(slot);
            if val.is_true() {
                index.push(slot);
            } else if val.is_error() && !val.is_missing() && !val.is_quiet() {
                index.push(slot);
                errs = true;
            }
        }
        if index.is_empty() {
            return None;
        }
        if errs {
            let vals: Vec<Value> = index
                .iter()
                .map(|&slot| {
                    let val = mask.value(slot);
                    if val.is_error() { val } else { this.value(slot) }
                })
                .collect();
            return Some(batch.derive(from_values(&vals)));
        }
        if index.len() as u32 == this.len() {
            return Some(batch.clone());
        }
        Some(batch.derive(pick(this, &index)))
    }
}

impl Puller for Filter {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                self.resetters.reset();
                return Ok(None);
            };
            if let Some(out) = self.apply(&batch) {
                return Ok(Some(out));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Arith, Compare, Literal, This};
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::types::TypeContext;
    use crate::vector::kernels::Op;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_filter_even() {
        let ctx = Arc::new(TypeContext::new());
        let rem = Arith::new(ctx.clone(), Op::Mod, Box::new(This), Box::new(Literal(Value::int64(2))));
        let expr = Compare::new(ctx, Op::Eq, Box::new(rem), Box::new(Literal(Value::int64(0))));
        let scan = Box::new(ValuesScan::new((0..7).map(Value::int64).collect(), 3));
        let mut filter = Filter::new(scan, Box::new(expr), Resetters::new());
        let out: Vec<i64> = collect_values(&mut filter)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(out, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_filter_drops_missing() {
        let ctx = Arc::new(TypeContext::new());
        let scan = Box::new(ValuesScan::new(vec![Value::int64(1)], 1));
        let mut filter = Filter::new(scan, Box::new(Literal(ctx.missing())), Resetters::new());
        assert!(collect_values(&mut filter).unwrap().is_empty());
    }
}
