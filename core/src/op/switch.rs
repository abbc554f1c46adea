//! `switch`: route each value to one of several outputs.

use crate::expr::Evaluator;
use crate::runtime::{Batch, Puller, RouterOutput, new_router};
use crate::value::{Value, equal};
use crate::vector::{Any, pick};

/// Splits `batch` by the output index chosen for each slot. Slots mapped
/// to `None` are dropped.
fn split(batch: &Batch, n: usize, choose: impl Fn(u32) -> Option<usize>) -> Vec<Option<Batch>> {
    let mut index: Vec<Vec<u32>> = vec![Vec::new(); n];
    for slot in 0..batch.len() {
        if let Some(i) = choose(slot) {
            index[i].push(slot);
        }
    }
    index
        .into_iter()
        .map(|ix| {
            if ix.is_empty() {
                None
            } else if ix.len() as u32 == batch.len() {
                Some(batch.clone())
            } else {
                Some(batch.derive(pick(batch.vector(), &ix)))
            }
        })
        .collect()
}

/// One output per case. A slot goes to the first case whose value equals
/// `expr`, else to the default case (`None`) if there is one.
pub fn expr_switch(
    parent: Box<dyn Puller>,
    expr: Box<dyn Evaluator>,
    cases: Vec<Option<Value>>,
) -> Vec<RouterOutput> {
    let n = cases.len();
    let default = cases.iter().position(Option::is_none);
    new_router(
        parent,
        n,
        Box::new(move |_, batch| {
            let vals = expr.eval(batch.vector());
            split(batch, n, |slot| {
                let val = vals.value(slot);
                cases
                    .iter()
                    .position(|c| c.as_ref().is_some_and(|c| equal(c, &val)))
                    .or(default)
            })
        }),
    )
}

/// One output per predicate. A slot goes to the first predicate that is
/// true for it.
pub fn predicate_switch(parent: Box<dyn Puller>, preds: Vec<Box<dyn Evaluator>>) -> Vec<RouterOutput> {
    let n = preds.len();
    new_router(
        parent,
        n,
        Box::new(move |_, batch| {
            let results: Vec<_> = preds.iter().map(|p| p.eval(batch.vector())).collect();
            split(batch, n, |slot| {
                results.iter().position(|r| r.value(slot).is_true())
            })
        }),
    )
}
