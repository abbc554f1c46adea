use crate::error::Result;
use crate::expr::Evaluator;
use crate::runtime::{Batch, Puller};
use crate::vector::Vector;

/// Receives what a [`Tap`] observed.
pub type TapFn = Box<dyn FnMut(&Vector) + Send>;

/// Passes batches through unchanged, handing `expr` evaluated over each
/// one to a callback.
pub struct Tap {
    parent: Box<dyn Puller>,
    expr: Box<dyn Evaluator>,
    f: TapFn,
}

impl Tap {
    pub fn new(parent: Box<dyn Puller>, expr: Box<dyn Evaluator>, f: TapFn) -> Self {
        Tap { parent, expr, f }
    }
}

impl Puller for Tap {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        let batch = self.parent.pull(done)?;
        if let Some(batch) = &batch {
            (self.f)(&self.expr.eval(batch.vector()));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::This;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tap_sends_and_passes_through() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let scan = Box::new(ValuesScan::new((0..5).map(Value::int64).collect(), 2));
        let f: TapFn = Box::new(move |v: &Vector| {
            let _ = tx.send(v.values());
        });
        let mut tap = Tap::new(scan, Box::new(This), f);
        assert_eq!(collect_values(&mut tap).unwrap().len(), 5);
        let seen: Vec<usize> = rx.try_iter().map(|vals| vals.len()).collect();
        assert_eq!(seen, vec![2, 2, 1]);
    }
}
