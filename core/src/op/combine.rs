use crate::error::Result;
use crate::runtime::{Batch, Mux, Puller, RuntimeContext};

/// Interleaves parallel parents in arrival order.
pub struct Combine {
    mux: Mux,
}

impl Combine {
    pub fn new(rctx: RuntimeContext, parents: Vec<Box<dyn Puller>>) -> Result<Self> {
        Ok(Combine {
            mux: Mux::new(rctx, parents)?,
        })
    }
}

impl Puller for Combine {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        self.mux.pull(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn scan(range: std::ops::Range<i64>) -> Box<dyn Puller> {
        Box::new(ValuesScan::new(range.map(Value::int64).collect(), 3))
    }

    #[test]
    fn test_combine_sees_every_value_once() {
        let rctx = RuntimeContext::default();
        let mut combine = Combine::new(rctx, vec![scan(0..10), scan(10..25), scan(25..26)]).unwrap();
        let mut out: Vec<i64> = collect_values(&mut combine)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        out.sort();
        assert_eq!(out, (0..26).collect::<Vec<_>>());
        assert!(combine.pull(true).unwrap().is_none());
    }
}
