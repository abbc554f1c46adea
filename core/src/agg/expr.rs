use crate::expr::Evaluator;
use crate::vector::{Any, Vector};
use crate::value::Value;

use super::{Aggregator, Pattern};

/// An aggregate call site: `agg(arg) where filter`. Without an argument
/// the aggregator sees the whole input value.
pub struct AggExpr {
    pattern: Pattern,
    arg: Option<Box<dyn Evaluator>>,
    filter: Option<Box<dyn Evaluator>>,
}

impl AggExpr {
    pub fn new(
        pattern: Pattern,
        arg: Option<Box<dyn Evaluator>>,
        filter: Option<Box<dyn Evaluator>>,
    ) -> Self {
        AggExpr {
            pattern,
            arg,
            filter,
        }
    }

    pub fn new_aggregator(&self) -> Box<dyn Aggregator> {
        (self.pattern)()
    }

    /// The value each slot of `this` contributes, `None` where the filter
    /// rejects the slot.
    pub fn inputs(&self, this: &Vector) -> Vec<Option<Value>> {
        let args = match &self.arg {
            Some(arg) => arg.eval(this),
            None => this.clone(),
        };
        let filter = self.filter.as_ref().map(|f| f.eval(this));
        (0..this.len())
            .map(|slot| match &filter {
                Some(f) if !f.value(slot).is_true() => None,
                _ => Some(args.value(slot)),
            })
            .collect()
    }
}
