use crate::types::{Field, Type, TypeContext};
use crate::value::{Number, Value, build};

use super::{Aggregator, input};

#[derive(Debug, Default)]
pub(super) struct Avg {
    sum: f64,
    count: u64,
}

impl Aggregator for Avg {
    fn consume(&mut self, val: &Value) {
        if let Some(n) = input(val).as_ref().and_then(Number::from_value) {
            self.sum += n.to_f64();
            self.count += 1;
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        let (Some(sum), Some(count)) = (partial.deref("sum"), partial.deref("count")) else {
            return;
        };
        self.sum += sum.as_f64().unwrap_or(0.0);
        self.count += count.as_u64().unwrap_or(0);
    }

    fn result(&mut self, _ctx: &TypeContext) -> Value {
        if self.count == 0 {
            return Value::null_of(Type::float64());
        }
        Value::float64(self.sum / self.count as f64)
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        let ty = ctx
            .lookup_type_record(vec![
                Field::new("sum", Type::float64()),
                Field::new("count", Type::uint64()),
            ])
            .expect("sum and count are distinct");
        build::record_of(
            &ty,
            &[
                Some(Value::float64(self.sum)),
                Some(Value::uint64(self.count)),
            ],
        )
    }
}
