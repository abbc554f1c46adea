use std::sync::Arc;

use crate::codec::Builder;
use crate::types::TypeContext;
use crate::value::{Number, Value};
use crate::vector::{Any, Vector};

use super::{Evaluator, map_slots};

/// `container[from:to]` over strings (by character), bytes, arrays and
/// sets. Negative bounds count from the end and bounds are clamped.
pub struct Slice {
    ctx: Arc<TypeContext>,
    container: Box<dyn Evaluator>,
    from: Option<Box<dyn Evaluator>>,
    to: Option<Box<dyn Evaluator>>,
    base1: bool,
}

impl Slice {
    pub fn new(
        ctx: Arc<TypeContext>,
        container: Box<dyn Evaluator>,
        from: Option<Box<dyn Evaluator>>,
        to: Option<Box<dyn Evaluator>>,
        base1: bool,
    ) -> Self {
        Slice {
            ctx,
            container,
            from,
            to,
            base1,
        }
    }

    fn bound(&self, val: Option<Value>) -> Result<Option<i64>, Value> {
        let Some(val) = val else {
            return Ok(None);
        };
        let val = val.under();
        if val.is_error() {
            return Err(val);
        }
        if val.is_null() {
            return Ok(None);
        }
        let i = match Number::from_value(&val) {
            Some(Number::Int(i)) => i,
            Some(Number::Uint(i)) => i as i64,
            _ => return Err(self.ctx.wrap_error("slice index is not an integer", &val)),
        };
        if self.base1 && i == 0 {
            return Err(self.ctx.wrap_error("slice index 0 with 1-based indexing", &val));
        }
        Ok(Some(if self.base1 && i > 0 { i - 1 } else { i }))
    }

    fn slice(&self, container: Value, from: Option<Value>, to: Option<Value>) -> Value {
        if container.is_error() {
            return container;
        }
        let container = container.under();
        if container.is_null() {
            return container;
        }
        let (from, to) = match (self.bound(from), self.bound(to)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return e,
        };
        if let Some(s) = container.as_str() {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = clamp(from, to, chars.len());
            return Value::string(&chars[start..end].iter().collect::<String>());
        }
        if let Some(b) = container.as_bytes() {
            let (start, end) = clamp(from, to, b.len());
            return Value::bytes_value(&b[start..end]);
        }
        if let (Some(elems), Some(elem)) = (container.elements(), container.ty().elem()) {
            let (start, end) = clamp(from, to, elems.len());
            let mut b = Builder::new();
            for e in &elems[start..end] {
                b.append_body(e.bytes(), elem.is_container());
            }
            return Value::new(container.ty().clone(), Some(b.into_bytes()));
        }
        self.ctx.wrap_error("sliced value is not a string, bytes, array or set", &container)
    }
}

/// Resolves slice bounds to a valid half-open range, empty when they cross.
fn clamp(from: Option<i64>, to: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let resolve = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
    let start = resolve(from.unwrap_or(0));
    let end = resolve(to.unwrap_or(len));
    if start > end {
        (0, 0)
    } else {
        (start as usize, end as usize)
    }
}

impl Evaluator for Slice {
    fn eval(&self, this: &Vector) -> Vector {
        let container = self.container.eval(this);
        let from = self.from.as_ref().map(|e| e.eval(this));
        let to = self.to.as_ref().map(|e| e.eval(this));
        map_slots(this.len(), |slot| {
            self.slice(
                container.value(slot),
                from.as_ref().map(|v| v.value(slot)),
                to.as_ref().map(|v| v.value(slot)),
            )
        })
    }
}
