use std::sync::Arc;

use crate::types::TypeContext;
use crate::value::Value;
use crate::vector::{Any, Vector, new_dynamic, pick};

use super::{Evaluator, map_slots};

/// `pred ? then : else`. Each branch only sees the slots routed to it.
pub struct Conditional {
    ctx: Arc<TypeContext>,
    pred: Box<dyn Evaluator>,
    then: Box<dyn Evaluator>,
    otherwise: Box<dyn Evaluator>,
}

impl Conditional {
    pub fn new(
        ctx: Arc<TypeContext>,
        pred: Box<dyn Evaluator>,
        then: Box<dyn Evaluator>,
        otherwise: Box<dyn Evaluator>,
    ) -> Self {
        Conditional {
            ctx,
            pred,
            then,
            otherwise,
        }
    }

    fn not_bool(&self, val: &Value) -> Value {
        if val.is_error() {
            val.clone()
        } else {
            self.ctx.wrap_error("?-operator: bool predicate required", val)
        }
    }
}

impl Evaluator for Conditional {
    fn eval(&self, this: &Vector) -> Vector {
        let n = this.len();
        if n == 0 {
            return Vector::Null(0);
        }
        let pred = self.pred.eval(this);
        if let Vector::Const(c) = &pred {
            return match c.value.under().as_bool() {
                Some(true) => self.then.eval(this),
                Some(false) => self.otherwise.eval(this),
                None => Vector::new_const(self.not_bool(&c.value), n),
            };
        }
        let mut tags = Vec::with_capacity(n as usize);
        let mut routes: [Vec<u32>; 3] = Default::default();
        for slot in 0..n {
            let tag = match pred.value(slot).under().as_bool() {
                Some(true) => 0,
                Some(false) => 1,
                None => 2,
            };
            tags.push(tag);
            routes[tag as usize].push(slot);
        }
        let branch = |e: &dyn Evaluator, slots: &[u32]| {
            if slots.is_empty() {
                Vector::Null(0)
            } else {
                e.eval(&pick(this, slots))
            }
        };
        let then = branch(self.then.as_ref(), &routes[0]);
        let otherwise = branch(self.otherwise.as_ref(), &routes[1]);
        let errs = map_slots(routes[2].len() as u32, |i| {
            self.not_bool(&pred.value(routes[2][i as usize]))
        });
        new_dynamic(tags, vec![then, otherwise, errs])
    }
}
