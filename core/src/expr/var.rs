use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::TypeContext;
use crate::value::Value;
use crate::vector::{Any, Vector};

use super::Evaluator;

/// The local bindings of one scope. The operator owning the scope sets
/// them before running the scope's body; [`Var`]s read them.
#[derive(Debug, Clone, Default)]
pub struct Frame(Arc<RwLock<Vec<Value>>>);

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, vals: Vec<Value>) {
        *self.0.write() = vals;
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }
}

/// A local of an enclosing scope. Unbound locals are `missing`.
pub struct Var {
    ctx: Arc<TypeContext>,
    frame: Frame,
    index: usize,
}

impl Var {
    pub fn new(ctx: Arc<TypeContext>, frame: Frame, index: usize) -> Self {
        Var { ctx, frame, index }
    }
}

impl Evaluator for Var {
    fn eval(&self, this: &Vector) -> Vector {
        let val = self.frame.get(self.index).unwrap_or_else(|| self.ctx.missing());
        Vector::new_const(val, this.len())
    }
}
