use std::sync::Arc;

use crate::value::Value;
use crate::vector::{Any, Vector, from_values};

/// Values that move through a pipeline together.
///
/// A batch is shared, not copied, when it fans out to several paths:
/// cloning takes a reference and dropping releases it.
#[derive(Debug, Clone)]
pub struct Batch(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    vector: Vector,
    vars: Option<Vec<Value>>,
}

impl Batch {
    pub fn new(vector: Vector) -> Self {
        Batch(Arc::new(Inner { vector, vars: None }))
    }

    pub fn from_values(vals: &[Value]) -> Self {
        Batch::new(from_values(vals))
    }

    /// A batch carrying the local bindings of an enclosing scope.
    pub fn with_vars(vector: Vector, vars: Vec<Value>) -> Self {
        Batch(Arc::new(Inner {
            vector,
            vars: Some(vars),
        }))
    }

    pub fn vector(&self) -> &Vector {
        &self.0.vector
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.vector.values()
    }

    pub fn vars(&self) -> Option<&[Value]> {
        self.0.vars.as_deref()
    }

    /// The same bindings over different values.
    pub fn derive(&self, vector: Vector) -> Batch {
        Batch(Arc::new(Inner {
            vector,
            vars: self.0.vars.clone(),
        }))
    }

    pub fn len(&self) -> u32 {
        self.0.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live references, including this one.
    pub fn refs(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}
