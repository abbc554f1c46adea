use crate::value::{Value, equal};
use crate::vector::{Any, Vector};

use super::{Evaluator, map_slots};

/// `elem in container`: true when `elem` equals the container itself or
/// any value nested inside it.
pub struct In {
    elem: Box<dyn Evaluator>,
    container: Box<dyn Evaluator>,
}

impl In {
    pub fn new(elem: Box<dyn Evaluator>, container: Box<dyn Evaluator>) -> Self {
        In { elem, container }
    }
}

impl Evaluator for In {
    fn eval(&self, this: &Vector) -> Vector {
        let elems = self.elem.eval(this);
        let containers = self.container.eval(this);
        map_slots(this.len(), |slot| {
            let elem = elems.value(slot);
            if elem.is_error() {
                return elem;
            }
            let container = containers.value(slot);
            if container.is_error() {
                return container;
            }
            Value::bool(contains(&elem.under(), &container))
        })
    }
}

fn contains(elem: &Value, container: &Value) -> bool {
    let container = container.under();
    if equal(elem, &container) {
        return true;
    }
    if container.is_null() {
        return false;
    }
    if let Some(entries) = container.record_entries() {
        return entries
            .into_iter()
            .filter_map(|(_, v)| v)
            .any(|v| contains(elem, &v));
    }
    if let Some(elems) = container.elements() {
        return elems.iter().any(|v| contains(elem, v));
    }
    if let Some(entries) = container.map_entries() {
        return entries
            .iter()
            .any(|(k, v)| contains(elem, k) || contains(elem, v));
    }
    false
}
