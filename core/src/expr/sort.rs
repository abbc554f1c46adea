//! Sort keys and the row comparator used by sort, top and merge.

use core::cmp::Ordering;

use crate::types::{Field, Primitive, Type};
use crate::value::{Value, compare};
use crate::vector::{Any, Vector};

use super::Evaluator;

pub struct SortKey {
    pub expr: Box<dyn Evaluator>,
    pub reverse: bool,
}

impl SortKey {
    pub fn new(expr: Box<dyn Evaluator>, reverse: bool) -> Self {
        SortKey { expr, reverse }
    }
}

/// Orders rows by their evaluated keys. Key order breaks ties; null and
/// missing keys go last when `nulls_max`, whatever the direction.
pub struct Comparator {
    keys: Vec<SortKey>,
    nulls_max: bool,
}

impl Comparator {
    pub fn new(keys: Vec<SortKey>, nulls_max: bool) -> Self {
        Comparator { keys, nulls_max }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key values of every slot of `v`, one row per slot.
    pub fn eval_keys(&self, v: &Vector) -> Vec<Vec<Value>> {
        let cols: Vec<Vector> = self.keys.iter().map(|k| k.expr.eval(v)).collect();
        (0..v.len())
            .map(|slot| cols.iter().map(|c| c.value(slot)).collect())
            .collect()
    }

    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, key) in self.keys.iter().enumerate() {
            let ord = compare(&a[i], &b[i], self.nulls_max != key.reverse);
            let ord = if key.reverse { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Picks a sort key from the first record seen: the first integer field,
/// then the first float field, then the first other primitive field that
/// is not a time, else `ts`.
pub fn guess_sort_key(val: &Value) -> Vec<String> {
    let Some(fields) = val.ty().record_fields() else {
        return Vec::new();
    };
    let tests: [fn(Primitive) -> bool; 3] = [
        |p| p.is_integer() && p != Primitive::Time && p != Primitive::Duration,
        Primitive::is_float,
        |p| p != Primitive::Time && p != Primitive::Null,
    ];
    for test in tests {
        if let Some(path) = find_field(fields, &test) {
            return path;
        }
    }
    vec!["ts".to_string()]
}

fn find_field(fields: &[Field], test: &dyn Fn(Primitive) -> bool) -> Option<Vec<String>> {
    for field in fields {
        let ty: &Type = field.ty.under();
        if let Some(p) = ty.as_primitive() {
            if test(p) {
                return Some(vec![field.name.clone()]);
            }
        } else if let Some(inner) = ty.record_fields() {
            if let Some(mut path) = find_field(inner, test) {
                path.insert(0, field.name.clone());
                return Some(path);
            }
        }
    }
    None
}
