use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::types::{Type, TypeContext};
use crate::value::{Number, Value, equal};
use crate::vector::{Any, Dict, RecordField, Vector, apply, new_dynamic, pick, under};

use super::{Evaluator, This, map_slots, map_values};

/// `record.name`. Non-records and absent fields give `missing`; errors
/// pass through.
pub struct Dot {
    ctx: Arc<TypeContext>,
    record: Box<dyn Evaluator>,
    name: String,
    /// Field position by record type ID for this call site.
    fields: Mutex<HashMap<u32, Option<usize>>>,
}

impl Dot {
    pub fn new(ctx: Arc<TypeContext>, record: Box<dyn Evaluator>, name: impl Into<String>) -> Self {
        Dot {
            ctx,
            record,
            name: name.into(),
            fields: Mutex::new(HashMap::new()),
        }
    }

    /// `this.name`.
    pub fn field(ctx: Arc<TypeContext>, name: impl Into<String>) -> Self {
        Dot::new(ctx, Box::new(This), name)
    }

    /// `this.a.b.c`. An empty path is `this`.
    pub fn path<S: AsRef<str>>(ctx: &Arc<TypeContext>, path: &[S]) -> Box<dyn Evaluator> {
        path.iter().fold(Box::new(This) as Box<dyn Evaluator>, |rec, name| {
            Box::new(Dot::new(ctx.clone(), rec, name.as_ref()))
        })
    }

    fn field_index(&self, ty: &Type) -> Option<usize> {
        *self
            .fields
            .lock()
            .entry(ty.id())
            .or_insert_with(|| ty.field_index(&self.name))
    }

    fn eval_one(&self, v: &Vector) -> Vector {
        let v = under(v);
        if v.is_error() {
            return v;
        }
        let index = v.record_type().and_then(|ty| self.field_index(&ty));
        match index {
            Some(index) => field_vector(&self.ctx, &v, index),
            None => Vector::new_const(self.ctx.missing(), v.len()),
        }
    }
}

impl Evaluator for Dot {
    fn eval(&self, this: &Vector) -> Vector {
        let rec = self.record.eval(this);
        apply(true, &mut |args: &[Vector]| self.eval_one(&args[0]), &[rec])
    }
}

/// The column for field `index` of a record-typed vector. Absent optional
/// fields read as `missing`.
pub(crate) fn field_vector(ctx: &TypeContext, v: &Vector, index: usize) -> Vector {
    match v {
        Vector::Record(rec) => match &rec.fields[index] {
            RecordField::Plain(values) => values.clone(),
            RecordField::Optional(opt) => {
                let mut tags = Vec::with_capacity(rec.len as usize);
                let mut absent = 0;
                for slot in 0..rec.len {
                    if opt.slot(slot).is_some() {
                        tags.push(0);
                    } else {
                        tags.push(1);
                        absent += 1;
                    }
                }
                new_dynamic(
                    tags,
                    vec![opt.values.clone(), Vector::new_const(ctx.missing(), absent)],
                )
            }
        },
        Vector::View(view) => pick(&field_vector(ctx, &view.base, index), &view.index),
        Vector::Dict(d) => {
            let base = field_vector(ctx, &d.base, index);
            if base.is_dynamic() {
                let index: Vec<u32> = d.index.iter().map(|&i| i as u32).collect();
                pick(&base, &index)
            } else {
                Vector::Dict(Arc::new(Dict::new(base, d.index.clone())))
            }
        }
        Vector::Named(n) => field_vector(ctx, &n.inner, index),
        _ => map_values(v, |val| field_value(ctx, &val, index)),
    }
}

fn field_value(ctx: &TypeContext, val: &Value, index: usize) -> Value {
    let val = if val.ty().name().is_some() {
        val.retype(val.ty().under().clone())
    } else {
        val.clone()
    };
    let Some(fields) = val.ty().record_fields() else {
        return ctx.missing();
    };
    if val.is_null() {
        return Value::null_of(fields[index].ty.clone());
    }
    val.deref(&fields[index].name).unwrap_or_else(|| ctx.missing())
}

/// `container[index]` over arrays, sets (by position), maps (by key) and
/// records (by field name).
pub struct Index {
    ctx: Arc<TypeContext>,
    container: Box<dyn Evaluator>,
    index: Box<dyn Evaluator>,
    base1: bool,
}

impl Index {
    pub fn new(
        ctx: Arc<TypeContext>,
        container: Box<dyn Evaluator>,
        index: Box<dyn Evaluator>,
        base1: bool,
    ) -> Self {
        Index {
            ctx,
            container,
            index,
            base1,
        }
    }
}

impl Evaluator for Index {
    fn eval(&self, this: &Vector) -> Vector {
        let container = self.container.eval(this);
        let index = self.index.eval(this);
        map_slots(this.len(), |slot| {
            index_value(
                &self.ctx,
                &container.value(slot),
                &index.value(slot),
                self.base1,
            )
        })
    }
}

/// Resolves a possibly negative position against `len`.
pub(crate) fn position(i: i64, len: usize, base1: bool) -> Option<usize> {
    let i = if base1 {
        match i {
            0 => return None,
            i if i > 0 => i - 1,
            i => i,
        }
    } else {
        i
    };
    let i = if i < 0 { len as i64 + i } else { i };
    (0..len as i64).contains(&i).then_some(i as usize)
}

fn index_value(ctx: &TypeContext, container: &Value, index: &Value, base1: bool) -> Value {
    if container.is_error() {
        return container.clone();
    }
    if index.is_error() {
        return index.clone();
    }
    let container = container.under();
    if container.is_null() {
        return ctx.missing();
    }
    if let Some(elems) = container.elements() {
        let i = match Number::from_value(&index.under()) {
            Some(Number::Int(i)) => i,
            Some(Number::Uint(i)) => i as i64,
            _ => return ctx.wrap_error("index is not an integer", index),
        };
        return match position(i, elems.len(), base1) {
            Some(i) => elems[i].clone(),
            None => ctx.missing(),
        };
    }
    if let Some(entries) = container.map_entries() {
        let key = index.under();
        return entries
            .into_iter()
            .find(|(k, _)| equal(&k.under(), &key))
            .map(|(_, v)| v)
            .unwrap_or_else(|| ctx.missing());
    }
    if container.ty().is_record() {
        return match index.as_str() {
            Some(name) => container.deref(name).unwrap_or_else(|| ctx.missing()),
            None => ctx.wrap_error("record index is not a string", index),
        };
    }
    ctx.wrap_error("indexed value is not a container", &container)
}
