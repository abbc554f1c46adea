use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{Field, Type, TypeContext};
use crate::value::{Value, build};
use crate::vector::{Any, Record, RecordField, Vector, apply};

use super::{Evaluator, map_slots};

pub enum RecordElem {
    Field(String, Box<dyn Evaluator>),
    /// `...expr`: copies every field of a record value.
    Spread(Box<dyn Evaluator>),
}

/// Builds a record per slot. A later element overwrites an earlier field of
/// the same name in place.
pub struct RecordExpr {
    ctx: Arc<TypeContext>,
    elems: Vec<RecordElem>,
    /// Output field names and the output position of each element, when
    /// there are no spreads.
    layout: Option<(Vec<String>, Vec<usize>)>,
    last: Mutex<Option<(Vec<Type>, Type)>>,
}

impl RecordExpr {
    pub fn new(ctx: Arc<TypeContext>, elems: Vec<RecordElem>) -> Self {
        let layout = elems
            .iter()
            .try_fold((Vec::new(), Vec::new()), |(mut names, mut slots), elem| {
                let RecordElem::Field(name, _) = elem else {
                    return None;
                };
                let pos = names.iter().position(|n| n == name).unwrap_or_else(|| {
                    names.push(name.clone());
                    names.len() - 1
                });
                slots.push(pos);
                Some((names, slots))
            });
        RecordExpr {
            ctx,
            elems,
            layout,
            last: Mutex::new(None),
        }
    }

    fn record_type(&self, names: &[String], cols: &[Vector]) -> crate::error::Result<Type> {
        let types: Vec<Type> = cols.iter().map(|c| c.ty()).collect();
        let mut last = self.last.lock();
        if let Some((prev, ty)) = last.as_ref() {
            if *prev == types {
                return Ok(ty.clone());
            }
        }
        let ty = self.ctx.lookup_type_record(
            names
                .iter()
                .zip(&types)
                .map(|(name, ty)| Field::new(name.clone(), ty.clone()))
                .collect(),
        )?;
        *last = Some((types, ty.clone()));
        Ok(ty)
    }

    fn eval_spread(&self, vals: &[Vector], n: u32) -> Vector {
        map_slots(n, |slot| {
            let mut entries: Vec<(String, Value)> = Vec::new();
            let mut upsert = |name: &str, val: Value| {
                match entries.iter_mut().find(|(n, _)| n == name) {
                    Some(entry) => entry.1 = val,
                    None => entries.push((name.to_string(), val)),
                }
            };
            for (elem, vec) in self.elems.iter().zip(vals) {
                match elem {
                    RecordElem::Field(name, _) => upsert(name, vec.value(slot)),
                    RecordElem::Spread(_) => {
                        let rec = vec.value(slot).under();
                        for (field, val) in rec.record_entries().unwrap_or_default() {
                            if let Some(val) = val {
                                upsert(&field.name, val);
                            }
                        }
                    }
                }
            }
            build::record(&self.ctx, entries).unwrap_or_else(|err| self.ctx.new_error(err))
        })
    }
}

impl Evaluator for RecordExpr {
    fn eval(&self, this: &Vector) -> Vector {
        let n = this.len();
        let vals: Vec<Vector> = self
            .elems
            .iter()
            .map(|elem| match elem {
                RecordElem::Field(_, e) | RecordElem::Spread(e) => e.eval(this),
            })
            .collect();
        let Some((names, slots)) = &self.layout else {
            return self.eval_spread(&vals, n);
        };
        let mut cols = vec![Vector::Null(n); names.len()];
        for (pos, val) in slots.iter().zip(vals) {
            cols[*pos] = val;
        }
        if cols.is_empty() {
            return record_vector(&self.ctx, &[], &[], n);
        }
        apply(
            false,
            &mut |cols: &[Vector]| {
                let n = cols[0].len();
                match self.record_type(names, cols) {
                    Ok(ty) => Vector::Record(Arc::new(Record::new(
                        ty,
                        n,
                        cols.iter().cloned().map(RecordField::Plain).collect(),
                        None,
                    ))),
                    Err(err) => Vector::new_const(self.ctx.new_error(err), n),
                }
            },
            &cols,
        )
    }
}

/// A record vector with field `names[i]` taken from `cols[i]`. Dynamic
/// columns split the result into one record type per combination.
pub(crate) fn record_vector(ctx: &TypeContext, names: &[String], cols: &[Vector], n: u32) -> Vector {
    if cols.is_empty() {
        return match ctx.lookup_type_record(Vec::new()) {
            Ok(ty) => Vector::Record(Arc::new(Record::new(ty, n, Vec::new(), None))),
            Err(err) => Vector::new_const(ctx.new_error(err), n),
        };
    }
    apply(
        false,
        &mut |cols: &[Vector]| {
            let n = cols[0].len();
            let fields = names
                .iter()
                .zip(cols)
                .map(|(name, col)| Field::new(name.clone(), col.ty()))
                .collect();
            match ctx.lookup_type_record(fields) {
                Ok(ty) => Vector::Record(Arc::new(Record::new(
                    ty,
                    n,
                    cols.iter().cloned().map(RecordField::Plain).collect(),
                    None,
                ))),
                Err(err) => Vector::new_const(ctx.new_error(err), n),
            }
        },
        cols,
    )
}
