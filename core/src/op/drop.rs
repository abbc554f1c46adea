use std::sync::Arc;

use crate::error::Result;
use crate::runtime::{Batch, Puller};
use crate::types::{Field, TypeContext};
use crate::value::Value;
use crate::value::build::record_of;
use crate::vector::from_values;

/// Removes fields by path. A nested record left with no fields is removed
/// from its parent; a value left with no fields at all is quiet and is not
/// emitted. Values that are not records pass through.
pub struct Dropper {
    ctx: Arc<TypeContext>,
    parent: Box<dyn Puller>,
    paths: Vec<Vec<String>>,
}

impl Dropper {
    pub fn new(ctx: Arc<TypeContext>, parent: Box<dyn Puller>, paths: Vec<Vec<String>>) -> Self {
        Dropper { ctx, parent, paths }
    }
}

/// `None` when every field was dropped.
fn drop_fields(ctx: &TypeContext, val: &Value, paths: &[&[String]]) -> Result<Option<Value>> {
    let val = val.under();
    let Some(entries) = val.record_entries() else {
        return Ok(Some(val));
    };
    let mut fields = Vec::with_capacity(entries.len());
    let mut vals = Vec::with_capacity(entries.len());
    for (field, v) in entries {
        let hits: Vec<&[String]> = paths
            .iter()
            .filter(|p| p[0] == field.name)
            .map(|p| &p[1..])
            .collect();
        if hits.iter().any(|p| p.is_empty()) {
            continue;
        }
        match v {
            Some(v) if !hits.is_empty() => {
                if let Some(v) = drop_fields(ctx, &v, &hits)? {
                    fields.push(Field::new(field.name.clone(), v.ty().clone()).with_opt(field.is_opt()));
                    vals.push(Some(v));
                }
            }
            v => {
                fields.push(field.clone());
                vals.push(v);
            }
        }
    }
    if fields.is_empty() {
        return Ok(None);
    }
    let ty = ctx.lookup_type_record(fields)?;
    Ok(Some(record_of(&ty, &vals)))
}

impl Puller for Dropper {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        let paths: Vec<&[String]> = self.paths.iter().map(Vec::as_slice).collect();
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                return Ok(None);
            };
            let mut out = Vec::with_capacity(batch.len() as usize);
            for val in batch.values() {
                if val.is_error() {
                    out.push(val);
                    continue;
                }
                if let Some(v) = drop_fields(&self.ctx, &val, &paths)? {
                    out.push(v);
                }
            }
            if !out.is_empty() {
                return Ok(Some(batch.derive(from_values(&out))));
            }
        }
    }
}
