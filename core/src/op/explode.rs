use std::sync::Arc;

use crate::error::Result;
use crate::expr::{Evaluator, Resetters};
use crate::runtime::{Batch, Puller};
use crate::types::{Type, TypeContext, TypeKind};
use crate::value::{Value, build};
use crate::vector::{Any, Vector, from_values};

/// Emits `{<name>: v}` for every value `v` of type `ty` found anywhere
/// inside the results of `exprs`.
pub struct Explode {
    ctx: Arc<TypeContext>,
    parent: Box<dyn Puller>,
    exprs: Vec<Box<dyn Evaluator>>,
    ty: Type,
    name: String,
    resetters: Resetters,
}

impl Explode {
    pub fn new(
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        exprs: Vec<Box<dyn Evaluator>>,
        ty: Type,
        name: impl Into<String>,
        resetters: Resetters,
    ) -> Self {
        Explode {
            ctx,
            parent,
            exprs,
            ty,
            name: name.into(),
            resetters,
        }
    }
}

fn walk(val: &Value, ty: &Type, out: &mut Vec<Value>) {
    if val.ty() == ty {
        out.push(val.clone());
        return;
    }
    match val.ty().under().kind() {
        TypeKind::Record(_) => {
            let rec = val.under();
            for v in rec.record_entries().unwrap_or_default().into_iter().filter_map(|(_, v)| v) {
                walk(&v, ty, out);
            }
        }
        TypeKind::Array(_) | TypeKind::Set(_) => {
            for v in val.under().elements().unwrap_or_default() {
                walk(&v, ty, out);
            }
        }
        TypeKind::Map(_, _) => {
            for (k, v) in val.under().map_entries().unwrap_or_default() {
                walk(&k, ty, out);
                walk(&v, ty, out);
            }
        }
        TypeKind::Union(_) => walk(&val.under(), ty, out),
        _ => {}
    }
}

impl Puller for Explode {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                self.resetters.reset();
                return Ok(None);
            };
            let this = batch.vector();
            let cols: Vec<Vector> = self.exprs.iter().map(|e| e.eval(this)).collect();
            let mut found = Vec::new();
            for slot in 0..this.len() {
                for col in &cols {
                    walk(&col.value(slot), &self.ty, &mut found);
                }
            }
            let out: Vec<Value> = found
                .into_iter()
                .map(|v| {
                    build::record(&self.ctx, vec![(self.name.clone(), v)])
                        .unwrap_or_else(|err| self.ctx.new_error(err))
                })
                .collect();
            if !out.is_empty() {
                return Ok(Some(batch.derive(from_values(&out))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::This;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_explode_by_type() {
        let ctx = Arc::new(TypeContext::new());
        let xs = build::array(&ctx, &[Value::string("a"), Value::string("b")]);
        let val = build::record(
            &ctx,
            vec![
                ("n".into(), Value::int64(1)),
                ("s".into(), Value::string("c")),
                ("xs".into(), xs),
            ],
        )
        .unwrap();
        let scan = Box::new(ValuesScan::new(vec![val], 512));
        let mut explode = Explode::new(
            ctx,
            scan,
            vec![Box::new(This)],
            Type::string(),
            "s",
            Resetters::new(),
        );
        let out: Vec<String> = collect_values(&mut explode)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(out, vec!["{s:\"c\"}", "{s:\"a\"}", "{s:\"b\"}"]);
    }
}
