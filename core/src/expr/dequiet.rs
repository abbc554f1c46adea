use std::sync::Arc;

use crate::types::{Type, TypeContext, TypeKind};
use crate::value::{Value, build};
use crate::vector::{Any, Vector, apply};

use super::{Evaluator, map_values};

/// Removes `quiet` from the output of `expr`: record fields holding
/// `quiet` are dropped and a top-level `quiet` becomes `missing`.
pub struct Dequiet {
    ctx: Arc<TypeContext>,
    expr: Box<dyn Evaluator>,
}

impl Dequiet {
    pub fn new(ctx: Arc<TypeContext>, expr: Box<dyn Evaluator>) -> Self {
        Dequiet { ctx, expr }
    }
}

impl Evaluator for Dequiet {
    fn eval(&self, this: &Vector) -> Vector {
        let v = self.expr.eval(this);
        apply(
            false,
            &mut |args: &[Vector]| {
                let v = &args[0];
                if matches!(v, Vector::Null(_)) || !may_hold_error(&v.ty()) {
                    return v.clone();
                }
                map_values(v, |val| dequiet_value(&self.ctx, &val))
            },
            &[v],
        )
    }
}

/// Whether values of `ty` can contain an error anywhere inside.
fn may_hold_error(ty: &Type) -> bool {
    match ty.under().kind() {
        TypeKind::Error(_) => true,
        TypeKind::Record(fields) => fields.iter().any(|f| may_hold_error(&f.ty)),
        TypeKind::Union(members) => members.iter().any(may_hold_error),
        _ => false,
    }
}

pub fn dequiet_value(ctx: &TypeContext, val: &Value) -> Value {
    if val.is_quiet() {
        return ctx.missing();
    }
    let Some(entries) = val.record_entries() else {
        return val.clone();
    };
    if !entries.iter().any(|(_, v)| v.as_ref().is_some_and(has_quiet)) {
        return val.clone();
    }
    let fields: Vec<(String, Value)> = entries
        .into_iter()
        .filter_map(|(field, v)| {
            let v = v?;
            if v.is_quiet() {
                return None;
            }
            let v = if v.ty().is_record() {
                dequiet_value(ctx, &v)
            } else {
                v
            };
            Some((field.name.clone(), v))
        })
        .collect();
    build::record(ctx, fields).unwrap_or_else(|err| ctx.new_error(err))
}

fn has_quiet(val: &Value) -> bool {
    if val.is_quiet() {
        return true;
    }
    val.record_entries()
        .is_some_and(|entries| entries.iter().any(|(_, v)| v.as_ref().is_some_and(has_quiet)))
}
