use crate::fuse::fuse;
use crate::types::{Type, TypeContext};
use crate::value::Value;

use super::Aggregator;

/// The supertype of every input's type, as a type value. Type values are
/// context-free so the state is kept as a list until a context is at hand.
#[derive(Debug, Default)]
pub(super) struct FuseAgg {
    types: Vec<Type>,
    partials: Vec<Value>,
}

impl FuseAgg {
    fn fused(&mut self, ctx: &TypeContext) -> Option<Type> {
        for partial in self.partials.drain(..) {
            if let Some(ty) = partial.as_type(ctx) {
                self.types.push(ty);
            }
        }
        let mut it = self.types.iter();
        let first = it.next()?.clone();
        let ty = it.fold(first, |acc, ty| fuse(ctx, &acc, ty));
        self.types = vec![ty.clone()];
        Some(ty)
    }
}

impl Aggregator for FuseAgg {
    fn consume(&mut self, val: &Value) {
        if !self.types.contains(val.ty()) {
            self.types.push(val.ty().clone());
        }
    }

    fn consume_as_partial(&mut self, partial: &Value) {
        if !partial.is_null() {
            self.partials.push(partial.clone());
        }
    }

    fn result(&mut self, ctx: &TypeContext) -> Value {
        match self.fused(ctx) {
            Some(ty) => ctx.lookup_type_value(&ty),
            None => Value::null_of(Type::type_type()),
        }
    }

    fn result_as_partial(&mut self, ctx: &TypeContext) -> Value {
        self.result(ctx)
    }
}
