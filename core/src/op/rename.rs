use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::runtime::{Batch, Puller};
use crate::types::{Field, Type, TypeContext};
use crate::value::Value;
use crate::vector::from_values;

/// Renames fields in place. Values keep their bytes; only the record type
/// changes, and it is computed once per input type.
pub struct Rename {
    ctx: Arc<TypeContext>,
    parent: Box<dyn Puller>,
    srcs: Vec<Vec<String>>,
    dsts: Vec<Vec<String>>,
    types: HashMap<Type, core::result::Result<Type, String>>,
}

impl Rename {
    /// Each source and destination must share every segment but the last.
    pub fn new(
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        srcs: Vec<Vec<String>>,
        dsts: Vec<Vec<String>>,
    ) -> Result<Self> {
        if srcs.len() != dsts.len() {
            return Err(Error::compile("rename: mismatched source and destination lists"));
        }
        for (src, dst) in srcs.iter().zip(&dsts) {
            let n = src.len();
            if n == 0 || dst.len() != n || src[..n - 1] != dst[..n - 1] {
                return Err(Error::compile(format!(
                    "rename: left-hand side and right-hand side must have the same depth ({} vs {})",
                    dst.join("."),
                    src.join(".")
                )));
            }
        }
        Ok(Rename {
            ctx,
            parent,
            srcs,
            dsts,
            types: HashMap::new(),
        })
    }

    fn renamed_type(&mut self, ty: &Type) -> core::result::Result<Type, String> {
        if let Some(out) = self.types.get(ty) {
            return out.clone();
        }
        let mut out = Ok(ty.clone());
        for (src, dst) in self.srcs.iter().zip(&self.dsts) {
            out = out.and_then(|ty| rename_in(&self.ctx, &ty, src, &dst[dst.len() - 1]));
        }
        self.types.insert(ty.clone(), out.clone());
        out
    }
}

/// Renames the field at `path` to `name`. A path that does not resolve
/// leaves the type unchanged.
fn rename_in(
    ctx: &TypeContext,
    ty: &Type,
    path: &[String],
    name: &str,
) -> core::result::Result<Type, String> {
    let Some(fields) = ty.record_fields() else {
        return Ok(ty.clone());
    };
    let Some(index) = fields.iter().position(|f| f.name == path[0]) else {
        return Ok(ty.clone());
    };
    let mut fields: Vec<Field> = fields.to_vec();
    if path.len() == 1 {
        if fields.iter().any(|f| f.name == name) && name != path[0] {
            return Err(format!("rename: duplicate field: \"{name}\""));
        }
        fields[index].name = name.to_string();
    } else {
        let inner = rename_in(ctx, &fields[index].ty, &path[1..], name)?;
        if inner == fields[index].ty {
            return Ok(ty.clone());
        }
        fields[index].ty = inner;
    }
    ctx.lookup_type_record(fields).map_err(|err| err.to_string())
}

impl Puller for Rename {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        let Some(batch) = self.parent.pull(false)? else {
            return Ok(None);
        };
        let out: Vec<Value> = batch
            .values()
            .into_iter()
            .map(|val| {
                if val.is_error() {
                    return val;
                }
                let val = val.under();
                if !val.ty().is_record() {
                    return self.ctx.wrap_error("rename: not a record", &val);
                }
                match self.renamed_type(val.ty()) {
                    Ok(ty) => val.retype(ty),
                    Err(msg) => self.ctx.wrap_error(&msg, &val),
                }
            })
            .collect();
        Ok(Some(batch.derive(from_values(&out))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::value::build;
    use pretty_assertions::assert_eq;

    fn path(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    fn rec(ctx: &TypeContext, fields: Vec<(&str, Value)>) -> Value {
        build::record(ctx, fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect()).unwrap()
    }

    #[test]
    fn test_rename_keeps_position() {
        let ctx = Arc::new(TypeContext::new());
        let r = rec(&ctx, vec![("x", Value::int64(1))]);
        let input = vec![
            rec(&ctx, vec![("a", Value::int64(1)), ("r", r), ("b", Value::int64(2))]),
            rec(&ctx, vec![("a", Value::int64(1)), ("c", Value::int64(3))]),
            Value::string("s"),
        ];
        let scan = Box::new(ValuesScan::new(input, 512));
        let mut rename = Rename::new(
            ctx.clone(),
            scan,
            vec![path("a"), path("r.x")],
            vec![path("z"), path("r.y")],
        )
        .unwrap();
        let out: Vec<String> = collect_values(&mut rename)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(
            out,
            vec![
                "{z:1,r:{y:1},b:2}",
                "{z:1,c:3}",
                "error({message:\"rename: not a record\",on:\"s\"})",
            ]
        );
    }

    #[test]
    fn test_rename_validation() {
        let ctx = Arc::new(TypeContext::new());
        let scan = || Box::new(ValuesScan::new(vec![], 512));
        assert!(Rename::new(ctx.clone(), scan(), vec![path("a.b")], vec![path("c")]).is_err());
        assert!(Rename::new(ctx.clone(), scan(), vec![path("a.b")], vec![path("c.b")]).is_err());
        assert!(Rename::new(ctx, scan(), vec![path("a.b")], vec![path("a.c")]).is_ok());
    }

    #[test]
    fn test_rename_duplicate() {
        let ctx = Arc::new(TypeContext::new());
        let input = vec![rec(&ctx, vec![("a", Value::int64(1)), ("b", Value::int64(2))])];
        let scan = Box::new(ValuesScan::new(input, 512));
        let mut rename = Rename::new(ctx, scan, vec![path("a")], vec![path("b")]).unwrap();
        let out = collect_values(&mut rename).unwrap();
        assert!(out[0].is_error());
    }
}
