//! `fuse` and `shape`.

use tracing::debug;

use crate::error::Result;
use crate::expr::cast_value;
use crate::fuse::{Fuser, FuserReader, upcast};
use crate::runtime::{Batch, Puller, RuntimeContext};
use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recode {
    /// Lossless: introduces unions and optional fields as needed.
    Upcast,
    /// Casts each value to the supertype.
    Cast,
}

/// Buffers the whole stream, computing its supertype, then re-emits every
/// value recoded to it.
pub struct Fuse {
    rctx: RuntimeContext,
    parent: Box<dyn Puller>,
    recode: Recode,
    out: Option<(Type, FuserReader)>,
}

impl Fuse {
    pub fn new(rctx: RuntimeContext, parent: Box<dyn Puller>) -> Self {
        Self::with_recode(rctx, parent, Recode::Upcast)
    }

    /// Like [`Fuse::new`] but values are cast to the supertype.
    pub fn shape(rctx: RuntimeContext, parent: Box<dyn Puller>) -> Self {
        Self::with_recode(rctx, parent, Recode::Cast)
    }

    fn with_recode(rctx: RuntimeContext, parent: Box<dyn Puller>, recode: Recode) -> Self {
        Fuse {
            rctx,
            parent,
            recode,
            out: None,
        }
    }

    fn consume(&mut self) -> Result<Option<(Type, FuserReader)>> {
        let opts = &self.rctx.options;
        let mut fuser = Fuser::new(
            self.rctx.types.clone(),
            opts.fuse_mem_max_bytes,
            opts.spill_dir.clone(),
        );
        while let Some(batch) = self.parent.pull(false)? {
            for val in batch.values() {
                fuser.write(&val)?;
            }
        }
        let spilled = fuser.is_spilled();
        let (ty, reader) = fuser.finish()?;
        if let Some(ty) = &ty {
            debug!(%ty, spilled, "fuse: computed supertype");
        }
        Ok(ty.map(|ty| (ty, reader)))
    }

    fn recode(&self, ty: &Type, val: &Value) -> Value {
        match self.recode {
            Recode::Upcast => upcast(&self.rctx.types, val, ty),
            Recode::Cast => cast_value(&self.rctx.types, val, ty),
        }
    }
}

impl Puller for Fuse {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.out = None;
            return self.parent.pull(true);
        }
        if self.out.is_none() {
            match self.consume()? {
                Some(out) => self.out = Some(out),
                None => return Ok(None),
            }
        }
        let Some((ty, reader)) = self.out.as_mut() else {
            return Ok(None);
        };
        let ty = ty.clone();
        let batch_size = self.rctx.options.batch_size;
        let mut vals = Vec::with_capacity(batch_size);
        while vals.len() < batch_size {
            match reader.read()? {
                Some(val) => vals.push(val),
                None => break,
            }
        }
        if vals.is_empty() {
            // Dropping the reader removes any spill file.
            self.out = None;
            return Ok(None);
        }
        let vals: Vec<Value> = vals.iter().map(|v| self.recode(&ty, v)).collect();
        Ok(Some(Batch::from_values(&vals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::scan::ValuesScan;
    use crate::runtime::{RuntimeOptions, collect_values};
    use crate::value::build;
    use pretty_assertions::assert_eq;

    fn input(rctx: &RuntimeContext) -> Vec<Value> {
        let ctx = &rctx.types;
        vec![
            build::record(ctx, vec![("a".into(), Value::int64(1))]).unwrap(),
            build::record(ctx, vec![("b".into(), Value::string("x"))]).unwrap(),
            build::record(
                ctx,
                vec![("a".into(), Value::int64(2)), ("b".into(), Value::string("y"))],
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_fuse_heterogeneous_records() {
        let rctx = RuntimeContext::default();
        let scan = Box::new(ValuesScan::new(input(&rctx), 512));
        let mut fuse = Fuse::new(rctx, scan);
        let out = collect_values(&mut fuse).unwrap();
        let types: Vec<String> = out.iter().map(|v| v.ty().to_string()).collect();
        assert_eq!(types, vec!["{a:int64?,b:string?}"; 3]);
        let text: Vec<String> = out.iter().map(|v| v.to_string()).collect();
        assert_eq!(text, vec!["{a:1}", "{b:\"x\"}", "{a:2,b:\"y\"}"]);
        assert!(fuse.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_fuse_spills_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let opts = RuntimeOptions {
            fuse_mem_max_bytes: 1,
            batch_size: 2,
            spill_dir: Some(dir.path().to_path_buf()),
            ..RuntimeOptions::default()
        };
        let rctx = RuntimeContext::new(opts);
        let scan = Box::new(ValuesScan::new(input(&rctx), 512));
        let mut fuse = Fuse::new(rctx, scan);
        assert_eq!(collect_values(&mut fuse).unwrap().len(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
