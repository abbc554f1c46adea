use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::runtime::spill::{SpillReader, SpillWriter};
use crate::types::{Type, TypeContext};
use crate::value::Value;

use super::fuse;

/// Buffers values while computing their supertype. Once the buffered
/// bytes pass `mem_max` every value goes to a spill file instead.
pub struct Fuser {
    ctx: Arc<TypeContext>,
    mem_max: usize,
    spill_dir: Option<PathBuf>,
    ty: Option<Type>,
    vals: Vec<Value>,
    nbytes: usize,
    spill: Option<SpillWriter>,
}

impl Fuser {
    pub fn new(ctx: Arc<TypeContext>, mem_max: usize, spill_dir: Option<PathBuf>) -> Self {
        Fuser {
            ctx,
            mem_max,
            spill_dir,
            ty: None,
            vals: Vec::new(),
            nbytes: 0,
            spill: None,
        }
    }

    pub fn write(&mut self, val: &Value) -> Result<()> {
        self.ty = Some(match &self.ty {
            Some(ty) => fuse(&self.ctx, ty, val.ty()),
            None => val.ty().clone(),
        });
        if let Some(spill) = &mut self.spill {
            return spill.write(val);
        }
        self.nbytes += val.size();
        self.vals.push(val.clone());
        if self.nbytes > self.mem_max {
            self.spill_buffer()?;
        }
        Ok(())
    }

    fn spill_buffer(&mut self) -> Result<()> {
        let mut spill = SpillWriter::create(self.spill_dir.as_deref())?;
        debug!(values = self.vals.len(), bytes = self.nbytes, "fuser spilling");
        for val in self.vals.drain(..) {
            spill.write(&val)?;
        }
        self.nbytes = 0;
        self.spill = Some(spill);
        Ok(())
    }

    pub fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    /// The supertype of everything written so far.
    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    /// Ends the write phase. Returns the supertype (`None` when nothing
    /// was written) and a reader over the values in write order.
    pub fn finish(mut self) -> Result<(Option<Type>, FuserReader)> {
        let source = match self.spill.take() {
            Some(spill) => Source::Spill(spill.finish(self.ctx.clone())?),
            None => Source::Memory(std::mem::take(&mut self.vals).into_iter()),
        };
        Ok((self.ty, FuserReader { source }))
    }
}

enum Source {
    Memory(std::vec::IntoIter<Value>),
    Spill(SpillReader),
}

pub struct FuserReader {
    source: Source,
}

impl FuserReader {
    pub fn read(&mut self) -> Result<Option<Value>> {
        match &mut self.source {
            Source::Memory(it) => Ok(it.next()),
            Source::Spill(r) => r.read(),
        }
    }
}
