use tracing::debug;

use crate::error::Result;
use crate::runtime::{Batch, Puller};
use crate::value::Value;

/// Where `load` writes its input. A loader sees every batch of a stream
/// and then commits them as a unit.
pub trait Loader: Send {
    fn write(&mut self, batch: &Batch) -> Result<()>;
    /// Ends the stream and returns a value describing what was loaded.
    fn commit(&mut self) -> Result<Value>;
    /// Drops everything written since the last commit.
    fn abort(&mut self);
}

/// Drains its parent into a [`Loader`] and emits the commit value.
pub struct Load {
    parent: Box<dyn Puller>,
    loader: Box<dyn Loader>,
    committed: bool,
}

impl Load {
    pub fn new(parent: Box<dyn Puller>, loader: Box<dyn Loader>) -> Self {
        Load {
            parent,
            loader,
            committed: false,
        }
    }
}

impl Puller for Load {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.loader.abort();
            self.committed = false;
            return self.parent.pull(true);
        }
        if self.committed {
            self.committed = false;
            return Ok(None);
        }
        let mut n = 0;
        while let Some(batch) = self.parent.pull(false)? {
            n += batch.len();
            if let Err(err) = self.loader.write(&batch) {
                self.loader.abort();
                return Err(err);
            }
        }
        let commit = self.loader.commit()?;
        debug!(values = n, "load: committed");
        self.committed = true;
        Ok(Some(Batch::from_values(&[commit])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Memory {
        pending: Vec<Value>,
        commits: u64,
    }

    impl Loader for Memory {
        fn write(&mut self, batch: &Batch) -> Result<()> {
            self.pending.extend(batch.values());
            Ok(())
        }

        fn commit(&mut self) -> Result<Value> {
            self.commits += 1;
            let n = self.pending.len() as u64;
            self.pending.clear();
            Ok(Value::uint64(n))
        }

        fn abort(&mut self) {
            self.pending.clear();
        }
    }

    #[test]
    fn test_load_emits_commit() {
        let scan = Box::new(ValuesScan::new((0..7).map(Value::int64).collect(), 3));
        let mut load = Load::new(scan, Box::new(Memory::default()));
        let out = collect_values(&mut load).unwrap();
        assert_eq!(out, vec![Value::uint64(7)]);
    }
}
