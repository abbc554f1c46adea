//! `head`, `tail` and `skip`.

use std::collections::VecDeque;

use crate::error::Result;
use crate::runtime::{Batch, Puller};
use crate::value::Value;
use crate::vector::{Any, pick};

/// Passes the first `limit` values of each stream, then cancels the
/// parent's current stream.
pub struct Head {
    parent: Box<dyn Puller>,
    limit: usize,
    count: usize,
}

impl Head {
    pub fn new(parent: Box<dyn Puller>, limit: usize) -> Self {
        Head {
            parent,
            limit,
            count: 0,
        }
    }
}

impl Puller for Head {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.count = 0;
            return self.parent.pull(true);
        }
        if self.count >= self.limit {
            self.count = 0;
            // The parent may still be mid-stream.
            self.parent.pull(true)?;
            return Ok(None);
        }
        let Some(batch) = self.parent.pull(false)? else {
            self.count = 0;
            return Ok(None);
        };
        let remaining = self.limit - self.count;
        if (batch.len() as usize) <= remaining {
            self.count += batch.len() as usize;
            return Ok(Some(batch));
        }
        self.count = self.limit;
        let index: Vec<u32> = (0..remaining as u32).collect();
        Ok(Some(batch.derive(pick(batch.vector(), &index))))
    }
}

/// Buffers the last `limit` values and emits them at end of stream.
pub struct Tail {
    parent: Box<dyn Puller>,
    limit: usize,
    batch_size: usize,
    pending: Option<VecDeque<Value>>,
}

impl Tail {
    pub fn new(parent: Box<dyn Puller>, limit: usize, batch_size: usize) -> Self {
        Tail {
            parent,
            limit,
            batch_size: batch_size.max(1),
            pending: None,
        }
    }
}

impl Puller for Tail {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.pending = None;
            return self.parent.pull(true);
        }
        if self.pending.is_none() {
            let mut buf = VecDeque::with_capacity(self.limit);
            while let Some(batch) = self.parent.pull(false)? {
                for val in batch.values() {
                    if buf.len() == self.limit {
                        buf.pop_front();
                    }
                    if self.limit > 0 {
                        buf.push_back(val);
                    }
                }
            }
            self.pending = Some(buf);
        }
        let Some(buf) = self.pending.as_mut() else {
            return Ok(None);
        };
        if buf.is_empty() {
            self.pending = None;
            return Ok(None);
        }
        let n = buf.len().min(self.batch_size);
        let vals: Vec<Value> = buf.drain(..n).collect();
        Ok(Some(Batch::from_values(&vals)))
    }
}

/// Drops the first `count` values of each stream.
pub struct Skip {
    parent: Box<dyn Puller>,
    count: usize,
    skipped: usize,
}

impl Skip {
    pub fn new(parent: Box<dyn Puller>, count: usize) -> Self {
        Skip {
            parent,
            count,
            skipped: 0,
        }
    }
}

impl Puller for Skip {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.skipped = 0;
            return self.parent.pull(true);
        }
        loop {
            let Some(batch) = self.parent.pull(false)? else {
                self.skipped = 0;
                return Ok(None);
            };
            let n = batch.len() as usize;
            let drop = (self.count - self.skipped).min(n);
            self.skipped += drop;
            if drop == 0 {
                return Ok(Some(batch));
            }
            if drop < n {
                let index: Vec<u32> = (drop as u32..n as u32).collect();
                return Ok(Some(batch.derive(pick(batch.vector(), &index))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use pretty_assertions::assert_eq;

    fn scan(n: i64) -> Box<dyn Puller> {
        Box::new(ValuesScan::new((0..n).map(Value::int64).collect(), 3))
    }

    fn ints(vals: Vec<Value>) -> Vec<i64> {
        vals.iter().filter_map(Value::as_i64).collect()
    }

    #[test]
    fn test_head() {
        let mut head = Head::new(scan(10), 4);
        assert_eq!(ints(collect_values(&mut head).unwrap()), vec![0, 1, 2, 3]);
        assert!(head.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_tail() {
        let mut tail = Tail::new(scan(10), 4, 512);
        assert_eq!(ints(collect_values(&mut tail).unwrap()), vec![6, 7, 8, 9]);
        let mut tail = Tail::new(scan(2), 4, 512);
        assert_eq!(ints(collect_values(&mut tail).unwrap()), vec![0, 1]);
    }

    #[test]
    fn test_skip() {
        let mut skip = Skip::new(scan(6), 4);
        assert_eq!(ints(collect_values(&mut skip).unwrap()), vec![4, 5]);
    }
}
