//! Sources.

use crate::error::Result;
use crate::runtime::{Batch, Puller};
use crate::value::Value;

/// Emits a fixed list of values in batches of `batch_size`. Once the list
/// is exhausted, or the consumer is done, every pull returns end of
/// stream.
pub struct ValuesScan {
    vals: Vec<Value>,
    batch_size: usize,
    off: usize,
}

impl ValuesScan {
    pub fn new(vals: Vec<Value>, batch_size: usize) -> Self {
        ValuesScan {
            vals,
            batch_size: batch_size.max(1),
            off: 0,
        }
    }
}

impl Puller for ValuesScan {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.off = self.vals.len();
        }
        if self.off >= self.vals.len() {
            return Ok(None);
        }
        let end = (self.off + self.batch_size).min(self.vals.len());
        let batch = Batch::from_values(&self.vals[self.off..end]);
        self.off = end;
        Ok(Some(batch))
    }
}

/// Emits a single `null`, then end of stream, then starts over.
#[derive(Debug, Default)]
pub struct NullScan {
    sent: bool,
}

impl Puller for NullScan {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done || self.sent {
            self.sent = false;
            return Ok(None);
        }
        self.sent = true;
        Ok(Some(Batch::from_values(&[Value::null()])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::collect_values;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_values_scan_batches() {
        let vals: Vec<Value> = (0..5).map(Value::int64).collect();
        let mut scan = ValuesScan::new(vals.clone(), 2);
        assert_eq!(scan.pull(false).unwrap().unwrap().len(), 2);
        assert_eq!(collect_values(&mut scan).unwrap(), vals[2..].to_vec());
        assert!(scan.pull(false).unwrap().is_none());
        assert!(scan.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_values_scan_done() {
        let mut scan = ValuesScan::new(vec![Value::int64(1), Value::int64(2)], 1);
        assert!(scan.pull(true).unwrap().is_none());
        assert!(scan.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_null_scan_restarts() {
        let mut scan = NullScan::default();
        assert_eq!(collect_values(&mut scan).unwrap(), vec![Value::null()]);
        assert_eq!(collect_values(&mut scan).unwrap(), vec![Value::null()]);
    }
}
