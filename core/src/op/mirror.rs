//! `mirror`: one input, a primary output and a best-effort copy.
//!
//! The primary output pulls the parent. Each batch is offered to the
//! mirrored output without blocking; when the mirror's channel is full
//! the batch is not mirrored and the primary path carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use tracing::trace;

use crate::error::{Error, Result};
use crate::runtime::{Batch, Puller, RuntimeContext};

const POLL: Duration = Duration::from_millis(10);

struct Shared {
    eos: AtomicBool,
    side_done: AtomicBool,
}

pub struct MirrorMain {
    parent: Box<dyn Puller>,
    tx: Sender<Batch>,
    shared: Arc<Shared>,
}

pub struct MirrorSide {
    rctx: RuntimeContext,
    rx: Receiver<Batch>,
    shared: Arc<Shared>,
}

/// Returns the primary and the mirrored output.
pub fn mirror(rctx: RuntimeContext, parent: Box<dyn Puller>) -> (MirrorMain, MirrorSide) {
    let (tx, rx) = bounded(rctx.options.channel_capacity.max(1));
    let shared = Arc::new(Shared {
        eos: AtomicBool::new(false),
        side_done: AtomicBool::new(false),
    });
    let main = MirrorMain {
        parent,
        tx,
        shared: shared.clone(),
    };
    let side = MirrorSide { rctx, rx, shared };
    (main, side)
}

impl Puller for MirrorMain {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.shared.eos.store(true, Ordering::SeqCst);
            return self.parent.pull(true);
        }
        let batch = self.parent.pull(false)?;
        match &batch {
            Some(b) if !self.shared.side_done.load(Ordering::SeqCst) => {
                match self.tx.try_send(b.clone()) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                    Err(TrySendError::Full(_)) => trace!("mirror: side is behind, skipping batch"),
                }
            }
            Some(_) => {}
            None => self.shared.eos.store(true, Ordering::SeqCst),
        }
        Ok(batch)
    }
}

impl Puller for MirrorSide {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.shared.side_done.store(true, Ordering::SeqCst);
            while self.rx.try_recv().is_ok() {}
            return Ok(None);
        }
        self.shared.side_done.store(false, Ordering::SeqCst);
        loop {
            match self.rx.try_recv() {
                Ok(batch) => return Ok(Some(batch)),
                Err(TryRecvError::Disconnected) => return Ok(None),
                Err(TryRecvError::Empty) => {}
            }
            if self.shared.eos.load(Ordering::SeqCst) {
                // Batches sent before end of stream are visible now.
                if let Ok(batch) = self.rx.try_recv() {
                    return Ok(Some(batch));
                }
                self.shared.eos.store(false, Ordering::SeqCst);
                return Ok(None);
            }
            if self.rctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.rx.recv_timeout(POLL) {
                Ok(batch) => return Ok(Some(batch)),
                Err(err) if err.is_disconnected() => return Ok(None),
                Err(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::scan::ValuesScan;
    use crate::runtime::{RuntimeOptions, collect_values};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn scan(n: i64) -> Box<dyn Puller> {
        Box::new(ValuesScan::new((0..n).map(Value::int64).collect(), 1))
    }

    #[test]
    fn test_mirror_sees_what_fits() {
        let rctx = RuntimeContext::new(RuntimeOptions {
            channel_capacity: 2,
            ..RuntimeOptions::default()
        });
        let (mut main, mut side) = mirror(rctx, scan(5));
        let out: Vec<i64> = collect_values(&mut main)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        let mirrored: Vec<i64> = collect_values(&mut side)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(mirrored, vec![0, 1]);
    }

    #[test]
    fn test_mirror_concurrent_consumer() {
        let rctx = RuntimeContext::default();
        let (mut main, mut side) = mirror(rctx, scan(50));
        let handle = std::thread::spawn(move || collect_values(&mut side).unwrap().len());
        assert_eq!(collect_values(&mut main).unwrap().len(), 50);
        assert!(handle.join().unwrap() <= 50);
    }
}
