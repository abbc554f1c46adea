use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use tracing::debug;

use crate::agg::AggOptions;
use crate::expr::DEFAULT_MAX_DEPTH;
use crate::types::TypeContext;

/// Tuning knobs shared by every operator of a query.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Values per batch produced by scanners and re-batching operators.
    pub batch_size: usize,
    /// Sum of value bytes sort buffers before spilling a run.
    pub sort_mem_max_bytes: usize,
    /// Sum of value bytes fuse buffers before spilling.
    pub fuse_mem_max_bytes: usize,
    pub collect_max_bytes: usize,
    /// Directory for spill files. `None` uses the system temp dir.
    pub spill_dir: Option<PathBuf>,
    pub max_udf_depth: usize,
    /// Bound of the channels between worker threads and their consumer.
    pub channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            batch_size: 512,
            sort_mem_max_bytes: 128 * 1024 * 1024,
            fuse_mem_max_bytes: 128 * 1024 * 1024,
            collect_max_bytes: 100 * 1024 * 1024,
            spill_dir: None,
            max_udf_depth: DEFAULT_MAX_DEPTH,
            channel_capacity: 2,
        }
    }
}

impl RuntimeOptions {
    pub fn agg_options(&self) -> AggOptions {
        AggOptions {
            collect_max_bytes: self.collect_max_bytes,
        }
    }
}

/// Signals cancellation to every blocked worker.
///
/// Cancelling drops the only sender of the `done` channel, so every
/// `select!` that includes a receive on [`CancelToken::done`] wakes up.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("query cancelled");
        }
        self.tx.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Becomes ready (disconnected) once the token is cancelled.
    pub fn done(&self) -> &Receiver<()> {
        &self.rx
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a query's operators share: the type context, the options
/// and the cancellation token.
#[derive(Clone)]
pub struct RuntimeContext {
    pub types: Arc<TypeContext>,
    pub options: Arc<RuntimeOptions>,
    cancel: CancelToken,
}

impl RuntimeContext {
    pub fn new(options: RuntimeOptions) -> Self {
        Self::with_type_context(Arc::new(TypeContext::new()), options)
    }

    pub fn with_type_context(types: Arc<TypeContext>, options: RuntimeOptions) -> Self {
        RuntimeContext {
            types,
            options: Arc::new(options),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn done(&self) -> &Receiver<()> {
        self.cancel.done()
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new(RuntimeOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;

    #[test]
    fn test_cancel_wakes_select() {
        let rctx = RuntimeContext::default();
        let (_tx, rx) = bounded::<u32>(1);
        let other = rctx.clone();
        let handle = std::thread::spawn(move || {
            select! {
                recv(rx) -> _ => false,
                recv(other.done()) -> _ => true,
            }
        });
        rctx.cancel();
        assert!(handle.join().unwrap());
        assert!(rctx.is_cancelled());
    }

    #[test]
    fn test_default_options() {
        let opts = RuntimeOptions::default();
        assert_eq!(opts.batch_size, 512);
        assert_eq!(opts.max_udf_depth, 10_000);
        assert_eq!(opts.channel_capacity, 2);
        assert!(opts.spill_dir.is_none());
    }
}
