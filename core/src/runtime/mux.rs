//! Merges parallel parents into one labelled stream.
//!
//! Each parent is pulled by its own worker thread. A worker forwards
//! batches tagged with its label and ends each stream with an
//! end-of-channel marker. Markers never leave the mux: the consumer sees
//! labelled batches and a single end of stream once every parent is done.
//!
//! Workers live across streams. `pull(true)` and drop close the control
//! channels and join every worker, which hands its parent back; a later
//! pull starts a fresh set of workers.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, never, select};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::{Batch, Puller, RuntimeContext};

const JOIN_POLL: Duration = Duration::from_millis(1);

enum Msg {
    Batch(usize, Batch),
    /// End of channel: the parent reached end of stream.
    Eoc(usize),
    Err(Error),
}

pub(crate) enum Event {
    Batch(usize, Batch),
    /// The parent with this label reached end of stream.
    Eoc(usize),
}

/// Start pulling a new stream. Closing the channel stops the worker.
struct Go;

struct Worker {
    ctl: Sender<Go>,
    handle: JoinHandle<Box<dyn Puller>>,
}

pub struct Mux {
    rctx: RuntimeContext,
    width: usize,
    /// Parents not currently owned by a worker.
    idle: Vec<Box<dyn Puller>>,
    workers: Vec<Worker>,
    out: Receiver<Msg>,
    running: bool,
    live: usize,
}

impl Mux {
    pub fn new(rctx: RuntimeContext, parents: Vec<Box<dyn Puller>>) -> Result<Self> {
        let mut mux = Mux {
            rctx,
            width: parents.len(),
            idle: parents,
            workers: Vec::new(),
            out: never(),
            running: false,
            live: 0,
        };
        mux.spawn()?;
        Ok(mux)
    }

    pub fn len(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    fn spawn(&mut self) -> Result<()> {
        if !self.workers.is_empty() || self.idle.is_empty() {
            return Ok(());
        }
        let (out_tx, out) = bounded(self.rctx.options.channel_capacity);
        for (label, parent) in std::mem::take(&mut self.idle).into_iter().enumerate() {
            let (ctl, ctl_rx) = bounded(1);
            let out_tx = out_tx.clone();
            let wctx = self.rctx.clone();
            let handle = thread::Builder::new()
                .name(format!("sluice-mux-{}", label))
                .spawn(move || run_worker(wctx, label, parent, ctl_rx, out_tx))?;
            self.workers.push(Worker { ctl, handle });
        }
        self.out = out;
        Ok(())
    }

    /// Closes every control channel and joins the workers as they finish,
    /// taking their parents back. With `cancel`, each parent is pulled
    /// with `done` as soon as it is back, which releases siblings that wait
    /// on it (a mirror's copy waits on its primary). Returns the first
    /// error seen, preferring one a worker left queued.
    fn stop(&mut self, cancel: bool) -> Option<Error> {
        let mut first_err = None;
        if self.workers.is_empty() {
            if cancel {
                for parent in &mut self.idle {
                    if let Err(err) = parent.pull(true) {
                        first_err.get_or_insert(err);
                    }
                }
            }
            return first_err;
        }
        debug!(workers = self.workers.len(), cancel, "mux: stopping workers");
        let mut pending: Vec<(usize, JoinHandle<Box<dyn Puller>>)> = std::mem::take(&mut self.workers)
            .into_iter()
            .enumerate()
            .map(|(label, Worker { ctl, handle })| {
                drop(ctl);
                (label, handle)
            })
            .collect();
        let mut parents: Vec<Option<Box<dyn Puller>>> = (0..pending.len()).map(|_| None).collect();
        let mut errs = Vec::new();
        while !pending.is_empty() {
            let mut joined = false;
            let mut i = 0;
            while i < pending.len() {
                if !pending[i].1.is_finished() {
                    i += 1;
                    continue;
                }
                let (label, handle) = pending.swap_remove(i);
                joined = true;
                match handle.join() {
                    Ok(mut parent) => {
                        if cancel {
                            if let Err(err) = parent.pull(true) {
                                errs.push(err);
                            }
                        }
                        parents[label] = Some(parent);
                    }
                    Err(_) => errs.push(Error::Internal("mux worker panicked".into())),
                }
            }
            if !joined {
                thread::sleep(JOIN_POLL);
            }
        }
        for msg in self.out.try_iter() {
            if let Msg::Err(err) = msg {
                first_err.get_or_insert(err);
            }
        }
        if first_err.is_none() {
            first_err = errs.into_iter().next();
        }
        self.idle = parents.into_iter().flatten().collect();
        self.out = never();
        self.running = false;
        first_err
    }

    fn recv(&self) -> Result<Msg> {
        select! {
            recv(self.out) -> msg => match msg {
                Ok(msg) => Ok(msg),
                Err(_) if self.rctx.is_cancelled() => Err(self.pending_err()),
                Err(_) => Err(Error::Internal("mux workers exited".into())),
            },
            recv(self.rctx.done()) -> _ => Err(self.pending_err()),
        }
    }

    /// After cancellation: a queued worker error if there is one, else
    /// `Cancelled`.
    fn pending_err(&self) -> Error {
        self.out
            .try_iter()
            .find_map(|msg| match msg {
                Msg::Err(err) => Some(err),
                _ => None,
            })
            .unwrap_or(Error::Cancelled)
    }

    fn send_go(&self, label: usize) -> Result<()> {
        select! {
            send(self.workers[label].ctl, Go) -> r => r.map_err(|_| Error::Internal("mux worker exited".into())),
            recv(self.rctx.done()) -> _ => Err(Error::Cancelled),
        }
    }

    /// The next batch and the index of the parent it came from.
    pub fn pull_labeled(&mut self, done: bool) -> Result<Option<(usize, Batch)>> {
        if done {
            return self.cancel().map(|_| None);
        }
        loop {
            match self.next_event()? {
                Some(Event::Batch(label, batch)) => return Ok(Some((label, batch))),
                Some(Event::Eoc(_)) => {}
                None => return Ok(None),
            }
        }
    }

    /// Like [`Mux::pull_labeled`] but also reports each parent's end of
    /// stream. `None` once every parent has ended.
    pub(crate) fn next_event(&mut self) -> Result<Option<Event>> {
        if !self.running {
            self.spawn()?;
            for label in 0..self.workers.len() {
                self.send_go(label)?;
            }
            self.running = true;
            self.live = self.workers.len();
        }
        while self.live > 0 {
            match self.recv()? {
                Msg::Batch(label, batch) => {
                    trace!(label, len = batch.len(), "mux: batch");
                    return Ok(Some(Event::Batch(label, batch)));
                }
                Msg::Eoc(label) => {
                    trace!(label, "mux: end of channel");
                    self.live -= 1;
                    return Ok(Some(Event::Eoc(label)));
                }
                Msg::Err(err) => {
                    self.running = false;
                    return Err(err);
                }
            }
        }
        self.running = false;
        Ok(None)
    }

    /// Stops every worker and cancels each parent's stream. Returns once
    /// no worker thread is left.
    pub(crate) fn cancel(&mut self) -> Result<()> {
        debug!(parents = self.width, "mux: cancelling");
        match self.stop(true) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Mux {
    fn drop(&mut self) {
        let running = self.running;
        if let Some(err) = self.stop(running) {
            debug!(error = %err, "mux: worker error at drop");
        }
    }
}

impl Puller for Mux {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        Ok(self.pull_labeled(done)?.map(|(_, batch)| batch))
    }
}

fn run_worker(
    rctx: RuntimeContext,
    label: usize,
    mut parent: Box<dyn Puller>,
    ctl: Receiver<Go>,
    out: Sender<Msg>,
) -> Box<dyn Puller> {
    debug!(label, "mux worker starting");
    'streams: loop {
        let go = select! {
            recv(ctl) -> cmd => cmd.is_ok(),
            recv(rctx.done()) -> _ => false,
        };
        if !go {
            break;
        }
        loop {
            let (msg, end) = match parent.pull(false) {
                Ok(Some(batch)) => (Msg::Batch(label, batch), false),
                Ok(None) => (Msg::Eoc(label), true),
                Err(err) => (Msg::Err(err), true),
            };
            let sent = select! {
                send(out, msg) -> r => r.is_ok(),
                recv(ctl) -> _ => false,
                recv(rctx.done()) -> _ => false,
            };
            if !sent {
                break 'streams;
            }
            if end {
                break;
            }
        }
    }
    debug!(label, "mux worker stopping");
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    /// Emits one batch, then blocks until the query is cancelled.
    struct Stall {
        rctx: RuntimeContext,
        sent: bool,
    }

    impl Puller for Stall {
        fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
            if done {
                return Ok(None);
            }
            if !self.sent {
                self.sent = true;
                return Ok(Some(Batch::from_values(&[Value::int64(1)])));
            }
            let _ = self.rctx.done().recv();
            Err(Error::Cancelled)
        }
    }

    #[test]
    fn test_cancel_unblocks_consumer() {
        let rctx = RuntimeContext::default();
        let stall = Stall {
            rctx: rctx.clone(),
            sent: false,
        };
        let mut mux = Mux::new(rctx.clone(), vec![Box::new(stall)]).unwrap();
        let (label, batch) = mux.pull_labeled(false).unwrap().unwrap();
        assert_eq!((label, batch.values()), (0, vec![Value::int64(1)]));
        let canceller = rctx.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            canceller.cancel();
        });
        let err = mux.pull_labeled(false).unwrap_err();
        assert!(err.is_cancelled());
        handle.join().unwrap();
    }

    #[test]
    fn test_events_report_each_end_of_stream() {
        let rctx = RuntimeContext::default();
        let parents: Vec<Box<dyn Puller>> = vec![
            Box::new(crate::op::scan::ValuesScan::new(vec![Value::int64(1)], 1)),
            Box::new(crate::op::scan::ValuesScan::new(vec![], 1)),
        ];
        let mut mux = Mux::new(rctx, parents).unwrap();
        let mut eocs = Vec::new();
        let mut batches = 0;
        while let Some(event) = mux.next_event().unwrap() {
            match event {
                Event::Batch(..) => batches += 1,
                Event::Eoc(label) => eocs.push(label),
            }
        }
        eocs.sort();
        assert_eq!((batches, eocs), (1, vec![0, 1]));
    }

    fn scans(n: usize, len: i64) -> Vec<Box<dyn Puller>> {
        (0..n)
            .map(|_| {
                let vals = (0..len).map(Value::int64).collect();
                Box::new(crate::op::scan::ValuesScan::new(vals, 1)) as Box<dyn Puller>
            })
            .collect()
    }

    /// Every worker holds a clone of the context, so the strong count of
    /// its options tracks the number of live workers.
    fn live_workers(rctx: &RuntimeContext) -> usize {
        std::sync::Arc::strong_count(&rctx.options) - 2
    }

    #[test]
    fn test_done_joins_every_worker() {
        let rctx = RuntimeContext::default();
        let mut mux = Mux::new(rctx.clone(), scans(8, 10)).unwrap();
        assert_eq!(live_workers(&rctx), 8);
        assert!(mux.pull(false).unwrap().is_some());
        assert!(mux.pull(true).unwrap().is_none());
        assert_eq!(live_workers(&rctx), 0);
        // A new stream starts new workers; the scans were cancelled.
        assert!(mux.pull(false).unwrap().is_none());
        assert_eq!(live_workers(&rctx), 8);
        drop(mux);
        assert_eq!(std::sync::Arc::strong_count(&rctx.options), 1);
    }

    #[test]
    fn test_drop_mid_stream_joins_workers() {
        let rctx = RuntimeContext::default();
        let mut mux = Mux::new(rctx.clone(), scans(4, 100)).unwrap();
        assert!(mux.pull(false).unwrap().is_some());
        drop(mux);
        assert_eq!(std::sync::Arc::strong_count(&rctx.options), 1);
    }

    #[test]
    fn test_done_releases_mirror_copy() {
        let rctx = RuntimeContext::default();
        let vals = (0..100).map(Value::int64).collect();
        let scan = Box::new(crate::op::scan::ValuesScan::new(vals, 1));
        let (main, side) = crate::op::mirror::mirror(rctx.clone(), scan);
        let idle = std::sync::Arc::strong_count(&rctx.options) + 1;
        let mut mux = Mux::new(rctx.clone(), vec![Box::new(main), Box::new(side)]).unwrap();
        assert!(mux.pull(false).unwrap().is_some());
        assert!(mux.pull(true).unwrap().is_none());
        assert_eq!(std::sync::Arc::strong_count(&rctx.options), idle);
    }

    struct Fail;

    impl Puller for Fail {
        fn pull(&mut self, _done: bool) -> Result<Option<Batch>> {
            Err(Error::Internal("boom".into()))
        }
    }

    #[test]
    fn test_worker_error_wins_over_cancellation() {
        let rctx = RuntimeContext::default();
        let mut mux = Mux::new(rctx.clone(), vec![Box::new(Fail)]).unwrap();
        mux.send_go(0).unwrap();
        mux.running = true;
        mux.live = 1;
        while mux.out.is_empty() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        rctx.cancel();
        let err = mux.next_event().err().unwrap();
        assert!(matches!(&err, Error::Internal(msg) if msg == "boom"), "unexpected error: {}", err);
    }
}
