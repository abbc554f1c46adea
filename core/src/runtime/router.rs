//! Fan-out of one parent to several consumers.
//!
//! The outputs share the parent behind a lock. Whichever output runs dry
//! pulls the parent and the route function splits the batch across the
//! per-output queues. End of stream is queued as a marker so each output
//! sees it in order.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;

use super::{Batch, Puller};

/// Splits a batch pulled on behalf of output `requester` into the part
/// each output receives.
pub type Route = Box<dyn FnMut(usize, &Batch) -> Vec<Option<Batch>> + Send>;

struct State {
    parent: Box<dyn Puller>,
    route: Route,
    queues: Vec<VecDeque<Option<Batch>>>,
    done: Vec<bool>,
}

pub struct RouterOutput {
    index: usize,
    state: Arc<Mutex<State>>,
}

/// Creates `n` outputs over `parent`.
pub fn new_router(parent: Box<dyn Puller>, n: usize, route: Route) -> Vec<RouterOutput> {
    let state = Arc::new(Mutex::new(State {
        parent,
        route,
        queues: (0..n).map(|_| VecDeque::new()).collect(),
        done: vec![false; n],
    }));
    (0..n)
        .map(|index| RouterOutput {
            index,
            state: state.clone(),
        })
        .collect()
}

impl Puller for RouterOutput {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        let mut s = self.state.lock();
        let i = self.index;
        if done {
            s.queues[i].clear();
            s.done[i] = true;
            if s.done.iter().all(|d| *d) {
                debug!("router: every output done, cancelling parent");
                s.parent.pull(true)?;
                s.done.iter_mut().for_each(|d| *d = false);
            }
            return Ok(None);
        }
        s.done[i] = false;
        loop {
            if let Some(item) = s.queues[i].pop_front() {
                return Ok(item);
            }
            let batch = s.parent.pull(false)?;
            let State {
                route,
                queues,
                done,
                ..
            } = &mut *s;
            match batch {
                None => {
                    for (q, d) in queues.iter_mut().zip(done.iter()) {
                        if !d {
                            q.push_back(None);
                        }
                    }
                }
                Some(batch) => {
                    let parts = route(i, &batch);
                    trace!(requester = i, len = batch.len(), "router: routing batch");
                    for ((q, d), part) in queues.iter_mut().zip(done.iter()).zip(parts) {
                        if let Some(part) = part.filter(|p| !p.is_empty() && !d) {
                            q.push_back(Some(part));
                        }
                    }
                }
            }
        }
    }
}
