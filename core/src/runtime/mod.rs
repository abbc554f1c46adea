//! The pull-based execution runtime.
//!
//! Every operator is a [`Puller`]. A consumer calls `pull(false)` for the
//! next batch and receives `None` at end of stream; after that the
//! operator resets and the next pull starts a fresh stream. `pull(true)`
//! tells the operator its consumer is done: it drops buffered state,
//! forwards `done` upstream and returns `None`.

mod batch;
pub mod compile;
mod context;
pub mod dag;
mod mux;
mod router;
pub mod spill;

pub use batch::Batch;
pub use compile::Builder;
pub use context::{CancelToken, RuntimeContext, RuntimeOptions};
pub use mux::Mux;
pub(crate) use mux::Event;
pub use router::{Route, RouterOutput, new_router};

pub use crate::expr::{Resetter, Resetters};

use crate::error::Result;
use crate::value::Value;

pub trait Puller: Send {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>>;
}

impl<P: Puller + ?Sized> Puller for Box<P> {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        (**self).pull(done)
    }
}

/// Pulls `p` to end of stream and returns every value it produced.
pub fn collect_values(p: &mut dyn Puller) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    while let Some(batch) = p.pull(false)? {
        out.extend(batch.values());
    }
    Ok(out)
}
