use crate::error::Result;
use crate::runtime::{Batch, Puller};

/// A named terminal of the graph. Consumers find it by name in the map
/// returned by [`crate::runtime::Builder::build`].
pub struct Output {
    name: String,
    parent: Box<dyn Puller>,
}

impl Output {
    pub fn new(name: impl Into<String>, parent: Box<dyn Puller>) -> Self {
        Output {
            name: name.into(),
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Puller for Output {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        self.parent.pull(done)
    }
}
