use core::cmp::Ordering;
use std::collections::VecDeque;

use crate::error::Result;
use crate::expr::Comparator;
use crate::runtime::{Batch, Puller};
use crate::value::Value;

type Row = (Vec<Value>, Value);

struct Input {
    puller: Box<dyn Puller>,
    rows: VecDeque<Row>,
    eos: bool,
}

/// Merges parents that are each sorted by `cmp` into one sorted stream.
/// Ties go to the earlier parent.
pub struct Merge {
    inputs: Vec<Input>,
    cmp: Comparator,
    batch_size: usize,
}

impl Merge {
    pub fn new(parents: Vec<Box<dyn Puller>>, cmp: Comparator, batch_size: usize) -> Self {
        let inputs = parents
            .into_iter()
            .map(|puller| Input {
                puller,
                rows: VecDeque::new(),
                eos: false,
            })
            .collect();
        Merge {
            inputs,
            cmp,
            batch_size: batch_size.max(1),
        }
    }

    /// Makes sure every parent not at end of stream has a buffered row.
    fn fill(&mut self) -> Result<()> {
        for input in &mut self.inputs {
            while input.rows.is_empty() && !input.eos {
                match input.puller.pull(false)? {
                    Some(batch) => {
                        let keys = self.cmp.eval_keys(batch.vector());
                        input.rows.extend(keys.into_iter().zip(batch.values()));
                    }
                    None => input.eos = true,
                }
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Value>> {
        self.fill()?;
        let mut min: Option<usize> = None;
        for (i, input) in self.inputs.iter().enumerate() {
            let Some((keys, _)) = input.rows.front() else {
                continue;
            };
            let better = match min.and_then(|m| self.inputs[m].rows.front()) {
                Some((best, _)) => self.cmp.compare(keys, best) == Ordering::Less,
                None => true,
            };
            if better {
                min = Some(i);
            }
        }
        Ok(min.and_then(|i| self.inputs[i].rows.pop_front()).map(|(_, v)| v))
    }
}

impl Puller for Merge {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            for input in &mut self.inputs {
                input.rows.clear();
                if !input.eos {
                    input.puller.pull(true)?;
                }
                input.eos = false;
            }
            return Ok(None);
        }
        let mut vals = Vec::with_capacity(self.batch_size);
        while vals.len() < self.batch_size {
            match self.next()? {
                Some(v) => vals.push(v),
                None => break,
            }
        }
        if vals.is_empty() {
            for input in &mut self.inputs {
                input.eos = false;
            }
            return Ok(None);
        }
        Ok(Some(Batch::from_values(&vals)))
    }
}
