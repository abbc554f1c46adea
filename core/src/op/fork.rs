//! Fan-out operators.

use crate::runtime::{Puller, RouterOutput, new_router};

/// `n` outputs that each see every batch of `parent`. Batches are shared,
/// not copied.
pub fn fork(parent: Box<dyn Puller>, n: usize) -> Vec<RouterOutput> {
    new_router(parent, n, Box::new(move |_, batch| vec![Some(batch.clone()); n]))
}

/// `n` outputs that split the batches of `parent` between them: each
/// batch goes to the output whose pull fetched it.
pub fn scatter(parent: Box<dyn Puller>, n: usize) -> Vec<RouterOutput> {
    new_router(
        parent,
        n,
        Box::new(move |requester, batch| {
            (0..n)
                .map(|i| (i == requester).then(|| batch.clone()))
                .collect()
        }),
    )
}
