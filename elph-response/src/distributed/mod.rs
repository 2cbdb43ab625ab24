// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Distributed
//!
//! Batch calculations partition their work across a fixed group of cooperating workers and
//! recombine the partial results with a blocking all-gather. Every worker runs the same
//! partition logic and so learns its own share without a coordinator. The communicator is
//! passed explicitly as a [`Collective`], so multi-worker runs can be simulated inside one
//! process with a [`ThreadedCollective`].

mod partition;
mod serial;
mod threaded;

pub use partition::Partition;
pub use serial::SerialCollective;
pub use threaded::ThreadedCollective;

use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Errors raised by a collective operation
///
/// None of these are recoverable: a failed collective leaves the batch without usable results.
pub enum CollectiveError {
    #[error("a collective needs at least one worker")]
    NoWorkers,
    #[error("workers are desynchronised: {0}")]
    #[diagnostic(
        code(elph_response::desynchronised),
        help("every worker must observe identical inputs before work is dispatched")
    )]
    Desynchronised(String),
    #[error("the contribution of worker {rank} has a different type to the local contribution")]
    TypeMismatch { rank: usize },
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A group of cooperating workers
pub trait Collective {
    /// The index of this worker in `0..self.size()`
    fn rank(&self) -> usize;

    /// The number of workers in the group
    fn size(&self) -> usize;

    /// Splits `number_of_items` items into one contiguous range per worker
    fn partition(&self, number_of_items: usize) -> Partition {
        Partition::new(number_of_items, self.size())
    }

    /// Blocking all-gather of variable-length contributions
    ///
    /// Worker `r` contributes `local`, which must hold `counts[r]` items. Every worker returns
    /// the contributions of all workers concatenated in rank order. All workers must call this
    /// with the same `counts`, and none returns before every worker has contributed.
    fn all_gather_v<T>(&self, local: Vec<T>, counts: &[usize]) -> Result<Vec<T>, CollectiveError>
    where
        T: Clone + Send + 'static;
}

/// Checks a gathered set of contribution lengths against the expected counts
pub(crate) fn check_counts(
    contributions: impl ExactSizeIterator<Item = usize>,
    counts: &[usize],
) -> Result<(), CollectiveError> {
    if contributions.len() != counts.len() {
        return Err(CollectiveError::Desynchronised(format!(
            "{} counts were provided for {} workers",
            counts.len(),
            contributions.len()
        )));
    }
    for (rank, (found, &expected)) in contributions.zip(counts).enumerate() {
        if found != expected {
            return Err(CollectiveError::Desynchronised(format!(
                "worker {rank} contributed {found} items but {expected} were expected"
            )));
        }
    }
    Ok(())
}
