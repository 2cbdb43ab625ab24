use super::{check_counts, Collective, CollectiveError};
use std::any::Any;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

/// Shared state of an in-process group of workers
///
/// Each gather is a two-phase rendezvous: every worker deposits its contribution in its own
/// slot and waits, reads all slots and waits again. The second wait keeps a fast worker from
/// overwriting its slot in the next gather while a slow worker is still reading.
struct Rendezvous {
    barrier: Barrier,
    slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
}

/// One worker of a group simulated inside a single process
///
/// Workers are started with [`ThreadedCollective::launch`], which runs one closure per rank
/// concurrently, each on its own thread of a dedicated `rayon` pool.
#[derive(Clone)]
pub struct ThreadedCollective {
    rank: usize,
    size: usize,
    shared: Arc<Rendezvous>,
}

impl std::fmt::Debug for ThreadedCollective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedCollective")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl ThreadedCollective {
    /// Runs `worker` once for every rank in `0..number_of_workers` and returns the results in
    /// rank order
    ///
    /// All workers run concurrently, so they may rendezvous in collective operations. A worker
    /// which never reaches a collective the others are waiting in stalls the whole group. This
    /// includes a worker which panics before a collective: its peers block in the rendezvous and
    /// `launch` never returns. A panic after the last collective propagates once the group has
    /// finished.
    pub fn launch<F, R>(number_of_workers: usize, worker: F) -> Result<Vec<R>, CollectiveError>
    where
        F: Fn(ThreadedCollective) -> R + Sync,
        R: Send,
    {
        if number_of_workers == 0 {
            return Err(CollectiveError::NoWorkers);
        }
        let shared = Arc::new(Rendezvous {
            barrier: Barrier::new(number_of_workers),
            slots: Mutex::new((0..number_of_workers).map(|_| None).collect()),
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(number_of_workers)
            .thread_name(|index| format!("elph-worker-{index}"))
            .build()?;

        tracing::debug!("Launching {} workers", number_of_workers);
        Ok(pool.broadcast(|context| {
            worker(ThreadedCollective {
                rank: context.index(),
                size: number_of_workers,
                shared: Arc::clone(&shared),
            })
        }))
    }
}

impl Collective for ThreadedCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_v<T>(&self, local: Vec<T>, counts: &[usize]) -> Result<Vec<T>, CollectiveError>
    where
        T: Clone + Send + 'static,
    {
        // Every worker passes both barriers, whatever the outcome, so errors are only raised
        // once the rendezvous is complete
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slots[self.rank] = Some(Box::new(local));
        }
        self.shared.barrier.wait();

        let gathered = {
            let slots = self
                .shared
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            gather_slots::<T>(&slots, counts)
        };
        tracing::trace!(rank = self.rank, "Gathered contributions");

        self.shared.barrier.wait();
        gathered
    }
}

fn gather_slots<T: Clone + 'static>(
    slots: &[Option<Box<dyn Any + Send>>],
    counts: &[usize],
) -> Result<Vec<T>, CollectiveError> {
    let contributions = slots
        .iter()
        .enumerate()
        .map(|(rank, slot)| {
            slot.as_deref()
                .and_then(|contribution| contribution.downcast_ref::<Vec<T>>())
                .ok_or(CollectiveError::TypeMismatch { rank })
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_counts(contributions.iter().map(|c| c.len()), counts)?;

    Ok(contributions
        .into_iter()
        .flat_map(|contribution| contribution.iter().cloned())
        .collect())
}
