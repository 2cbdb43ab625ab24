use std::ops::Range;

/// A deterministic split of `n` items into contiguous, near-equal ranges, one per worker
///
/// Sizes differ by at most one, the first `n % workers` workers taking the extra item.
/// Worker `r` owns the items `bounds[r]..bounds[r + 1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    sizes: Vec<usize>,
    bounds: Vec<usize>,
}

impl Partition {
    pub fn new(number_of_items: usize, number_of_workers: usize) -> Self {
        let sizes: Vec<usize> = (0..number_of_workers)
            .map(|rank| {
                number_of_items / number_of_workers
                    + usize::from(rank < number_of_items % number_of_workers)
            })
            .collect();
        let bounds = std::iter::once(0)
            .chain(sizes.iter().scan(0, |total, &size| {
                *total += size;
                Some(*total)
            }))
            .collect();
        Self { sizes, bounds }
    }

    /// The number of items owned by each worker
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Cumulative offsets, one more than the number of workers
    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    /// The items owned by worker `rank`
    pub fn range(&self, rank: usize) -> Range<usize> {
        self.bounds[rank]..self.bounds[rank + 1]
    }

    /// The per-worker sizes scaled by the number of values computed per item
    pub fn counts(&self, values_per_item: usize) -> Vec<usize> {
        self.sizes.iter().map(|size| size * values_per_item).collect()
    }

    pub fn number_of_workers(&self) -> usize {
        self.sizes.len()
    }

    pub fn number_of_items(&self) -> usize {
        self.bounds.last().copied().unwrap_or(0)
    }
}
