use super::{check_counts, Collective, CollectiveError};

/// A collective with a single worker, for which every gather is the identity
#[derive(Copy, Clone, Debug, Default)]
pub struct SerialCollective;

impl Collective for SerialCollective {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_v<T>(&self, local: Vec<T>, counts: &[usize]) -> Result<Vec<T>, CollectiveError>
    where
        T: Clone + Send + 'static,
    {
        check_counts(std::iter::once(local.len()), counts)?;
        Ok(local)
    }
}

#[cfg(test)]
mod test {
    use super::SerialCollective;
    use crate::distributed::Collective;

    #[test]
    fn serial_gather_returns_the_local_contribution() {
        let gathered = SerialCollective.all_gather_v(vec![1, 2, 3], &[3]).unwrap();
        assert_eq!(gathered, vec![1, 2, 3]);
    }

    #[test]
    fn serial_gather_rejects_miscounted_contributions() {
        assert!(SerialCollective.all_gather_v(vec![1, 2], &[3]).is_err());
        assert!(SerialCollective.all_gather_v(vec![1, 2], &[2, 0]).is_err());
    }

    #[test]
    fn serial_partition_owns_everything() {
        let partition = SerialCollective.partition(5);
        assert_eq!(partition.range(SerialCollective.rank()), 0..5);
    }
}
