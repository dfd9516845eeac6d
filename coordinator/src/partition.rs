use std::num::NonZeroUsize;

/// Splits a replica count into per worker batches.
#[derive(Debug, Clone, Copy)]
pub struct PartitionPolicy {
    max_batch: NonZeroUsize,
}

impl PartitionPolicy {
    /// Creates a new `PartitionPolicy`.
    ///
    /// # Arguments
    /// * `max_batch` - The largest amount of tasks sent in a single batch.
    pub fn new(max_batch: NonZeroUsize) -> Self {
        Self { max_batch }
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch.get()
    }

    /// Shares replicas evenly, the first `replicas % workers` workers run one
    /// more.
    ///
    /// # Returns
    /// One share per worker, summing up to `replicas`.
    pub fn shares(&self, replicas: usize, workers: usize) -> Vec<usize> {
        if workers == 0 {
            return Vec::new();
        }

        let base = replicas / workers;
        let extra = replicas % workers;

        (0..workers)
            .map(|worker| base + usize::from(worker < extra))
            .collect()
    }

    /// Cuts one worker's share into batches of at most `max_batch` tasks.
    pub fn batches(&self, share: usize) -> impl Iterator<Item = usize> + use<> {
        let max = self.max_batch.get();
        (0..share)
            .step_by(max)
            .map(move |start| (share - start).min(max))
    }

    /// Plans the batches of every worker.
    ///
    /// # Arguments
    /// * `replicas` - The total amount of tasks.
    /// * `workers` - The amount of available workers.
    ///
    /// # Returns
    /// One list of batch sizes per worker, summing up to `replicas`.
    pub fn plan(&self, replicas: usize, workers: usize) -> Vec<Vec<usize>> {
        self.shares(replicas, workers)
            .into_iter()
            .map(|share| self.batches(share).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_batch: usize) -> PartitionPolicy {
        PartitionPolicy::new(NonZeroUsize::new(max_batch).unwrap())
    }

    #[test]
    fn shares_are_even_and_bounded() {
        assert_eq!(
            policy(2).plan(10, 3),
            vec![vec![2, 2], vec![2, 1], vec![2, 1]]
        );
    }

    #[test]
    fn single_worker_gets_everything() {
        assert_eq!(policy(64).plan(100, 1), vec![vec![64, 36]]);
        assert_eq!(policy(1000).plan(100, 1), vec![vec![100]]);
    }

    #[test]
    fn fewer_replicas_than_workers() {
        assert_eq!(policy(8).plan(2, 4), vec![vec![1], vec![1], vec![], vec![]]);
        assert_eq!(policy(8).plan(0, 2), vec![Vec::<usize>::new(), vec![]]);
    }

    #[test]
    fn every_replica_is_planned() {
        for replicas in 0..50 {
            for workers in 1..6 {
                let plan = policy(3).plan(replicas, workers);
                assert_eq!(plan.len(), workers);
                assert_eq!(plan.iter().flatten().sum::<usize>(), replicas);
                assert!(plan.iter().flatten().all(|&b| (1..=3).contains(&b)));
            }
        }
    }

    #[test]
    fn batches_are_cut_lazily() {
        let mut batches = policy(64).batches(1 << 40);
        assert_eq!(batches.next(), Some(64));
        assert_eq!(batches.next(), Some(64));

        assert_eq!(policy(64).batches(130).collect::<Vec<_>>(), [64, 64, 2]);
        assert_eq!(policy(64).batches(0).next(), None);
    }

    #[test]
    fn no_workers_no_plan() {
        assert!(policy(4).plan(10, 0).is_empty());
    }
}
