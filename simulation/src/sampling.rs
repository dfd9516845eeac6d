//! Summary statistics over many trajectories of the same model.

use comms::specs::simulation::SamplingSpec;
use serde::{Deserialize, Serialize};

use crate::{
    error::ModelErr,
    trajectory::{ComputationResult, Trajectory},
};

/// Per grid point mean and variance of every state component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingResult {
    /// The grid, `times[k] = k * deadline / points`.
    pub times: Vec<f64>,
    /// Amount of trajectories that contributed.
    pub trajectories: usize,
    /// `mean[k][c]` is the mean of component `c` at `times[k]`.
    pub mean: Vec<Vec<f64>>,
    /// The sample variance, same indexing as `mean`.
    pub variance: Vec<Vec<f64>>,
}

impl SamplingResult {
    /// The mean of one component over the whole grid.
    pub fn mean_of(&self, component: usize) -> Vec<f64> {
        self.mean.iter().map(|point| point[component]).collect()
    }

    /// The variance of one component over the whole grid.
    pub fn variance_of(&self, component: usize) -> Vec<f64> {
        self.variance.iter().map(|point| point[component]).collect()
    }
}

/// Accumulates trajectories on a fixed time grid using Welford's algorithm.
#[derive(Debug, Clone)]
pub struct StatisticSampling {
    times: Vec<f64>,
    arity: usize,
    count: usize,
    mean: Vec<Vec<f64>>,
    m2: Vec<Vec<f64>>,
}

impl StatisticSampling {
    /// Creates a new `StatisticSampling`.
    ///
    /// # Arguments
    /// * `spec` - The grid to sample on.
    /// * `arity` - The amount of state components of the model.
    pub fn new(spec: SamplingSpec, arity: usize) -> Self {
        let points = spec.points.get();
        let times: Vec<_> = (0..=points)
            .map(|k| k as f64 * spec.deadline / points as f64)
            .collect();

        Self {
            arity,
            count: 0,
            mean: vec![vec![0.0; arity]; times.len()],
            m2: vec![vec![0.0; arity]; times.len()],
            times,
        }
    }

    /// Adds one trajectory to the statistics.
    ///
    /// The value at a grid point is the last sample at or before it, points
    /// before the first sample take the first sample's state. Empty
    /// trajectories are ignored.
    pub fn ingest(&mut self, trajectory: &Trajectory) -> Result<(), ModelErr> {
        let samples = trajectory.samples();
        let Some(first) = samples.first() else {
            return Ok(());
        };

        if let Some(bad) = samples.iter().find(|s| s.state.len() != self.arity) {
            return Err(ModelErr::ArityMismatch {
                what: "sampled trajectory",
                got: bad.state.len(),
                expected: self.arity,
            });
        }

        self.count += 1;
        let n = self.count as f64;
        let mut current = first;
        let mut next = 1;

        for (k, &t) in self.times.iter().enumerate() {
            while next < samples.len() && samples[next].time <= t {
                current = &samples[next];
                next += 1;
            }

            for (c, &x) in current.state.iter().enumerate() {
                let delta = x - self.mean[k][c];
                self.mean[k][c] += delta / n;
                self.m2[k][c] += delta * (x - self.mean[k][c]);
            }
        }

        Ok(())
    }

    /// Adds every trajectory of a result.
    pub fn ingest_all(&mut self, result: &ComputationResult) -> Result<(), ModelErr> {
        result.iter().try_for_each(|t| self.ingest(t))
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Snapshots the statistics gathered so far.
    pub fn finish(&self) -> SamplingResult {
        let variance = match self.count {
            0 | 1 => vec![vec![0.0; self.arity]; self.times.len()],
            n => self
                .m2
                .iter()
                .map(|point| point.iter().map(|m2| m2 / (n - 1) as f64).collect())
                .collect(),
        };

        SamplingResult {
            times: self.times.clone(),
            trajectories: self.count,
            mean: self.mean.clone(),
            variance,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::trajectory::Sample;

    fn spec(points: usize, deadline: f64) -> SamplingSpec {
        SamplingSpec {
            points: NonZeroUsize::new(points).unwrap(),
            deadline,
        }
    }

    fn step(values: &[(f64, f64)]) -> Trajectory {
        values.iter().map(|&(t, x)| Sample::new(t, vec![x])).collect()
    }

    #[test]
    fn grid_uses_last_sample_before_each_point() {
        let mut sampling = StatisticSampling::new(spec(4, 2.0), 1);
        sampling
            .ingest(&step(&[(0.0, 10.0), (0.7, 9.0), (1.0, 8.0), (1.9, 7.0)]))
            .unwrap();

        let result = sampling.finish();
        assert_eq!(result.times, [0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(result.mean_of(0), [10.0, 10.0, 8.0, 8.0, 7.0]);
        assert_eq!(result.variance_of(0), [0.0; 5]);
    }

    #[test]
    fn mean_and_variance() {
        let mut sampling = StatisticSampling::new(spec(1, 1.0), 1);
        let result = ComputationResult::from(vec![
            step(&[(0.0, 2.0)]),
            step(&[(0.0, 4.0)]),
            step(&[(0.0, 6.0)]),
        ]);
        sampling.ingest_all(&result).unwrap();

        let result = sampling.finish();
        assert_eq!(result.trajectories, 3);
        assert_eq!(result.mean_of(0), [4.0, 4.0]);
        assert_eq!(result.variance_of(0), [4.0, 4.0]);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut sampling = StatisticSampling::new(spec(1, 1.0), 2);
        assert!(sampling.ingest(&step(&[(0.0, 1.0)])).is_err());
        assert!(sampling.ingest(&Trajectory::new()).is_ok());
        assert_eq!(sampling.count(), 0);
    }
}
