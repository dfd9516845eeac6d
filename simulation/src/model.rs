use rand::rngs::StdRng;

use crate::{codec::SampleLayout, error::ModelErr, trajectory::Trajectory};

/// Stochastic model logic that can run one replica at a time.
///
/// Implementations are shared between the threads of an execution pool, all
/// per-run state must live inside `simulate`.
pub trait Model: Send + Sync {
    /// The amount of state components in every sample this model produces.
    fn arity(&self) -> usize;

    /// The record layout of this model's encoded trajectories.
    fn layout(&self) -> SampleLayout {
        SampleLayout::new(self.arity())
    }

    /// The state used when a task doesn't carry one.
    fn initial_state(&self) -> Option<&[f64]> {
        None
    }

    /// Runs one replica until `deadline` (simulated time), the step budget or
    /// an absorbing state is reached.
    ///
    /// # Arguments
    /// * `initial` - The state at time zero.
    /// * `deadline` - The simulated time at which the run stops.
    /// * `max_steps` - An optional bound on the amount of events.
    /// * `rng` - The replica's random source.
    ///
    /// # Returns
    /// The trajectory starting with a sample of `initial` at time zero.
    fn simulate(
        &self,
        initial: &[f64],
        deadline: f64,
        max_steps: Option<u64>,
        rng: &mut StdRng,
    ) -> Result<Trajectory, ModelErr>;
}
