pub mod catalog;
pub mod codec;
pub mod error;
pub mod model;
pub mod population;
pub mod registry;
pub mod sampling;
pub mod trajectory;

use comms::specs::simulation::SimulationTask;
use rand::{SeedableRng, rngs::StdRng};

pub use catalog::Catalog;
pub use codec::{SampleLayout, decode_result, decode_stream, decode_trajectory, encode_result};
pub use error::{CodecErr, LoadErr, ModelErr};
pub use model::Model;
pub use registry::{ModelFactory, ModelRegistry, TrustPolicy};
pub use sampling::{SamplingResult, StatisticSampling};
pub use trajectory::{ComputationResult, Sample, Trajectory};

/// Runs one task to completion.
///
/// The replica's generator is seeded from the task, so running the same task
/// twice yields the same trajectory. A task without an initial state uses
/// the model's own one.
///
/// # Arguments
/// * `task` - The replica to run.
/// * `model` - The model the task references.
pub fn execute(task: &SimulationTask, model: &dyn Model) -> Result<Trajectory, ModelErr> {
    let initial = match (task.initial_state.as_slice(), model.initial_state()) {
        ([], Some(default)) => default,
        (initial, _) => initial,
    };

    let mut rng = StdRng::seed_from_u64(task.seed);
    model.simulate(initial, task.deadline, task.max_steps, &mut rng)
}
