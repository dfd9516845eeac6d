use std::{io, num::NonZeroUsize, sync::Arc};

use comms::specs::simulation::SimulationTask;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use simulation::{ComputationResult, ModelFactory};
use tokio::task;

use crate::error::BatchErr;

/// The threads simulating tasks, shared by every batch of the process.
///
/// Concurrent batches interleave their tasks on the same threads, the pool
/// size bounds the total simulation parallelism.
#[derive(Clone)]
pub struct ExecutionPool {
    pool: Arc<ThreadPool>,
}

impl ExecutionPool {
    /// Creates a new `ExecutionPool`.
    ///
    /// # Arguments
    /// * `threads` - The amount of simulation threads.
    pub fn new(threads: NonZeroUsize) -> io::Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.get())
            .thread_name(|i| format!("simulation-{i}"))
            .build()
            .map_err(io::Error::other)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs every task of a batch and waits for all of them.
    ///
    /// The compute runs off the async runtime, the returned future resolves
    /// once every task produced its trajectory.
    ///
    /// # Arguments
    /// * `factory` - The model every task references.
    /// * `tasks` - The batch, each task is consumed.
    ///
    /// # Returns
    /// One trajectory per task in submission order, or the first failure.
    /// A failed batch returns no partial result.
    pub async fn run_batch(
        &self,
        factory: Arc<ModelFactory>,
        tasks: Vec<SimulationTask>,
    ) -> Result<ComputationResult, BatchErr> {
        if let Some((index, task)) = tasks
            .iter()
            .enumerate()
            .find(|(_, task)| task.model != factory.name())
        {
            return Err(BatchErr::ModelMismatch {
                index,
                expected: factory.name().to_string(),
                got: task.model.clone(),
            });
        }

        debug!(model = factory.name(), tasks = tasks.len(); "running batch");
        let pool = Arc::clone(&self.pool);

        let trajectories = task::spawn_blocking(move || {
            let model = factory.model().as_ref();

            pool.install(|| {
                tasks
                    .par_iter()
                    .enumerate()
                    .map(|(index, task)| {
                        simulation::execute(task, model)
                            .map_err(|source| BatchErr::Task { index, source })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
        })
        .await
        .map_err(BatchErr::Panicked)??;

        Ok(ComputationResult::from(trajectories))
    }
}
