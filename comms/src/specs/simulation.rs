use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// How the client wants trajectories to be summarized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingSpec {
    /// Amount of intervals the `[0, deadline]` window is split into.
    pub points: NonZeroUsize,
    /// Simulated time at which sampling stops.
    pub deadline: f64,
}

/// A client's request to simulate a registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub model: String,
    pub initial_state: Vec<f64>,
    pub sampling: SamplingSpec,
    pub replicas: usize,
    pub deadline: f64,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// One replica to run, consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTask {
    pub seed: u64,
    pub model: String,
    pub initial_state: Vec<f64>,
    pub deadline: f64,
    #[serde(default)]
    pub max_steps: Option<u64>,
}

/// A group of tasks dispatched together and completed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBatch {
    pub tasks: Vec<SimulationTask>,
}

impl TaskBatch {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
