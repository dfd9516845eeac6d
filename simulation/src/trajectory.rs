/// One timestamped state of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub state: Vec<f64>,
}

impl Sample {
    pub fn new(time: f64, state: Vec<f64>) -> Self {
        Self { time, state }
    }
}

/// The ordered samples produced by running one task to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

impl FromIterator<Sample> for Trajectory {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// The trajectories of a batch, or of several batches merged together.
///
/// Encoding order is the order of this collection, merging appends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputationResult {
    trajectories: Vec<Trajectory>,
}

impl ComputationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trajectory: Trajectory) {
        self.trajectories.push(trajectory);
    }

    /// Appends every trajectory of `other` after the ones already held.
    pub fn merge(&mut self, other: ComputationResult) {
        self.trajectories.extend(other.trajectories);
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trajectory> {
        self.trajectories.iter()
    }
}

impl From<Vec<Trajectory>> for ComputationResult {
    fn from(trajectories: Vec<Trajectory>) -> Self {
        Self { trajectories }
    }
}

impl FromIterator<Trajectory> for ComputationResult {
    fn from_iter<I: IntoIterator<Item = Trajectory>>(iter: I) -> Self {
        Self {
            trajectories: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ComputationResult {
    type Item = &'a Trajectory;
    type IntoIter = std::slice::Iter<'a, Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.trajectories.iter()
    }
}
