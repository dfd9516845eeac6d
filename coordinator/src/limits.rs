use std::num::NonZeroUsize;

use comms::specs::simulation::SimulationRequest;

use crate::error::RequestErr;

pub(crate) const DEFAULT_MAX_REPLICAS: NonZeroUsize = NonZeroUsize::new(1_000_000).unwrap();
pub(crate) const DEFAULT_MAX_POINTS: NonZeroUsize = NonZeroUsize::new(10_000).unwrap();

/// Bounds a client request must stay within before any work is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    max_replicas: NonZeroUsize,
    max_points: NonZeroUsize,
}

impl RequestLimits {
    /// Creates a new `RequestLimits`.
    ///
    /// # Arguments
    /// * `max_replicas` - The most replicas a single request may ask for.
    /// * `max_points` - The most sampling intervals a single request may ask for.
    pub fn new(max_replicas: NonZeroUsize, max_points: NonZeroUsize) -> Self {
        Self {
            max_replicas,
            max_points,
        }
    }

    pub fn max_replicas(&self) -> usize {
        self.max_replicas.get()
    }

    pub fn max_points(&self) -> usize {
        self.max_points.get()
    }

    /// Checks a request can be run.
    ///
    /// # Returns
    /// The first bound `request` breaks, deadlines must also be finite and
    /// non negative.
    pub fn check(&self, request: &SimulationRequest) -> Result<(), RequestErr> {
        if request.replicas > self.max_replicas() {
            return Err(RequestErr::TooManyReplicas {
                got: request.replicas,
                max: self.max_replicas(),
            });
        }

        let points = request.sampling.points.get();
        if points > self.max_points() {
            return Err(RequestErr::TooManyPoints {
                got: points,
                max: self.max_points(),
            });
        }

        check_deadline("deadline", request.deadline)?;
        check_deadline("sampling deadline", request.sampling.deadline)
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REPLICAS, DEFAULT_MAX_POINTS)
    }
}

fn check_deadline(what: &'static str, value: f64) -> Result<(), RequestErr> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }

    Err(RequestErr::InvalidDeadline { what, value })
}

#[cfg(test)]
mod tests {
    use comms::specs::simulation::SamplingSpec;

    use super::*;

    fn limits() -> RequestLimits {
        RequestLimits::new(NonZeroUsize::new(100).unwrap(), NonZeroUsize::new(10).unwrap())
    }

    fn request(replicas: usize, points: usize, deadline: f64) -> SimulationRequest {
        SimulationRequest {
            model: "SIR".into(),
            initial_state: Vec::new(),
            sampling: SamplingSpec {
                points: NonZeroUsize::new(points).unwrap(),
                deadline,
            },
            replicas,
            deadline,
            max_steps: None,
            seed: None,
        }
    }

    #[test]
    fn requests_within_bounds_pass() {
        assert!(limits().check(&request(100, 10, 5.0)).is_ok());
        assert!(limits().check(&request(0, 1, 0.0)).is_ok());
    }

    #[test]
    fn oversized_requests_are_rejected() {
        let err = limits().check(&request(1 << 40, 1, 1.0)).unwrap_err();
        assert!(matches!(err, RequestErr::TooManyReplicas { max: 100, .. }));

        let err = limits().check(&request(1, 1 << 40, 1.0)).unwrap_err();
        assert!(matches!(err, RequestErr::TooManyPoints { max: 10, .. }));
    }

    #[test]
    fn deadlines_must_be_finite_and_non_negative() {
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let err = limits().check(&request(1, 1, bad)).unwrap_err();
            assert!(matches!(err, RequestErr::InvalidDeadline { what: "deadline", .. }));
        }

        let mut nan_grid = request(1, 1, 1.0);
        nan_grid.sampling.deadline = f64::NAN;
        let err = limits().check(&nan_grid).unwrap_err();
        assert!(matches!(err, RequestErr::InvalidDeadline { what: "sampling deadline", .. }));
    }
}
