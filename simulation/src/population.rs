//! Mass-action reaction networks simulated with Gillespie's direct method.

use std::collections::BTreeMap;

use rand::{Rng, rngs::StdRng};
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::{
    error::{LoadErr, ModelErr},
    model::Model,
    trajectory::{Sample, Trajectory},
};

pub const KIND: &str = "population";

/// One reaction, species are referenced by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionSpec {
    #[serde(default)]
    pub reactants: BTreeMap<String, u32>,
    #[serde(default)]
    pub products: BTreeMap<String, u32>,
    pub rate: f64,
}

/// The parameters of a `population` model blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationParams {
    pub species: Vec<String>,
    pub reactions: Vec<ReactionSpec>,
    #[serde(default)]
    pub initial: Option<Vec<f64>>,
}

#[derive(Debug)]
struct Reaction {
    reactants: Vec<(usize, u32)>,
    delta: Vec<(usize, f64)>,
    rate: f64,
}

impl Reaction {
    fn propensity(&self, state: &[f64]) -> f64 {
        self.reactants
            .iter()
            .fold(self.rate, |acc, &(species, stoich)| {
                let count = state[species];
                (0..stoich).fold(acc, |acc, k| acc * (count - k as f64).max(0.0))
            })
    }

    fn fire(&self, state: &mut [f64]) {
        for &(species, delta) in &self.delta {
            state[species] += delta;
        }
    }
}

/// A compiled population model.
#[derive(Debug)]
pub struct Population {
    species: Vec<String>,
    reactions: Vec<Reaction>,
    initial: Option<Vec<f64>>,
}

impl Population {
    /// Builds a model from its blob parameters.
    ///
    /// # Arguments
    /// * `version` - The requested revision of this kind.
    /// * `params` - The JSON parameters of the blob.
    ///
    /// # Returns
    /// The model or a `LoadErr` describing why the parameters are invalid.
    pub fn from_params(version: u32, params: &serde_json::Value) -> Result<Self, LoadErr> {
        if version != 1 {
            return Err(LoadErr::UnsupportedVersion {
                kind: KIND.to_string(),
                version,
            });
        }

        let params: PopulationParams =
            serde_json::from_value(params.clone()).map_err(|e| invalid(e.to_string()))?;

        Self::new(params)
    }

    pub fn new(params: PopulationParams) -> Result<Self, LoadErr> {
        let PopulationParams {
            species,
            reactions,
            initial,
        } = params;

        if species.is_empty() {
            return Err(invalid("at least one species is required"));
        }

        let index = |name: &str| {
            species
                .iter()
                .position(|s| s == name)
                .ok_or_else(|| invalid(format!("unknown species {name:?}")))
        };

        let reactions = reactions
            .into_iter()
            .map(|spec| {
                if !spec.rate.is_finite() || spec.rate < 0.0 {
                    return Err(invalid(format!("invalid reaction rate {}", spec.rate)));
                }

                let mut delta = vec![0.0; species.len()];
                let mut reactants = Vec::with_capacity(spec.reactants.len());

                for (name, &stoich) in &spec.reactants {
                    let i = index(name)?;
                    reactants.push((i, stoich));
                    delta[i] -= stoich as f64;
                }

                for (name, &stoich) in &spec.products {
                    delta[index(name)?] += stoich as f64;
                }

                let delta = delta
                    .into_iter()
                    .enumerate()
                    .filter(|&(_, d)| d != 0.0)
                    .collect();

                Ok(Reaction {
                    reactants,
                    delta,
                    rate: spec.rate,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(initial) = &initial {
            if initial.len() != species.len() {
                return Err(invalid(format!(
                    "{} initial values for {} species",
                    initial.len(),
                    species.len()
                )));
            }
            check_counts(initial).map_err(|e| invalid(e.to_string()))?;
        }

        Ok(Self {
            species,
            reactions,
            initial,
        })
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }
}

impl Model for Population {
    fn arity(&self) -> usize {
        self.species.len()
    }

    fn initial_state(&self) -> Option<&[f64]> {
        self.initial.as_deref()
    }

    fn simulate(
        &self,
        initial: &[f64],
        deadline: f64,
        max_steps: Option<u64>,
        rng: &mut StdRng,
    ) -> Result<Trajectory, ModelErr> {
        if initial.len() != self.arity() {
            return Err(ModelErr::ArityMismatch {
                what: "initial state",
                got: initial.len(),
                expected: self.arity(),
            });
        }
        if !deadline.is_finite() || deadline < 0.0 {
            return Err(ModelErr::InvalidDeadline(deadline));
        }
        check_counts(initial)?;

        let mut state = initial.to_vec();
        let mut time = 0.0;
        let mut steps = 0;
        let mut propensities = vec![0.0; self.reactions.len()];

        let mut trajectory = Trajectory::new();
        trajectory.push(Sample::new(time, state.clone()));

        while max_steps.is_none_or(|max| steps < max) {
            for (a, reaction) in propensities.iter_mut().zip(&self.reactions) {
                *a = reaction.propensity(&state);
            }

            let total: f64 = propensities.iter().sum();
            if total <= 0.0 {
                break;
            }

            let wait = Exp::new(total)
                .map_err(|e| ModelErr::InvalidState(e.to_string()))?
                .sample(rng);

            time += wait;
            if time > deadline {
                break;
            }

            let mut pick = rng.random::<f64>() * total;
            let fired = propensities
                .iter()
                .position(|&a| {
                    pick -= a;
                    pick < 0.0
                })
                .unwrap_or(propensities.len() - 1);

            self.reactions[fired].fire(&mut state);
            trajectory.push(Sample::new(time, state.clone()));
            steps += 1;
        }

        Ok(trajectory)
    }
}

fn check_counts(state: &[f64]) -> Result<(), ModelErr> {
    match state.iter().find(|v| !v.is_finite() || **v < 0.0) {
        Some(v) => Err(ModelErr::InvalidState(format!(
            "species counts must be finite and non negative, got {v}"
        ))),
        None => Ok(()),
    }
}

fn invalid(reason: impl Into<String>) -> LoadErr {
    LoadErr::InvalidParams {
        kind: KIND.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use serde_json::json;

    use super::*;

    fn decay() -> Population {
        Population::from_params(
            1,
            &json!({
                "species": ["A"],
                "reactions": [{ "reactants": { "A": 1 }, "rate": 0.5 }],
                "initial": [20.0],
            }),
        )
        .unwrap()
    }

    #[test]
    fn same_seed_same_trajectory() {
        let model = decay();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            model.simulate(&[20.0], 100.0, None, &mut rng).unwrap()
        };

        assert_eq!(run(3), run(3));
        assert_ne!(run(3), run(4));
    }

    #[test]
    fn decay_reaches_absorbing_state() {
        let model = decay();
        let mut rng = StdRng::seed_from_u64(11);
        let trajectory = model.simulate(&[20.0], 1e9, None, &mut rng).unwrap();

        assert_eq!(trajectory.samples()[0], Sample::new(0.0, vec![20.0]));
        assert_eq!(trajectory.len(), 21);
        assert_eq!(trajectory.last().unwrap().state, [0.0]);

        let times: Vec<_> = trajectory.samples().iter().map(|s| s.time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn step_budget_and_deadline_stop_the_run() {
        let model = decay();

        let mut rng = StdRng::seed_from_u64(1);
        let bounded = model.simulate(&[20.0], 1e9, Some(5), &mut rng).unwrap();
        assert_eq!(bounded.len(), 6);

        let mut rng = StdRng::seed_from_u64(1);
        let instant = model.simulate(&[20.0], 0.0, None, &mut rng).unwrap();
        assert_eq!(instant.len(), 1);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let model = decay();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(matches!(
            model.simulate(&[1.0, 2.0], 1.0, None, &mut rng),
            Err(ModelErr::ArityMismatch { got: 2, expected: 1, .. })
        ));
        assert!(matches!(
            model.simulate(&[-1.0], 1.0, None, &mut rng),
            Err(ModelErr::InvalidState(_))
        ));
        assert!(matches!(
            model.simulate(&[1.0], f64::NAN, None, &mut rng),
            Err(ModelErr::InvalidDeadline(_))
        ));
    }

    #[test]
    fn bad_params_are_load_errors() {
        let unknown_species = json!({
            "species": ["S"],
            "reactions": [{ "reactants": { "X": 1 }, "rate": 1.0 }],
        });
        assert!(matches!(
            Population::from_params(1, &unknown_species),
            Err(LoadErr::InvalidParams { .. })
        ));

        let no_species = json!({ "species": [], "reactions": [] });
        assert!(Population::from_params(1, &no_species).is_err());

        assert!(matches!(
            Population::from_params(2, &json!({})),
            Err(LoadErr::UnsupportedVersion { version: 2, .. })
        ));
    }
}
