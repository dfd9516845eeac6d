use std::num::NonZeroUsize;

use comms::specs::{
    model::ModelSpec,
    simulation::{SamplingSpec, SimulationTask},
};
use serde_json::json;
use simulation::{
    ComputationResult, ModelErr, ModelRegistry, StatisticSampling, decode_stream, encode_result,
    execute,
};

fn seir() -> Vec<u8> {
    ModelSpec::new(
        "population",
        json!({
            "species": ["S", "E", "I", "R"],
            "reactions": [
                { "reactants": { "S": 1, "I": 1 }, "products": { "E": 1, "I": 1 }, "rate": 0.003 },
                { "reactants": { "E": 1 }, "products": { "I": 1 }, "rate": 0.2 },
                { "reactants": { "I": 1 }, "products": { "R": 1 }, "rate": 0.1 },
            ],
            "initial": [95.0, 0.0, 5.0, 0.0],
        }),
    )
    .to_blob()
    .unwrap()
}

fn task(seed: u64, initial_state: Vec<f64>) -> SimulationTask {
    SimulationTask {
        seed,
        model: "SEIR".into(),
        initial_state,
        deadline: 50.0,
        max_steps: None,
    }
}

#[test]
fn tasks_run_encode_compress_and_sample() {
    let registry = ModelRegistry::default();
    let factory = registry.register("SEIR", &seir()).unwrap();
    let model = factory.model().as_ref();

    let result: ComputationResult = (0..8)
        .map(|seed| execute(&task(seed, Vec::new()), model).unwrap())
        .collect();

    for trajectory in &result {
        let total: f64 = trajectory.samples()[0].state.iter().sum();
        let last: f64 = trajectory.last().unwrap().state.iter().sum();
        assert_eq!(total, 100.0);
        assert_eq!(last, 100.0);
    }

    let bytes = encode_result(&result, factory.layout()).unwrap();
    let compressed = comms::compress(&bytes).unwrap();
    let reader = comms::decompressor(&compressed).unwrap();
    let decoded = decode_stream(reader, factory.layout()).unwrap();
    assert_eq!(decoded, result);

    let spec = SamplingSpec {
        points: NonZeroUsize::new(10).unwrap(),
        deadline: 50.0,
    };
    let mut sampling = StatisticSampling::new(spec, factory.layout().arity());
    sampling.ingest_all(&decoded).unwrap();

    let summary = sampling.finish();
    assert_eq!(summary.trajectories, 8);
    assert_eq!(summary.times.len(), 11);
    assert_eq!(summary.mean[0], [95.0, 0.0, 5.0, 0.0]);
}

#[test]
fn explicit_initial_state_wins_and_is_validated() {
    let registry = ModelRegistry::default();
    let factory = registry.register("SEIR", &seir()).unwrap();
    let model = factory.model().as_ref();

    let trajectory = execute(&task(1, vec![10.0, 0.0, 0.0, 0.0]), model).unwrap();
    assert_eq!(trajectory.len(), 1);

    assert!(matches!(
        execute(&task(1, vec![1.0]), model),
        Err(ModelErr::ArityMismatch { .. })
    ));
}
