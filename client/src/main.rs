use std::{env, io, num::NonZeroUsize};

use client::SimulationClient;
use comms::{
    NetworkEndpoint, Transport,
    specs::{
        model::ModelSpec,
        simulation::{SamplingSpec, SimulationRequest},
    },
};
use log::info;
use serde_json::json;
use tokio::signal;

const MODEL: &str = "SEIR";
const REPLICAS: usize = 1000;
const DEADLINE: f64 = 100.0;
const POINTS: NonZeroUsize = NonZeroUsize::new(10).unwrap();

fn seir() -> ModelSpec {
    ModelSpec::new(
        "population",
        json!({
            "species": ["S", "E", "I", "R"],
            "reactions": [
                { "reactants": { "S": 1, "I": 1 }, "products": { "E": 1, "I": 1 }, "rate": 0.0005 },
                { "reactants": { "E": 1 }, "products": { "I": 1 }, "rate": 0.2 },
                { "reactants": { "I": 1 }, "products": { "R": 1 }, "rate": 0.1 },
            ],
        }),
    )
}

async fn run(transport: Transport, endpoint: NetworkEndpoint) -> io::Result<()> {
    let mut client = SimulationClient::connect(&transport, &endpoint).await?;
    client.init(MODEL, &seir()).await?;

    let request = SimulationRequest {
        model: MODEL.to_string(),
        initial_state: vec![990.0, 0.0, 10.0, 0.0],
        sampling: SamplingSpec {
            points: POINTS,
            deadline: DEADLINE,
        },
        replicas: REPLICAS,
        deadline: DEADLINE,
        max_steps: None,
        seed: None,
    };

    let sampled = client.submit(&request).await?;
    info!("sampled {} trajectories", sampled.trajectories);

    println!("{:>8} {:>10} {:>10}", "time", "infected", "variance");
    let infected = sampled.mean_of(2);
    let variance = sampled.variance_of(2);
    for ((time, mean), var) in sampled.times.iter().zip(infected).zip(variance) {
        println!("{time:>8.1} {mean:>10.2} {var:>10.2}");
    }

    client.close(MODEL).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let transport = Transport::from_env()?;
    let addr = env::var("COORDINATOR").map_err(io::Error::other)?;
    let endpoint = NetworkEndpoint::parse(&addr, transport.mode())?;

    tokio::select! {
        ret = run(transport, endpoint) => ret?,
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}
