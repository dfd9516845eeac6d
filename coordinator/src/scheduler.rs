use comms::{
    NetworkEndpoint, Transport,
    specs::simulation::{SimulationRequest, SimulationTask, TaskBatch},
};
use futures::future::try_join_all;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use simulation::{ComputationResult, ModelFactory};

use crate::{error::DispatchErr, link::WorkerLink, partition::PartitionPolicy};

/// Splits requests into batches and runs them on the configured workers.
///
/// Owned by one client connection, the worker sessions it opens are only
/// used by that connection's requests.
pub struct TaskScheduler {
    transport: Transport,
    endpoints: Vec<NetworkEndpoint>,
    links: Vec<Option<WorkerLink>>,
    policy: PartitionPolicy,
}

impl TaskScheduler {
    /// Creates a new `TaskScheduler` without any open session.
    ///
    /// # Arguments
    /// * `transport` - How workers are reached.
    /// * `endpoints` - The worker pool.
    /// * `policy` - How replicas are split.
    pub fn new(
        transport: Transport,
        endpoints: Vec<NetworkEndpoint>,
        policy: PartitionPolicy,
    ) -> Self {
        let links = endpoints.iter().map(|_| None).collect();

        Self {
            transport,
            endpoints,
            links,
            policy,
        }
    }

    /// The amount of open worker sessions.
    pub fn connected(&self) -> usize {
        self.links.iter().flatten().count()
    }

    /// Runs every replica of a request and merges their trajectories.
    ///
    /// Returns only once every batch completed, no partial result is ever
    /// produced. A failed worker is not retried. Tasks are only created as
    /// their batch is sent.
    ///
    /// # Arguments
    /// * `factory` - The registered model of the request.
    /// * `request` - What to simulate.
    ///
    /// # Returns
    /// `request.replicas` trajectories, grouped by worker then batch.
    pub async fn submit(
        &mut self,
        factory: &ModelFactory,
        request: &SimulationRequest,
    ) -> Result<ComputationResult, DispatchErr> {
        self.connect().await;

        let available: Vec<_> = self.links.iter_mut().flatten().collect();
        if available.is_empty() {
            return Err(DispatchErr::NoWorkers);
        }

        let workers = available.len();
        let shares = self.policy.shares(request.replicas, workers);
        let policy = self.policy;
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let jobs = available.into_iter().zip(shares).map(|(link, share)| {
            let source = TaskSource::new(rng.random(), factory.name(), request);
            run_link(link, factory, policy, share, source)
        });

        info!(
            model = factory.name(), replicas = request.replicas, workers = workers;
            "dispatching request"
        );

        let outcome = try_join_all(jobs).await;
        match outcome {
            Ok(results) => Ok(results.into_iter().fold(ComputationResult::new(), |mut acc, r| {
                acc.merge(r);
                acc
            })),
            Err(e) => {
                // Other links may be halfway through an exchange.
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Forwards an eviction to every open worker session and closes them.
    pub async fn close(&mut self, model: &str) {
        for link in self.links.iter_mut().filter_map(Option::take) {
            let worker = link.endpoint().to_string();

            if let Err(e) = link.close(model).await {
                warn!("failed to close the session with {worker}: {e}");
            }
        }
    }

    /// Drops every open worker session.
    pub fn disconnect(&mut self) {
        self.links.iter_mut().for_each(|link| *link = None);
    }

    /// Opens the missing sessions and checks the existing ones are alive.
    async fn connect(&mut self) {
        for (endpoint, slot) in self.endpoints.iter().zip(self.links.iter_mut()) {
            if let Some(link) = slot {
                if let Err(e) = link.ping().await {
                    warn!("dropping stale session: {e}");
                    *slot = None;
                }
            }

            if slot.is_some() {
                continue;
            }

            match WorkerLink::connect(&self.transport, endpoint).await {
                Ok(link) => *slot = Some(link),
                Err(e) => warn!("skipping unreachable worker {endpoint}: {e}"),
            }
        }
    }
}

async fn run_link(
    link: &mut WorkerLink,
    factory: &ModelFactory,
    policy: PartitionPolicy,
    share: usize,
    mut source: TaskSource<'_>,
) -> Result<ComputationResult, DispatchErr> {
    let mut result = ComputationResult::new();
    if share == 0 {
        return Ok(result);
    }

    link.ensure_model(factory).await?;

    for size in policy.batches(share) {
        let batch = source.batch(size);
        debug!(worker:% = link.endpoint(), tasks = batch.len(); "sending batch");
        result.merge(link.run_batch(&batch, factory.layout()).await?);
    }

    Ok(result)
}

/// Draws the tasks of one worker's share, a batch at a time.
struct TaskSource<'a> {
    rng: StdRng,
    model: &'a str,
    request: &'a SimulationRequest,
}

impl<'a> TaskSource<'a> {
    fn new(seed: u64, model: &'a str, request: &'a SimulationRequest) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            model,
            request,
        }
    }

    /// Creates the next `size` tasks, each with a fresh seed.
    fn batch(&mut self, size: usize) -> TaskBatch {
        let tasks = (0..size)
            .map(|_| SimulationTask {
                seed: self.rng.random(),
                model: self.model.to_string(),
                initial_state: self.request.initial_state.clone(),
                deadline: self.request.deadline,
                max_steps: self.request.max_steps,
            })
            .collect();

        TaskBatch { tasks }
    }
}
