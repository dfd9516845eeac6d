use std::{collections::HashMap, io};

use comms::{
    ExchangeErr, NetRx, NetTx, NetworkEndpoint, Transport,
    msg::{Command, CoordinatorCommand, Msg, Payload, WorkerCommand},
    specs::simulation::TaskBatch,
};
use log::debug;
use simulation::{ComputationResult, ModelFactory, SampleLayout, decode_stream};

use crate::error::DispatchErr;

/// An open session with one worker.
///
/// Remembers which models the worker acknowledged on this session, a model
/// is only sent again if it was re-registered with a different blob.
pub struct WorkerLink {
    endpoint: NetworkEndpoint,
    rx: NetRx,
    tx: NetTx,
    acked: HashMap<String, String>,
    buf: Vec<u8>,
}

impl WorkerLink {
    /// Opens a session with the worker at `endpoint`.
    pub async fn connect(transport: &Transport, endpoint: &NetworkEndpoint) -> io::Result<Self> {
        let (rx, tx) = transport.open(endpoint).await?;
        debug!(worker:% = endpoint; "opened worker session");

        Ok(Self {
            endpoint: endpoint.clone(),
            rx,
            tx,
            acked: HashMap::new(),
            buf: Vec::new(),
        })
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    /// Whether the worker acknowledged this exact model on this session.
    pub fn has_model(&self, factory: &ModelFactory) -> bool {
        self.acked.get(factory.name()).map(String::as_str) == Some(factory.fingerprint())
    }

    /// Registers the model on the worker unless it already acknowledged it.
    pub async fn ensure_model(&mut self, factory: &ModelFactory) -> Result<(), DispatchErr> {
        if self.has_model(factory) {
            return Ok(());
        }

        self.exchange_init(factory)
            .await
            .map_err(|e| DispatchErr::exchange(self.endpoint.to_string(), e))?;

        debug!(worker:% = self.endpoint, model = factory.name(); "model acknowledged");
        self.acked
            .insert(factory.name().to_string(), factory.fingerprint().to_string());

        Ok(())
    }

    async fn exchange_init(&mut self, factory: &ModelFactory) -> Result<(), ExchangeErr> {
        let Self { rx, tx, buf, .. } = self;

        tx.send(&Msg::Control(Command::Coordinator(CoordinatorCommand::Init)))
            .await?;
        tx.send(&Msg::Data(Payload::Text(factory.name()))).await?;
        tx.send(&Msg::Data(Payload::Bytes(factory.code()))).await?;

        rx.expect_command(buf, Command::Worker(WorkerCommand::InitResponse))
            .await
    }

    /// Sends one batch and waits for its trajectories.
    ///
    /// # Arguments
    /// * `batch` - The tasks to run.
    /// * `layout` - The record layout of the batch's model.
    ///
    /// # Returns
    /// Exactly one trajectory per task, in task order.
    pub async fn run_batch(
        &mut self,
        batch: &TaskBatch,
        layout: SampleLayout,
    ) -> Result<ComputationResult, DispatchErr> {
        let compressed = self
            .exchange_task(batch)
            .await
            .map_err(|e| DispatchErr::exchange(self.endpoint.to_string(), e))?;

        let reader = comms::decompressor(&compressed).map_err(|e| DispatchErr::Io {
            worker: self.endpoint.to_string(),
            source: e.into(),
        })?;

        let result = decode_stream(reader, layout).map_err(|source| DispatchErr::Codec {
            worker: self.endpoint.to_string(),
            source,
        })?;

        if result.len() != batch.len() {
            return Err(DispatchErr::ResultCount {
                worker: self.endpoint.to_string(),
                got: result.len(),
                expected: batch.len(),
            });
        }

        Ok(result)
    }

    async fn exchange_task(&mut self, batch: &TaskBatch) -> Result<Vec<u8>, ExchangeErr> {
        let Self { rx, tx, buf, .. } = self;

        tx.send(&Msg::Control(Command::Coordinator(CoordinatorCommand::Task)))
            .await?;
        tx.send_object(batch).await?;

        rx.expect_results(buf).await
    }

    /// Checks the worker is alive.
    pub async fn ping(&mut self) -> Result<(), DispatchErr> {
        self.exchange_ping()
            .await
            .map_err(|e| DispatchErr::exchange(self.endpoint.to_string(), e))
    }

    async fn exchange_ping(&mut self) -> Result<(), ExchangeErr> {
        let Self { rx, tx, buf, .. } = self;

        tx.send(&Msg::Control(Command::Coordinator(CoordinatorCommand::Ping)))
            .await?;

        rx.expect_command(buf, Command::Worker(WorkerCommand::Pong))
            .await
    }

    /// Asks the worker to evict `model` and ends the session.
    pub async fn close(mut self, model: &str) -> io::Result<()> {
        self.tx
            .send(&Msg::Control(Command::Coordinator(
                CoordinatorCommand::CloseConnection,
            )))
            .await?;
        self.tx.send(&Msg::Data(Payload::Text(model))).await?;
        self.tx.close().await
    }
}
