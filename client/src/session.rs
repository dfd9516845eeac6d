use comms::{
    NetRx, NetTx, NetworkEndpoint, Transport,
    msg::{ClientCommand, Command, CoordinatorCommand, Msg, Payload},
    specs::{model::ModelSpec, simulation::SimulationRequest},
};
use log::{debug, info};
use simulation::SamplingResult;

use crate::error::ClientErr;

/// An open session with a coordinator.
///
/// Requests are answered in order, one at a time. Worker sessions opened on
/// behalf of this client live as long as it does.
pub struct SimulationClient {
    endpoint: NetworkEndpoint,
    rx: NetRx,
    tx: NetTx,
    buf: Vec<u8>,
}

impl SimulationClient {
    /// Connects to the coordinator at `endpoint`.
    ///
    /// # Arguments
    /// * `transport` - How the coordinator is reached.
    /// * `endpoint` - The coordinator's address.
    ///
    /// # Returns
    /// The client or `ClientErr::ConnectionFailed`.
    pub async fn connect(
        transport: &Transport,
        endpoint: &NetworkEndpoint,
    ) -> Result<Self, ClientErr> {
        let (rx, tx) = transport
            .open(endpoint)
            .await
            .map_err(|source| ClientErr::ConnectionFailed {
                addr: endpoint.to_string(),
                source,
            })?;

        info!("connected to coordinator at {endpoint}");

        Ok(Self {
            endpoint: endpoint.clone(),
            rx,
            tx,
            buf: Vec::new(),
        })
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    /// Registers a model under `name`, replacing any model with that name.
    pub async fn init(&mut self, name: &str, spec: &ModelSpec) -> Result<(), ClientErr> {
        let code = spec.to_blob().map_err(ClientErr::InvalidModel)?;
        self.init_blob(name, &code).await
    }

    /// Registers an already serialized model blob.
    pub async fn init_blob(&mut self, name: &str, code: &[u8]) -> Result<(), ClientErr> {
        self.tx.send(&control(ClientCommand::Init)).await?;
        self.tx.send(&Msg::Data(Payload::Text(name))).await?;
        self.tx.send(&Msg::Data(Payload::Bytes(code))).await?;

        self.rx
            .expect_command(&mut self.buf, reply(CoordinatorCommand::InitResponse))
            .await?;

        debug!(model = name; "model registered");
        Ok(())
    }

    /// Runs a request and waits for its statistics.
    ///
    /// # Arguments
    /// * `request` - What to simulate, its model must be registered.
    ///
    /// # Returns
    /// The sampled statistics of every replica, or `ClientErr::Rejected` if
    /// the model is unknown or a worker failed.
    pub async fn submit(
        &mut self,
        request: &SimulationRequest,
    ) -> Result<SamplingResult, ClientErr> {
        self.tx.send(&control(ClientCommand::Data)).await?;
        self.tx.send_object(request).await?;

        self.rx
            .expect_command(&mut self.buf, reply(CoordinatorCommand::DataResponse))
            .await?;
        debug!(model = request.model.as_str(), replicas = request.replicas; "request accepted");

        self.rx
            .expect_command(&mut self.buf, reply(CoordinatorCommand::Results))
            .await?;

        Ok(self.rx.expect_object(&mut self.buf).await?)
    }

    /// Checks the coordinator is alive.
    pub async fn ping(&mut self) -> Result<(), ClientErr> {
        self.tx.send(&control(ClientCommand::Ping)).await?;
        self.rx
            .expect_command(&mut self.buf, reply(CoordinatorCommand::Pong))
            .await?;
        Ok(())
    }

    /// Evicts `model` everywhere and ends the session.
    pub async fn close(mut self, model: &str) -> Result<(), ClientErr> {
        self.tx.send(&control(ClientCommand::CloseConnection)).await?;
        self.tx.send(&Msg::Data(Payload::Text(model))).await?;
        self.tx.close().await?;

        info!("session with {} closed", self.endpoint);
        Ok(())
    }
}

fn control(cmd: ClientCommand) -> Msg<'static> {
    Msg::Control(Command::Client(cmd))
}

fn reply(cmd: CoordinatorCommand) -> Command {
    Command::Coordinator(cmd)
}
