use std::{io, sync::Arc};

use comms::{
    FrameReceiver, FrameSender, Listener, NetworkEndpoint, Role, Session, Transport,
    msg::{ClientCommand, Command, CoordinatorCommand, Msg},
    specs::simulation::SimulationRequest,
};
use log::{debug, error, info, warn};
use simulation::{ModelFactory, ModelRegistry, SamplingResult, StatisticSampling};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    Result, limits::RequestLimits, partition::PartitionPolicy, scheduler::TaskScheduler,
};

/// A coordinator node: the models clients registered and the worker pool
/// their requests run on.
pub struct Coordinator {
    registry: ModelRegistry,
    transport: Transport,
    workers: Vec<NetworkEndpoint>,
    policy: PartitionPolicy,
    limits: RequestLimits,
}

impl Coordinator {
    /// Creates a new `Coordinator` with the default request limits.
    ///
    /// # Arguments
    /// * `registry` - Where client models are registered.
    /// * `transport` - How workers are reached.
    /// * `workers` - The worker pool.
    /// * `policy` - How replicas are split across the pool.
    pub fn new(
        registry: ModelRegistry,
        transport: Transport,
        workers: Vec<NetworkEndpoint>,
        policy: PartitionPolicy,
    ) -> Self {
        Self {
            registry,
            transport,
            workers,
            policy,
            limits: RequestLimits::default(),
        }
    }

    /// Replaces the bounds client requests are checked against.
    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn workers(&self) -> &[NetworkEndpoint] {
        &self.workers
    }

    pub fn limits(&self) -> RequestLimits {
        self.limits
    }

    /// Accepts client connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: Listener) -> io::Result<()> {
        loop {
            let (rx, tx, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("failed to accept a connection: {e}");
                    continue;
                }
            };

            info!("client connected from {addr}");
            let coordinator = Arc::clone(&self);

            tokio::spawn(async move {
                if let Err(e) = coordinator.handle_connection(rx, tx).await {
                    error!("connection with {addr} failed: {e}");
                }
            });
        }
    }

    /// Runs the command loop of one client connection.
    ///
    /// The connection gets its own worker sessions, they are closed along
    /// with it.
    ///
    /// # Returns
    /// `Ok` once the session is closed or the client disconnects, an io
    /// error otherwise.
    pub async fn handle_connection<R, W>(
        &self,
        mut rx: FrameReceiver<R>,
        mut tx: FrameSender<W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut session = Session::new(Role::Client);
        let mut scheduler =
            TaskScheduler::new(self.transport.clone(), self.workers.clone(), self.policy);
        let mut buf = Vec::new();

        while session.is_active() {
            let cmd = match rx.recv_into(&mut buf).await {
                Ok(Msg::Control(cmd)) => cmd,
                Ok(Msg::Unknown(raw)) => {
                    warn!("ignoring unknown command {raw}");
                    continue;
                }
                Ok(msg) => {
                    warn!("expected a command, got {}", msg.kind());
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    info!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let outcome = self
                .dispatch(cmd, &mut session, &mut scheduler, &mut rx, &mut tx, &mut buf)
                .await;

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_eof() => {
                    info!("client disconnected");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("{cmd} failed: {e}"),
            }
        }

        debug!("session closed");
        Ok(())
    }

    async fn dispatch<R, W>(
        &self,
        cmd: Command,
        session: &mut Session,
        scheduler: &mut TaskScheduler,
        rx: &mut FrameReceiver<R>,
        tx: &mut FrameSender<W>,
        buf: &mut Vec<u8>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Command::Client(cmd) = cmd else {
            warn!("no handler for {cmd}");
            return Ok(());
        };

        match cmd {
            ClientCommand::Ping => {
                tx.send(&Msg::Control(Command::Coordinator(CoordinatorCommand::Pong)))
                    .await?;
            }
            ClientCommand::Init => {
                let name = rx.expect_text(buf).await?;
                let code = rx.expect_bytes(buf).await?;

                if let Err(e) = self.registry.register(&name, &code) {
                    tx.send(&Msg::Err(e.to_string().into())).await?;
                    return Err(e.into());
                }

                session.bind(name);
                tx.send(&Msg::Control(Command::Coordinator(
                    CoordinatorCommand::InitResponse,
                )))
                .await?;
            }
            ClientCommand::Data => {
                let request: SimulationRequest = rx.expect_object(buf).await?;

                if let Err(e) = self.limits.check(&request) {
                    tx.send(&Msg::Err(e.to_string().into())).await?;
                    return Err(e.into());
                }

                let factory = match self.registry.resolve(&request.model) {
                    Ok(factory) => factory,
                    Err(e) => {
                        tx.send(&Msg::Err(e.to_string().into())).await?;
                        return Err(e.into());
                    }
                };

                tx.send(&Msg::Control(Command::Coordinator(
                    CoordinatorCommand::DataResponse,
                )))
                .await?;

                let sampled = match run_request(scheduler, &factory, &request).await {
                    Ok(sampled) => sampled,
                    Err(e) => {
                        tx.send(&Msg::Err(e.to_string().into())).await?;
                        return Err(e);
                    }
                };

                tx.send(&Msg::Control(Command::Coordinator(CoordinatorCommand::Results)))
                    .await?;
                tx.send_object(&sampled).await?;
            }
            ClientCommand::CloseConnection => {
                let name = rx.expect_text(buf).await?;
                self.registry.evict(&name);
                scheduler.close(&name).await;
                session.close();
            }
        }

        Ok(())
    }

    /// Forgets every registered model.
    pub fn shutdown(&self) {
        self.registry.clear();
    }
}

/// Runs a request on the worker pool and samples its trajectories.
async fn run_request(
    scheduler: &mut TaskScheduler,
    factory: &ModelFactory,
    request: &SimulationRequest,
) -> Result<SamplingResult> {
    let result = scheduler.submit(factory, request).await?;

    let mut sampling = StatisticSampling::new(request.sampling, factory.model().arity());
    sampling.ingest_all(&result)?;
    debug!(model = factory.name(), trajectories = sampling.count(); "request sampled");

    Ok(sampling.finish())
}
