use std::{io, sync::Arc};

use comms::{
    FrameReceiver, FrameSender, Listener, Role, Session,
    msg::{Command, CoordinatorCommand, Msg, Payload, WorkerCommand},
    specs::simulation::TaskBatch,
};
use log::{debug, error, info, warn};
use simulation::{ModelRegistry, encode_result};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{Result, error::WorkerErr, executor::ExecutionPool};

/// A worker node: the models registered on it and the pool running their
/// tasks.
///
/// Every accepted coordinator connection is served by its own task, they
/// all share this registry and pool.
pub struct WorkerService {
    registry: ModelRegistry,
    pool: ExecutionPool,
}

impl WorkerService {
    /// Creates a new `WorkerService` with an empty registry.
    ///
    /// # Arguments
    /// * `registry` - Where models are registered.
    /// * `pool` - Where batches run.
    pub fn new(registry: ModelRegistry, pool: ExecutionPool) -> Self {
        Self { registry, pool }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Accepts coordinator connections until the listener fails.
    ///
    /// A connection that fails its handshake is dropped without stopping the
    /// others.
    pub async fn serve(self: Arc<Self>, listener: Listener) -> io::Result<()> {
        loop {
            let (rx, tx, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("failed to accept a connection: {e}");
                    continue;
                }
            };

            info!("coordinator connected from {addr}");
            let service = Arc::clone(&self);

            tokio::spawn(async move {
                if let Err(e) = service.handle_connection(rx, tx).await {
                    error!("connection with {addr} failed: {e}");
                }
            });
        }
    }

    /// Runs the command loop of one coordinator connection.
    ///
    /// # Returns
    /// `Ok` once the session is closed or the peer disconnects, an io error
    /// otherwise. Failed commands are answered with an `Err` frame and don't
    /// end the loop.
    pub async fn handle_connection<R, W>(
        &self,
        mut rx: FrameReceiver<R>,
        mut tx: FrameSender<W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut session = Session::new(Role::Coordinator);
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
                    info!("coordinator disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            match self.dispatch(cmd, &mut session, &mut rx, &mut tx, &mut buf).await {
                Ok(()) => {}
                Err(e) if e.is_eof() => {
                    info!("coordinator disconnected");
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
        rx: &mut FrameReceiver<R>,
        tx: &mut FrameSender<W>,
        buf: &mut Vec<u8>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Command::Coordinator(cmd) = cmd else {
            warn!("no handler for {cmd}");
            return Ok(());
        };

        match cmd {
            CoordinatorCommand::Ping => {
                tx.send(&Msg::Control(Command::Worker(WorkerCommand::Pong)))
                    .await?;
            }
            CoordinatorCommand::Init => {
                let name = rx.expect_text(buf).await?;
                let code = rx.expect_bytes(buf).await?;

                if let Err(e) = self.registry.register(&name, &code) {
                    tx.send(&Msg::Err(e.to_string().into())).await?;
                    return Err(e.into());
                }

                session.bind(name);
                tx.send(&Msg::Control(Command::Worker(WorkerCommand::InitResponse)))
                    .await?;
            }
            CoordinatorCommand::Task => {
                let batch: TaskBatch = rx.expect_object(buf).await?;

                match self.run_batch(batch).await {
                    Ok(bytes) => tx.send(&Msg::Data(Payload::Results(&bytes))).await?,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        tx.send(&Msg::Err(e.to_string().into())).await?;
                        return Err(e);
                    }
                }
            }
            CoordinatorCommand::CloseConnection => {
                let name = rx.expect_text(buf).await?;
                self.registry.evict(&name);
                session.close();
            }
            other => warn!("no handler for coordinator/{other:?}"),
        }

        Ok(())
    }

    /// Runs a batch and returns its compressed encoding.
    async fn run_batch(&self, batch: TaskBatch) -> Result<Vec<u8>> {
        let Some(name) = batch.tasks.first().map(|task| task.model.clone()) else {
            return Ok(comms::compress(&[])?);
        };

        let factory = self.registry.resolve(&name)?;
        let layout = factory.layout();
        let result = self.pool.run_batch(factory, batch.tasks).await?;
        debug!(model = name.as_str(), trajectories = result.len(); "batch finished");

        let bytes = encode_result(&result, layout)?;
        Ok(comms::compress(&bytes)?)
    }

    /// Forgets every registered model.
    pub fn shutdown(&self) {
        self.registry.clear();
    }
}
