use std::{io, sync::Arc};

use comms::Transport;
use log::info;
use simulation::{Catalog, ModelRegistry};
use tokio::signal;

use worker::{ExecutionPool, WorkerConfig, WorkerService};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = WorkerConfig::from_env()?;
    let transport = Transport::from_env()?;

    let listener = transport.bind(config.host(), config.port()).await?;
    info!(
        "listening at {}:{} over {:?} with {} simulation threads",
        config.host(),
        config.port(),
        transport.mode(),
        config.pool_size()
    );

    let registry = ModelRegistry::new(Catalog::builtin(), config.trust().clone());
    let pool = ExecutionPool::new(config.pool_size())?;
    let service = Arc::new(WorkerService::new(registry, pool));

    tokio::select! {
        ret = Arc::clone(&service).serve(listener) => ret?,
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    info!("wrapping up, clearing {} models", service.registry().len());
    service.shutdown();

    Ok(())
}
