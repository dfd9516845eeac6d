use std::{io, sync::Arc};

use comms::Transport;
use log::info;
use simulation::{Catalog, ModelRegistry};
use tokio::signal;

use coordinator::{Coordinator, CoordinatorConfig};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let transport = Transport::from_env()?;
    let config = CoordinatorConfig::from_env(transport.mode())?;

    let listener = transport.bind(config.host(), config.port()).await?;
    info!(
        "listening at {}:{} over {:?}, {} workers, batches of at most {}",
        config.host(),
        config.port(),
        transport.mode(),
        config.workers().len(),
        config.policy().max_batch()
    );
    info!(
        "requests are bounded to {} replicas and {} sampling points",
        config.limits().max_replicas(),
        config.limits().max_points()
    );

    let registry = ModelRegistry::new(Catalog::builtin(), config.trust().clone());
    let coordinator = Coordinator::new(
        registry,
        transport,
        config.workers().to_vec(),
        config.policy(),
    )
    .with_limits(config.limits());
    let coordinator = Arc::new(coordinator);

    tokio::select! {
        ret = Arc::clone(&coordinator).serve(listener) => ret?,
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    info!("wrapping up, clearing {} models", coordinator.registry().len());
    coordinator.shutdown();

    Ok(())
}
