use std::{env, io, num::NonZeroUsize, thread};

use simulation::TrustPolicy;

const DEFAULT_HOST: &str = "127.0.0.1";

/// Runtime settings of a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    host: String,
    port: u16,
    pool_size: NonZeroUsize,
    trust: TrustPolicy,
}

impl WorkerConfig {
    /// Creates a new worker configuration.
    ///
    /// # Args
    /// * `host` - The address to listen at.
    /// * `port` - The port to listen at.
    /// * `pool_size` - Amount of threads simulating tasks.
    /// * `trust` - Which model blobs are accepted.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        pool_size: NonZeroUsize,
        trust: TrustPolicy,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            pool_size,
            trust,
        }
    }

    /// Reads `HOST`, `PORT`, `POOL_SIZE` and `TRUSTED_MODELS`.
    ///
    /// # Returns
    /// The configuration or an io error if `PORT` is missing or a value
    /// doesn't parse.
    pub fn from_env() -> io::Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = env::var("PORT")
            .map_err(io::Error::other)?
            .parse()
            .map_err(io::Error::other)?;

        let pool_size = match env::var("POOL_SIZE") {
            Ok(size) => size.parse().map_err(io::Error::other)?,
            Err(_) => thread::available_parallelism()?,
        };

        Ok(Self::new(host, port, pool_size, TrustPolicy::from_env()))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the size of the execution pool.
    ///
    /// # Returns
    /// The amount of tasks that can run at the same time.
    pub fn pool_size(&self) -> NonZeroUsize {
        self.pool_size
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }
}
