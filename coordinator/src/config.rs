use std::{env, io, num::NonZeroUsize};

use comms::{NetworkEndpoint, TransportMode};
use simulation::TrustPolicy;

use crate::{
    limits::{DEFAULT_MAX_POINTS, DEFAULT_MAX_REPLICAS, RequestLimits},
    partition::PartitionPolicy,
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_MAX_BATCH: NonZeroUsize = NonZeroUsize::new(64).unwrap();

/// Runtime settings of a coordinator process.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    host: String,
    port: u16,
    workers: Vec<NetworkEndpoint>,
    policy: PartitionPolicy,
    limits: RequestLimits,
    trust: TrustPolicy,
}

impl CoordinatorConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        workers: Vec<NetworkEndpoint>,
        policy: PartitionPolicy,
        limits: RequestLimits,
        trust: TrustPolicy,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            workers,
            policy,
            limits,
            trust,
        }
    }

    /// Reads `HOST`, `PORT`, `WORKERS`, `MAX_BATCH`, `MAX_REPLICAS`,
    /// `MAX_POINTS` and `TRUSTED_MODELS`.
    ///
    /// `WORKERS` is a comma separated list of `host:port` addresses, they are
    /// all reached with `mode`.
    ///
    /// # Args
    /// * `mode` - The transport the worker pool is reached with.
    ///
    /// # Returns
    /// The configuration or an io error if a required variable is missing
    /// or a value doesn't parse.
    pub fn from_env(mode: TransportMode) -> io::Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = env::var("PORT")
            .map_err(io::Error::other)?
            .parse()
            .map_err(io::Error::other)?;

        let workers = parse_workers(&env::var("WORKERS").map_err(io::Error::other)?, mode)?;

        let max_batch = env_or("MAX_BATCH", DEFAULT_MAX_BATCH)?;

        let limits = RequestLimits::new(
            env_or("MAX_REPLICAS", DEFAULT_MAX_REPLICAS)?,
            env_or("MAX_POINTS", DEFAULT_MAX_POINTS)?,
        );

        Ok(Self::new(
            host,
            port,
            workers,
            PartitionPolicy::new(max_batch),
            limits,
            TrustPolicy::from_env(),
        ))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn workers(&self) -> &[NetworkEndpoint] {
        &self.workers
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    pub fn limits(&self) -> RequestLimits {
        self.limits
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }
}

/// Reads a positive count from `var`, `default` if it isn't set.
fn env_or(var: &str, default: NonZeroUsize) -> io::Result<NonZeroUsize> {
    match env::var(var) {
        Ok(value) => value.parse().map_err(io::Error::other),
        Err(_) => Ok(default),
    }
}

/// Parses a comma separated worker list, blank entries are skipped.
///
/// # Returns
/// The endpoints or an `InvalidInput` error if the list is empty or an
/// entry isn't a valid address.
pub fn parse_workers(list: &str, mode: TransportMode) -> io::Result<Vec<NetworkEndpoint>> {
    let workers = list
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| NetworkEndpoint::parse(addr, mode))
        .collect::<io::Result<Vec<_>>>()?;

    if workers.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no worker address configured",
        ));
    }

    Ok(workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_worker_list() {
        let workers = parse_workers(" w1:7000, [::1]:7001,,", TransportMode::Tls).unwrap();

        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].host(), "w1");
        assert_eq!(workers[1].port(), 7001);
        assert!(workers.iter().all(|w| w.mode() == TransportMode::Tls));
    }

    #[test]
    fn rejects_empty_or_malformed_lists() {
        assert!(parse_workers(" , ", TransportMode::Plain).is_err());
        assert!(parse_workers("w1", TransportMode::Plain).is_err());
    }
}
