//! Wait for the ordering service's dependencies, then record the node as running.
//!
//! Every pass checks all required endpoints from scratch. Only when a single
//! pass finds every endpoint reachable is the node's status written, after
//! which polling stops for the rest of the process lifetime. There is no upper
//! bound on the number of passes.

use crate::{
    config::{BootstrapParameters, Mode},
    store::{Status, StatusStore},
    synthesizer::{
        service_host, BROKER_PORT, BROKER_ROLE, COORDINATION_PORT, COORDINATION_ROLE, REPLICAS,
    },
    Error,
};
use futures::future::join_all;
use std::{fmt, future::Future, time::Duration};
use tokio::{net::TcpStream, time::timeout};
use tracing::{debug, info, warn};

/// Interval between readiness passes
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum time a single reachability check may take
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Host the local ordering service is checked on
pub const LOCAL_HOST: &str = "127.0.0.1";

/// A `host:port` pair that must accept connections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Endpoints that must be reachable before the node is considered ready.
pub fn dependencies(params: &BootstrapParameters) -> Vec<Endpoint> {
    let mut endpoints = vec![Endpoint::new(LOCAL_HOST, params.orderer_port)];
    if let Mode::Kafka { namespace } = &params.mode {
        for i in 0..REPLICAS {
            endpoints.push(Endpoint::new(
                service_host(COORDINATION_ROLE, &params.org, namespace, i),
                COORDINATION_PORT,
            ));
        }
        for i in 0..REPLICAS {
            endpoints.push(Endpoint::new(
                service_host(BROKER_ROLE, &params.org, namespace, i),
                BROKER_PORT,
            ));
        }
    }
    endpoints
}

/// Answers whether an endpoint is currently accepting connections.
///
/// Failing to perform the check at all (e.g. name resolution) is reported as unreachable.
pub trait Probe: Send + Sync {
    fn reachable(&self, endpoint: &Endpoint) -> impl Future<Output = bool> + Send;
}

/// [Probe] that attempts a TCP connection.
#[derive(Clone, Debug)]
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

impl Probe for TcpProbe {
    async fn reachable(&self, endpoint: &Endpoint) -> bool {
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        match timeout(self.connect_timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(%endpoint, error = ?err, "endpoint unreachable");
                false
            }
            Err(_) => {
                debug!(%endpoint, "connect timed out");
                false
            }
        }
    }
}

/// Source of the delay between passes.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [Clock] backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What to do when recording readiness fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreWritePolicy {
    /// Surface the error and stop polling (node is ready but unrecorded)
    #[default]
    GiveUp,
    /// Wait one interval and run another full pass
    RetryPass,
}

/// Configuration for the [Poller].
#[derive(Clone, Debug)]
pub struct Config {
    /// Delay between passes
    pub interval: Duration,
    pub policy: StoreWritePolicy,
    /// Stop after this many passes (unbounded if `None`)
    pub max_passes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            policy: StoreWritePolicy::default(),
            max_passes: None,
        }
    }
}

/// How polling ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// All dependencies were reachable and the status was recorded
    Ready { passes: u64 },
    /// `max_passes` elapsed without a successful pass
    Exhausted { passes: u64 },
}

/// Polls dependencies until all are reachable, then marks the node `running`.
pub struct Poller<P: Probe, C: Clock, S: StatusStore> {
    probe: P,
    clock: C,
    store: S,
    endpoints: Vec<Endpoint>,
    key: String,
    cfg: Config,
}

impl<P: Probe, C: Clock, S: StatusStore> Poller<P, C, S> {
    pub fn new(
        probe: P,
        clock: C,
        store: S,
        endpoints: Vec<Endpoint>,
        key: String,
        cfg: Config,
    ) -> Self {
        Self {
            probe,
            clock,
            store,
            endpoints,
            key,
            cfg,
        }
    }

    /// Check every endpoint once, returning whether all were reachable.
    pub async fn pass(&self) -> bool {
        let results = join_all(self.endpoints.iter().map(|e| self.probe.reachable(e))).await;
        let mut ready = true;
        for (endpoint, reachable) in self.endpoints.iter().zip(results) {
            if !reachable {
                debug!(%endpoint, "dependency not ready");
                ready = false;
            }
        }
        ready
    }

    /// Poll until every dependency is reachable in a single pass and the status is recorded.
    pub async fn run(self) -> Result<Outcome, Error> {
        let mut passes = 0;
        loop {
            passes += 1;
            if self.pass().await {
                match self.store.upsert_status(&self.key, Status::Running).await {
                    Ok(()) => {
                        info!(key = self.key.as_str(), passes, "node ready");
                        return Ok(Outcome::Ready { passes });
                    }
                    Err(err) => match self.cfg.policy {
                        StoreWritePolicy::GiveUp => return Err(err),
                        StoreWritePolicy::RetryPass => {
                            warn!(error = ?err, "failed to record readiness");
                        }
                    },
                }
            } else {
                info!(passes, "dependencies not ready");
            }
            if let Some(max) = self.cfg.max_passes {
                if passes >= max {
                    return Ok(Outcome::Exhausted { passes });
                }
            }
            self.clock.sleep(self.cfg.interval).await;
        }
    }
}
