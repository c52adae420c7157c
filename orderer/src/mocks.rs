//! Test doubles for the external collaborators of the bootstrap.
//!
//! Every mock is cheaply cloneable and shares its state between clones, so a
//! test can hand one clone to the component under test and inspect another.

use crate::{
    artifacts::{CRYPTO_CONFIG_DIR, GENESIS_BLOCK_FILE_NAME},
    readiness::{self, Endpoint},
    store::{NodeStatusRecord, Status, StatusStore},
    tools::Toolchain,
    Error,
};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    process::ExitStatus,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Step performed by a [Toolchain].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Identity,
    GenesisBlock,
}

/// [Toolchain] that records invocations instead of running binaries.
#[derive(Clone, Default)]
pub struct Tools {
    calls: Arc<Mutex<Vec<Step>>>,
    fail: Option<Step>,
}

impl Tools {
    /// A toolchain whose `step` exits unsuccessfully.
    pub fn failing(step: Step) -> Self {
        Self {
            calls: Arc::default(),
            fail: Some(step),
        }
    }

    /// Steps invoked so far, in order.
    pub fn calls(&self) -> Vec<Step> {
        self.calls.lock().unwrap().clone()
    }

    fn invoke(&self, step: Step) -> Result<(), Error> {
        self.calls.lock().unwrap().push(step);
        if self.fail == Some(step) {
            return Err(Error::ToolInvocation {
                tool: format!("{step:?}"),
                status: exit_failure(),
            });
        }
        Ok(())
    }
}

/// Exit status of a process that exited with code 1.
#[cfg(unix)]
fn exit_failure() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(1 << 8)
}

/// Exit status of a process that exited with code 1.
#[cfg(windows)]
fn exit_failure() -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(1)
}

impl Toolchain for Tools {
    async fn generate_identity(&self, dir: &Path) -> Result<(), Error> {
        self.invoke(Step::Identity)?;
        std::fs::create_dir_all(dir.join(CRYPTO_CONFIG_DIR).join("ordererOrganizations"))?;
        Ok(())
    }

    async fn generate_genesis_block(&self, dir: &Path) -> Result<(), Error> {
        self.invoke(Step::GenesisBlock)?;
        std::fs::write(dir.join(GENESIS_BLOCK_FILE_NAME), b"genesis")?;
        Ok(())
    }
}

#[derive(Default)]
struct ProbeState {
    /// Number of initial checks each endpoint fails (`None` fails forever)
    failures: HashMap<Endpoint, Option<u64>>,
    /// Number of initial checks every endpoint fails
    all: u64,
    checks: HashMap<Endpoint, u64>,
}

/// Scripted [readiness::Probe].
///
/// Endpoints are reachable unless configured otherwise.
#[derive(Clone, Default)]
pub struct Probe {
    state: Arc<Mutex<ProbeState>>,
}

impl Probe {
    /// Every endpoint is unreachable for its first `checks` checks.
    pub fn fail_all(self, checks: u64) -> Self {
        self.state.lock().unwrap().all = checks;
        self
    }

    /// `endpoint` is unreachable for its first `checks` checks.
    pub fn fail(self, endpoint: Endpoint, checks: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(endpoint, Some(checks));
        self
    }

    /// `endpoint` is never reachable.
    pub fn fail_forever(self, endpoint: Endpoint) -> Self {
        self.state.lock().unwrap().failures.insert(endpoint, None);
        self
    }

    /// Number of times `endpoint` was checked.
    pub fn checks(&self, endpoint: &Endpoint) -> u64 {
        let state = self.state.lock().unwrap();
        state.checks.get(endpoint).copied().unwrap_or_default()
    }
}

impl readiness::Probe for Probe {
    async fn reachable(&self, endpoint: &Endpoint) -> bool {
        let mut state = self.state.lock().unwrap();
        let check = {
            let checks = state.checks.entry(endpoint.clone()).or_default();
            *checks += 1;
            *checks
        };
        if check <= state.all {
            return false;
        }
        match state.failures.get(endpoint) {
            None => true,
            Some(None) => false,
            Some(Some(failures)) => check > *failures,
        }
    }
}

/// [readiness::Clock] that records requested sleeps and returns immediately.
#[derive(Clone, Default)]
pub struct Clock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Clock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl readiness::Clock for Clock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct StoreState {
    records: BTreeMap<String, Option<Status>>,
    writes: usize,
    failures: usize,
    /// Keys whose record disappears right after it is next found
    vanishing: Vec<String>,
}

impl StoreState {
    fn injected_failure(&mut self) -> Result<(), Error> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(Error::StoreUnavailable("injected failure".into()));
        }
        Ok(())
    }
}

/// In-memory [StatusStore].
#[derive(Clone, Default)]
pub struct Store {
    state: Arc<Mutex<StoreState>>,
}

impl Store {
    /// Seed a record.
    pub fn insert(&self, key: &str, status: Option<Status>) {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(key.to_string(), status);
    }

    /// Fail the next `count` writes.
    pub fn fail_writes(&self, count: usize) {
        self.state.lock().unwrap().failures = count;
    }

    /// Delete the record under `key` right after the next lookup returns it.
    pub fn remove_after_find(&self, key: &str) {
        self.state.lock().unwrap().vanishing.push(key.to_string());
    }

    /// Status of the record under `key` (`None` if no record exists).
    pub fn status(&self, key: &str) -> Option<Option<Status>> {
        self.state.lock().unwrap().records.get(key).cloned()
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

impl StatusStore for Store {
    async fn find(&self, key: &str) -> Result<Option<NodeStatusRecord>, Error> {
        let mut state = self.state.lock().unwrap();
        let record = state.records.get(key).map(|status| NodeStatusRecord {
            key: key.to_string(),
            status: status.clone(),
        });
        if let Some(index) = state.vanishing.iter().position(|k| k == key) {
            state.vanishing.remove(index);
            state.records.remove(key);
        }
        Ok(record)
    }

    async fn upsert_status(&self, key: &str, status: Status) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.injected_failure()?;
        state.records.insert(key.to_string(), Some(status));
        state.writes += 1;
        Ok(())
    }

    async fn update_status(&self, key: &str, status: Status) -> Result<bool, Error> {
        let mut state = self.state.lock().unwrap();
        state.injected_failure()?;
        let Some(record) = state.records.get_mut(key) else {
            return Ok(false);
        };
        *record = Some(status);
        state.writes += 1;
        Ok(true)
    }
}
