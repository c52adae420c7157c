//! Immutable bootstrap parameters, sourced once from the environment.

use crate::{tools::Binaries, Error};
use std::{fmt, path::PathBuf};

/// Default directory for generated artifacts
pub const DEFAULT_SHARE_DIR: &str = "./crypto";

/// Default address advertised for the ordering service
pub const DEFAULT_WORKER_NODE_IP: &str = "127.0.0.1";

/// Default port of the ordering service
pub const DEFAULT_ORDERER_PORT: u16 = 7050;

/// Name of the replicated-log backend
pub const KAFKA: &str = "kafka";

/// Name of the single-process backend
pub const SOLO: &str = "solo";

/// Normalize an organization name to its canonical (PascalCase) form.
///
/// Words are split on non-alphanumeric characters and on case boundaries
/// (`acmeCorp`, `ACMECorp`), then each word is capitalized. `"acme corp"`,
/// `"acme-corp"` and `"AcmeCorp"` all normalize to `"AcmeCorp"`.
pub fn normalize(raw: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;
    for c in raw.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            if c.is_uppercase() && (p.is_lowercase() || p.is_numeric()) {
                words.push(std::mem::take(&mut current));
            } else if c.is_lowercase() && p.is_uppercase() && current.chars().count() > 1 {
                // Acronym followed by a word ("ACMECorp"): the last capital starts the word
                current.pop();
                words.push(std::mem::take(&mut current));
                current.push(p);
            }
        }
        current.push(c);
        prev = Some(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let mut normalized = String::new();
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            normalized.extend(first.to_uppercase());
            normalized.push_str(&chars.as_str().to_lowercase());
        }
    }
    normalized
}

/// An organization name in canonical form.
///
/// Every path, domain, hostname and document key derived from an organization
/// goes through [OrgName::canonical] or [OrgName::lower] so that no two derived
/// tokens can disagree on casing.
///
/// Distinct canonical names may share a lowercase form (`Acme2Corp` and
/// `Acme2corp`), and therefore the same domains and hostnames. Organizations
/// sharing one network must differ in their lowercase form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrgName {
    canonical: String,
    lower: String,
}

impl OrgName {
    /// Normalize `raw`, failing if nothing remains.
    pub fn new(raw: &str) -> Result<Self, Error> {
        let canonical = normalize(raw);
        if canonical.is_empty() {
            return Err(Error::Configuration(format!(
                "organization name {raw:?} is empty after normalization"
            )));
        }
        let lower = canonical.to_lowercase();
        Ok(Self { canonical, lower })
    }

    /// PascalCase form (document keys and entry names).
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Lowercase form (domains, hostnames and paths).
    pub fn lower(&self) -> &str {
        &self.lower
    }
}

impl fmt::Display for OrgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Ordering-service backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Single-process ordering
    Solo,
    /// Replicated-log ordering, with brokers living in `namespace`
    Kafka { namespace: String },
    /// Any other backend, carried verbatim into the topology document
    Other(String),
}

impl Mode {
    /// Ordering type as written to the topology document.
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Solo => SOLO,
            Mode::Kafka { .. } => KAFKA,
            Mode::Other(name) => name,
        }
    }
}

/// Everything the bootstrap needs, read once at process entry.
#[derive(Clone, Debug)]
pub struct BootstrapParameters {
    pub org: OrgName,
    pub peer_org: OrgName,
    pub peer_admin_cert: Option<String>,
    pub peer_ca_cert: Option<String>,
    pub share_dir: PathBuf,
    pub worker_node_ip: String,
    pub orderer_port: u16,
    pub peer_anchor_host: String,
    pub peer_anchor_port: u16,
    pub mode: Mode,
    pub instance_id: Option<String>,
    pub binaries: Binaries,
}

impl BootstrapParameters {
    /// Load parameters from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load parameters from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let org = OrgName::new(&get("ORG_NAME").unwrap_or_default())?;
        let peer_org = OrgName::new(&get("PEER_ORG_NAME").unwrap_or_default())?;
        let mode = match get("ORDERER_TYPE").as_deref() {
            None | Some(SOLO) => Mode::Solo,
            Some(KAFKA) => Mode::Kafka {
                namespace: get("KAFKA_NAMESPACE").ok_or_else(|| {
                    Error::Configuration("KAFKA_NAMESPACE is required in kafka mode".into())
                })?,
            },
            Some(other) => Mode::Other(other.to_string()),
        };
        let peer_anchor_host = get("PEER_WORKERNODE_IP")
            .ok_or_else(|| Error::Configuration("PEER_WORKERNODE_IP is required".into()))?;
        let peer_anchor_port = match get("PEER_ANCHOR_PORT") {
            Some(port) => parse_port("PEER_ANCHOR_PORT", &port)?,
            None => {
                return Err(Error::Configuration("PEER_ANCHOR_PORT is required".into()));
            }
        };
        let orderer_port = match get("ORDERER_PORT") {
            Some(port) => parse_port("ORDERER_PORT", &port)?,
            None => DEFAULT_ORDERER_PORT,
        };
        let mut binaries = Binaries::default();
        if let Some(path) = get("CRYPTOGEN_BIN") {
            binaries.cryptogen = PathBuf::from(path);
        }
        if let Some(path) = get("CONFIGTXGEN_BIN") {
            binaries.configtxgen = PathBuf::from(path);
        }

        Ok(Self {
            org,
            peer_org,
            peer_admin_cert: get("PEER_ORG_ADMIN_CERT"),
            peer_ca_cert: get("PEER_ORG_CA_CERT"),
            share_dir: PathBuf::from(get("SHARE_FILE_DIR").unwrap_or(DEFAULT_SHARE_DIR.into())),
            worker_node_ip: get("WORKER_NODE_IP").unwrap_or(DEFAULT_WORKER_NODE_IP.into()),
            orderer_port,
            peer_anchor_host,
            peer_anchor_port,
            mode,
            instance_id: get("INSTANCE_ID"),
            binaries,
        })
    }

    /// Key of this node's record in the status store.
    pub fn status_key(&self) -> String {
        match &self.instance_id {
            Some(id) => id.clone(),
            None => self.org.lower().to_string(),
        }
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{key} is not a valid port: {value:?}")))
}
