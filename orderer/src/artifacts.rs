//! Persisted layout of the artifact directory.

use crate::{
    config::OrgName,
    synthesizer::{peer_domain, Documents},
    Error,
};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

/// Identity-config document
pub const CRYPTO_CONFIG_FILE_NAME: &str = "crypto-config.yaml";

/// Topology-config document
pub const CONFIGTX_FILE_NAME: &str = "configtx.yaml";

/// Genesis block produced by the genesis-block generator
pub const GENESIS_BLOCK_FILE_NAME: &str = "genesis.block";

/// Marker written once bootstrap has completed
pub const INIT_COMPLETED_FILE_NAME: &str = "initCompleted";

/// Root of generated (and supplied) identity material
pub const CRYPTO_CONFIG_DIR: &str = "crypto-config";

/// Directories of the peer organization's identity store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerMsp {
    pub root: PathBuf,
    pub admin_certs: PathBuf,
    pub ca_certs: PathBuf,
    pub admin_cert: PathBuf,
    pub ca_cert: PathBuf,
}

impl PeerMsp {
    /// Layout of `peer_org`'s identity store under `dir`.
    pub fn new(dir: &Path, peer_org: &OrgName) -> Self {
        let domain = peer_domain(peer_org);
        let root = dir
            .join(CRYPTO_CONFIG_DIR)
            .join("peerOrganizations")
            .join(&domain)
            .join("msp");
        let admin_certs = root.join("admincerts");
        let ca_certs = root.join("cacerts");
        Self {
            admin_cert: admin_certs.join(format!("Admin@{domain}-cert.pem")),
            ca_cert: ca_certs.join(format!("ca.{domain}-cert.pem")),
            root,
            admin_certs,
            ca_certs,
        }
    }
}

/// Writes artifacts into a single directory.
///
/// The initialization marker is checked and later created without a lock:
/// two processes sharing one artifact directory is unsupported.
#[derive(Clone, Debug)]
pub struct Artifacts {
    dir: PathBuf,
}

impl Artifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the initialization marker.
    pub fn marker(&self) -> PathBuf {
        self.dir.join(INIT_COMPLETED_FILE_NAME)
    }

    /// Whether a previous bootstrap completed in this directory.
    pub fn is_initialized(&self) -> bool {
        self.marker().exists()
    }

    /// Create the artifact directory (and any missing parents).
    pub fn ensure_dir(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        info!(path = ?self.dir, "ensured artifact directory");
        Ok(())
    }

    pub fn write_identity_config(&self, documents: &Documents) -> Result<(), Error> {
        self.write(CRYPTO_CONFIG_FILE_NAME, documents.identity.as_bytes())
    }

    pub fn write_topology_config(&self, documents: &Documents) -> Result<(), Error> {
        self.write(CONFIGTX_FILE_NAME, documents.topology.as_bytes())
    }

    /// Write the supplied peer certificates verbatim into the peer identity store.
    pub fn write_peer_msp(
        &self,
        peer_org: &OrgName,
        admin_cert: &str,
        ca_cert: &str,
    ) -> Result<PeerMsp, Error> {
        let msp = PeerMsp::new(&self.dir, peer_org);
        for dir in [&msp.root, &msp.admin_certs, &msp.ca_certs] {
            fs::create_dir_all(dir)?;
        }
        fs::write(&msp.admin_cert, admin_cert)?;
        fs::write(&msp.ca_cert, ca_cert)?;
        info!(path = ?msp.root, "wrote peer identity store");
        Ok(msp)
    }

    /// Create the initialization marker.
    ///
    /// Fails if the marker already exists.
    pub fn mark_initialized(&self) -> Result<(), Error> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.marker())?;
        file.write_all(INIT_COMPLETED_FILE_NAME.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<(), Error> {
        let path = self.dir.join(name);
        fs::write(&path, contents)?;
        info!(?path, "wrote document");
        Ok(())
    }
}
