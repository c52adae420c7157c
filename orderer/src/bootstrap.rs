//! First-time initialization of an orderer node.
//!
//! The [Bootstrapper] moves through a fixed sequence of states:
//!
//! ```txt
//! Uninitialized -> WritingArtifacts -> GeneratingIdentity -> GeneratingGenesisBlock -> Initialized
//! ```
//!
//! `Initialized` is durable: it is backed by the marker in the artifact
//! directory. When the marker is present at startup, every step is skipped.
//! Regenerating identity material or the genesis block under an existing
//! ledger would invalidate everything signed against the old material.
//!
//! Any failure aborts the sequence and leaves the artifact directory as it is.
//! Nothing is rolled back, so the directory must be cleared before retrying.

use crate::{
    artifacts::Artifacts, config::BootstrapParameters, synthesizer, tools::Toolchain, Error,
};
use tracing::info;

/// Progress of the bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    WritingArtifacts,
    GeneratingIdentity,
    GeneratingGenesisBlock,
    Initialized,
}

/// Drives first-time initialization exactly once per artifact directory.
pub struct Bootstrapper<'a, T: Toolchain> {
    params: &'a BootstrapParameters,
    artifacts: Artifacts,
    tools: T,
    state: State,
}

impl<'a, T: Toolchain> Bootstrapper<'a, T> {
    pub fn new(params: &'a BootstrapParameters, tools: T) -> Self {
        Self {
            params,
            artifacts: Artifacts::new(&params.share_dir),
            tools,
            state: State::Uninitialized,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        info!(from = ?self.state, to = ?next, "bootstrap transition");
        self.state = next;
    }

    /// Run every outstanding step, returning the final state.
    pub async fn run(&mut self) -> Result<State, Error> {
        if self.artifacts.is_initialized() {
            info!(path = ?self.artifacts.dir(), "already initialized");
            self.state = State::Initialized;
            return Ok(self.state);
        }

        // Validate inputs before touching the filesystem
        let params = self.params;
        let admin_cert = credential(&params.peer_admin_cert, "peer admin certificate")?;
        let ca_cert = credential(&params.peer_ca_cert, "peer CA certificate")?;
        let documents = synthesizer::synthesize(params)?;

        self.transition(State::WritingArtifacts);
        self.artifacts.ensure_dir()?;
        self.artifacts.write_identity_config(&documents)?;

        self.transition(State::GeneratingIdentity);
        self.tools.generate_identity(self.artifacts.dir()).await?;

        self.transition(State::GeneratingGenesisBlock);
        self.artifacts
            .write_peer_msp(&params.peer_org, admin_cert, ca_cert)?;
        self.artifacts.write_topology_config(&documents)?;
        self.tools
            .generate_genesis_block(self.artifacts.dir())
            .await?;

        self.artifacts.mark_initialized()?;
        self.transition(State::Initialized);
        Ok(self.state)
    }
}

fn credential<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, Error> {
    match value.as_deref() {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::MissingCredential(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::{
            PeerMsp, CONFIGTX_FILE_NAME, CRYPTO_CONFIG_FILE_NAME, GENESIS_BLOCK_FILE_NAME,
            INIT_COMPLETED_FILE_NAME,
        },
        config::{Mode, OrgName},
        mocks::{self, Step},
        tools::Binaries,
    };
    use std::{fs, path::PathBuf};

    fn params(dir: PathBuf) -> BootstrapParameters {
        BootstrapParameters {
            org: OrgName::new("Acme").unwrap(),
            peer_org: OrgName::new("Globex").unwrap(),
            peer_admin_cert: Some("admin-pem".into()),
            peer_ca_cert: Some("ca-pem".into()),
            share_dir: dir,
            worker_node_ip: "10.0.0.1".into(),
            orderer_port: 7050,
            peer_anchor_host: "10.0.0.2".into(),
            peer_anchor_port: 7051,
            mode: Mode::Kafka {
                namespace: "ns1".into(),
            },
            instance_id: None,
            binaries: Binaries::default(),
        }
    }

    fn scratch() -> PathBuf {
        std::env::temp_dir()
            .join(format!("orderer-bootstrap-{}", uuid::Uuid::new_v4()))
            .join("crypto")
    }

    #[tokio::test]
    async fn test_full_bootstrap() {
        let params = params(scratch());
        let tools = mocks::Tools::default();
        let mut bootstrapper = Bootstrapper::new(&params, tools.clone());
        assert_eq!(bootstrapper.state(), State::Uninitialized);
        assert_eq!(bootstrapper.run().await.unwrap(), State::Initialized);
        assert_eq!(tools.calls(), vec![Step::Identity, Step::GenesisBlock]);

        let dir = &params.share_dir;
        let docs = synthesizer::synthesize(&params).unwrap();
        assert_eq!(
            fs::read_to_string(dir.join(CRYPTO_CONFIG_FILE_NAME)).unwrap(),
            docs.identity
        );
        assert_eq!(
            fs::read_to_string(dir.join(CONFIGTX_FILE_NAME)).unwrap(),
            docs.topology
        );
        assert!(dir.join(GENESIS_BLOCK_FILE_NAME).exists());
        assert!(dir.join(INIT_COMPLETED_FILE_NAME).exists());
        let msp = PeerMsp::new(dir, &params.peer_org);
        assert_eq!(fs::read_to_string(msp.admin_cert).unwrap(), "admin-pem");
        assert_eq!(fs::read_to_string(msp.ca_cert).unwrap(), "ca-pem");

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_idempotent() {
        let params = params(scratch());
        let dir = &params.share_dir;
        Bootstrapper::new(&params, mocks::Tools::default())
            .run()
            .await
            .unwrap();
        let modified = |name: &str| fs::metadata(dir.join(name)).unwrap().modified().unwrap();
        let before = [
            modified(CRYPTO_CONFIG_FILE_NAME),
            modified(CONFIGTX_FILE_NAME),
        ];

        // A second run must neither write nor invoke anything
        fs::remove_file(PeerMsp::new(dir, &params.peer_org).admin_cert).unwrap();
        let tools = mocks::Tools::default();
        let mut bootstrapper = Bootstrapper::new(&params, tools.clone());
        assert_eq!(bootstrapper.run().await.unwrap(), State::Initialized);
        assert!(tools.calls().is_empty());
        assert!(!PeerMsp::new(dir, &params.peer_org).admin_cert.exists());
        let after = [
            modified(CRYPTO_CONFIG_FILE_NAME),
            modified(CONFIGTX_FILE_NAME),
        ];
        assert_eq!(before, after);

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_marker_only_skips_everything() {
        let params = params(scratch());
        let dir = &params.share_dir;
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(INIT_COMPLETED_FILE_NAME), "").unwrap();

        let tools = mocks::Tools::default();
        let state = Bootstrapper::new(&params, tools.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(state, State::Initialized);
        assert!(tools.calls().is_empty());
        assert!(!dir.join(CRYPTO_CONFIG_FILE_NAME).exists());
        assert!(!dir.join(CONFIGTX_FILE_NAME).exists());

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_missing_admin_cert() {
        let mut params = params(scratch());
        params.peer_admin_cert = Some(String::new());
        let tools = mocks::Tools::default();
        let mut bootstrapper = Bootstrapper::new(&params, tools.clone());
        let err = bootstrapper.run().await.unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
        assert_eq!(bootstrapper.state(), State::Uninitialized);
        assert!(tools.calls().is_empty());
        assert!(!params.share_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_ca_cert() {
        let mut params = params(scratch());
        params.peer_ca_cert = None;
        let err = Bootstrapper::new(&params, mocks::Tools::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
        assert!(!params.share_dir.exists());
    }

    #[tokio::test]
    async fn test_identity_failure_aborts() {
        let params = params(scratch());
        let dir = &params.share_dir;
        let tools = mocks::Tools::failing(Step::Identity);
        let mut bootstrapper = Bootstrapper::new(&params, tools.clone());
        let err = bootstrapper.run().await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation { .. }));
        assert_eq!(bootstrapper.state(), State::GeneratingIdentity);
        assert_eq!(tools.calls(), vec![Step::Identity]);

        // Partial state is left behind, without the marker
        assert!(dir.join(CRYPTO_CONFIG_FILE_NAME).exists());
        assert!(!dir.join(CONFIGTX_FILE_NAME).exists());
        assert!(!dir.join(INIT_COMPLETED_FILE_NAME).exists());

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_genesis_failure_aborts() {
        let params = params(scratch());
        let dir = &params.share_dir;
        let tools = mocks::Tools::failing(Step::GenesisBlock);
        let mut bootstrapper = Bootstrapper::new(&params, tools.clone());
        let err = bootstrapper.run().await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation { .. }));
        assert_eq!(bootstrapper.state(), State::GeneratingGenesisBlock);
        assert_eq!(tools.calls(), vec![Step::Identity, Step::GenesisBlock]);
        assert!(dir.join(CONFIGTX_FILE_NAME).exists());
        assert!(!dir.join(INIT_COMPLETED_FILE_NAME).exists());

        // Retrying without clearing the directory runs every step again
        let tools = mocks::Tools::default();
        let state = Bootstrapper::new(&params, tools.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(state, State::Initialized);
        assert_eq!(tools.calls(), vec![Step::Identity, Step::GenesisBlock]);

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}
