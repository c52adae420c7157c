//! Invoke the external identity and genesis-block generators.

use crate::{
    artifacts::{CRYPTO_CONFIG_FILE_NAME, GENESIS_BLOCK_FILE_NAME},
    Error,
};
use std::{
    future::Future,
    path::{Path, PathBuf},
};
use tokio::process::Command;
use tracing::{debug, info};

/// Profile of the topology document used to produce the genesis block
pub const GENESIS_PROFILE: &str = "OneOrgGenesis";

/// Environment variable pointing the genesis tool at its configuration
pub const CFG_PATH_ENV: &str = "FABRIC_CFG_PATH";

/// Paths of the external generators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binaries {
    pub cryptogen: PathBuf,
    pub configtxgen: PathBuf,
}

impl Default for Binaries {
    fn default() -> Self {
        Self {
            cryptogen: PathBuf::from("cryptogen"),
            configtxgen: PathBuf::from("configtxgen"),
        }
    }
}

/// Runs the two external generation steps against an artifact directory.
///
/// Each step either succeeds or fails as a whole.
pub trait Toolchain: Send + Sync {
    /// Generate identity material from the identity-config document in `dir`.
    fn generate_identity(&self, dir: &Path) -> impl Future<Output = Result<(), Error>> + Send;

    /// Compile the topology-config document in `dir` into a genesis block.
    fn generate_genesis_block(&self, dir: &Path)
        -> impl Future<Output = Result<(), Error>> + Send;
}

/// [Toolchain] backed by the `cryptogen` and `configtxgen` binaries.
#[derive(Clone, Debug, Default)]
pub struct Fabric {
    binaries: Binaries,
}

impl Fabric {
    pub fn new(binaries: Binaries) -> Self {
        Self { binaries }
    }
}

/// Resolve a relative program path against the current directory.
///
/// Commands run inside the artifact directory, so a relative path such as
/// `./bin/cryptogen` must be fixed before the working directory changes. Bare
/// names are left for the `PATH` lookup.
fn resolve_program(program: &Path) -> Result<PathBuf, Error> {
    if program.is_relative() && program.components().count() > 1 {
        return Ok(std::env::current_dir()?.join(program));
    }
    Ok(program.to_path_buf())
}

/// Run `command` to completion, mapping a non-zero exit to [Error::ToolInvocation].
async fn run(mut command: Command, tool: &Path) -> Result<(), Error> {
    let tool = tool.display().to_string();
    debug!(?command, "running tool");
    let status = command.status().await.map_err(|source| Error::ToolSpawn {
        tool: tool.clone(),
        source,
    })?;
    if !status.success() {
        return Err(Error::ToolInvocation { tool, status });
    }
    info!(tool = tool.as_str(), "tool completed");
    Ok(())
}

impl Toolchain for Fabric {
    async fn generate_identity(&self, dir: &Path) -> Result<(), Error> {
        let dir = tokio::fs::canonicalize(dir).await?;
        let mut command = Command::new(resolve_program(&self.binaries.cryptogen)?);
        command
            .current_dir(&dir)
            .arg("generate")
            .arg(format!("--config=./{CRYPTO_CONFIG_FILE_NAME}"));
        run(command, &self.binaries.cryptogen).await
    }

    async fn generate_genesis_block(&self, dir: &Path) -> Result<(), Error> {
        // The tool resolves the topology document relative to its configuration
        // search path, which must not depend on the working directory
        let dir = tokio::fs::canonicalize(dir).await?;
        let mut command = Command::new(resolve_program(&self.binaries.configtxgen)?);
        command
            .current_dir(&dir)
            .env(CFG_PATH_ENV, &dir)
            .arg("-profile")
            .arg(GENESIS_PROFILE)
            .arg("-outputBlock")
            .arg(format!("./{GENESIS_BLOCK_FILE_NAME}"));
        run(command, &self.binaries.configtxgen).await
    }
}
