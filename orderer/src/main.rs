//! Orderer bootstrap CLI
//!
//! Parameters are read from the environment (see [BootstrapParameters]).

use clap::{value_parser, Arg, ArgAction, Command};
use privatehive_orderer::{
    bootstrap::Bootstrapper,
    config::BootstrapParameters,
    crate_version, listener,
    readiness::{self, Poller, StoreWritePolicy, TcpProbe, TokioClock},
    store::{MongoStore, StoreConfig},
    tools::Fabric,
};
use std::net::{Ipv4Addr, SocketAddr};
use tracing::{error, info};

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

/// Flag for the liveness listener port
const LISTEN_PORT_FLAG: &str = "listen-port";

/// Flag for retrying failed status writes
const RETRY_STORE_WRITES_FLAG: &str = "retry-store-writes";

/// Entrypoint for the orderer bootstrap
#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Define application
    let matches = Command::new("orderer")
        .version(crate_version())
        .about("Generate identity material and a genesis block, then wait for dependencies.")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(LISTEN_PORT_FLAG)
                .long(LISTEN_PORT_FLAG)
                .default_value("3000")
                .help("Port of the liveness listener")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new(RETRY_STORE_WRITES_FLAG)
                .long(RETRY_STORE_WRITES_FLAG)
                .help("Run another readiness pass when recording readiness fails")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Load configuration
    let params = match BootstrapParameters::from_env() {
        Ok(params) => params,
        Err(e) => {
            error!(error=?e, "invalid bootstrap parameters");
            return std::process::ExitCode::FAILURE;
        }
    };
    let store = match StoreConfig::from_env() {
        Ok(config) => MongoStore::connect(&config).await,
        Err(e) => Err(e),
    };
    let store = match store {
        Ok(store) => store,
        Err(e) => {
            error!(error=?e, "invalid status store configuration");
            return std::process::ExitCode::FAILURE;
        }
    };
    info!(
        org = params.org.canonical(),
        mode = params.mode.as_str(),
        path = ?params.share_dir,
        "loaded configuration"
    );

    // Initialize (at most once per artifact directory)
    let mut bootstrapper = Bootstrapper::new(&params, Fabric::new(params.binaries.clone()));
    if let Err(e) = bootstrapper.run().await {
        error!(error=?e, state=?bootstrapper.state(), "bootstrap failed");
        return std::process::ExitCode::FAILURE;
    }

    // Serve liveness checks
    let port = *matches.get_one::<u16>(LISTEN_PORT_FLAG).unwrap();
    let listener = match listener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error=?e, "failed to bind liveness listener");
            return std::process::ExitCode::FAILURE;
        }
    };
    let server = tokio::spawn(listener::run(listener));

    // Wait for dependencies and record readiness
    let policy = if matches.get_flag(RETRY_STORE_WRITES_FLAG) {
        StoreWritePolicy::RetryPass
    } else {
        StoreWritePolicy::GiveUp
    };
    let poller = Poller::new(
        TcpProbe::default(),
        TokioClock,
        store,
        readiness::dependencies(&params),
        params.status_key(),
        readiness::Config {
            policy,
            ..Default::default()
        },
    );
    match poller.run().await {
        Ok(outcome) => info!(?outcome, "readiness polling complete"),
        Err(e) => error!(error=?e, "failed to record readiness"),
    }

    // Keep serving until terminated
    match server.await {
        Ok(Ok(())) => std::process::ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!(error=?e, "liveness listener failed");
            std::process::ExitCode::FAILURE
        }
        Err(e) => {
            error!(error=?e, "liveness listener panicked");
            std::process::ExitCode::FAILURE
        }
    }
}
