//! Post-start lifecycle hook.
//!
//! Moves this instance's status record along its lifecycle (see
//! [find_and_transition]). Always exits successfully so that a store outage
//! never blocks the container from starting.

use privatehive_orderer::store::{find_and_transition, MongoStore, StoreConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let Some(instance_id) = std::env::var("INSTANCE_ID").ok().filter(|id| !id.is_empty()) else {
        warn!("INSTANCE_ID not set");
        return std::process::ExitCode::SUCCESS;
    };
    let store = match StoreConfig::from_env() {
        Ok(config) => MongoStore::connect(&config).await,
        Err(e) => Err(e),
    };
    let store = match store {
        Ok(store) => store,
        Err(e) => {
            warn!(error=?e, "status store unavailable");
            return std::process::ExitCode::SUCCESS;
        }
    };
    match find_and_transition(&store, &instance_id).await {
        Ok(transition) => {
            info!(instance_id = instance_id.as_str(), ?transition, "post-start complete")
        }
        Err(e) => {
            warn!(error=?e, instance_id = instance_id.as_str(), "failed to transition status")
        }
    }
    std::process::ExitCode::SUCCESS
}
