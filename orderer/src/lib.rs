//! Bootstrap a single orderer node.
//!
//! On first start, the node synthesizes an identity-config document and a
//! network-topology document from its [config::BootstrapParameters], runs the
//! external identity and genesis-block generators against them, and records
//! completion with a marker file so that none of it ever runs again. It then
//! waits until every dependency of its ordering backend accepts connections
//! and records itself as `running` in the shared status store.
//!
//! # Layout
//!
//! - [synthesizer]: pure construction of both documents
//! - [artifacts]: persisted layout of the artifact directory
//! - [tools]: invocation of the external generators
//! - [bootstrap]: the once-per-node initialization state machine
//! - [readiness]: dependency polling and the final status transition
//! - [store]: the shared status store and the post-start lifecycle transition
//!
//! # Concurrency
//!
//! Bootstrap completes before polling begins. The initialization marker is a
//! check-then-act guard without locking: running two processes against the
//! same artifact directory is unsupported.

pub mod artifacts;
pub mod bootstrap;
pub mod config;
mod error;
pub mod listener;
pub mod mocks;
pub mod readiness;
pub mod store;
pub mod synthesizer;
pub mod tools;

pub use error::Error;

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
