//! Network-topology document consumed by the genesis-block generator.

use serde::Serialize;
use std::collections::BTreeMap;

/// Endpoint representing an organization to the rest of the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnchorPeer {
    pub host: String,
    pub port: u16,
}

/// An organization entry, declared once under `Organizations` and copied
/// wherever a profile refers to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Organization {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "MSPDir")]
    pub msp_dir: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anchor_peers: Vec<AnchorPeer>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub rule: String,
}

/// Policies keyed by name (`Admins`, `Readers`, `Writers`).
pub type Policies = BTreeMap<&'static str, Policy>;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Channel {
    pub policies: Policies,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchSize {
    pub max_message_count: u32,
    pub absolute_max_bytes: &'static str,
    pub preferred_max_bytes: &'static str,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Kafka {
    pub brokers: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Orderer {
    pub orderer_type: String,
    pub addresses: Vec<String>,
    pub batch_timeout: &'static str,
    pub batch_size: BatchSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kafka: Option<Kafka>,
    pub organizations: Vec<Organization>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Consortium {
    pub organizations: Vec<Organization>,
}

/// Profile producing the orderer system channel's genesis block.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenesisProfile {
    pub policies: Policies,
    pub orderer: Orderer,
    pub consortiums: BTreeMap<&'static str, Consortium>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    pub organizations: Vec<Organization>,
}

/// Profile for application channels created by the consortium.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelProfile {
    pub consortium: &'static str,
    pub application: Application,
}

#[derive(Clone, Debug, Serialize)]
pub struct Profiles {
    #[serde(rename = "OneOrgGenesis")]
    pub genesis: GenesisProfile,
    #[serde(rename = "OneOrgChannel")]
    pub channel: ChannelProfile,
}

/// Root of `configtx.yaml`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigTx {
    pub organizations: Vec<Organization>,
    pub channel: Channel,
    pub profiles: Profiles,
}
