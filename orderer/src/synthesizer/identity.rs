//! Identity-config document consumed by the identity generator.

use serde::Serialize;

/// An ordering organization and the domain its material is issued under.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrdererOrg {
    pub name: String,
    pub domain: String,
}

/// Root of `crypto-config.yaml`.
#[derive(Clone, Debug, Serialize)]
pub struct CryptoConfig {
    #[serde(rename = "OrdererOrgs")]
    pub orderer_orgs: Vec<OrdererOrg>,
}
