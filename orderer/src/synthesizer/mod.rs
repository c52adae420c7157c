//! Synthesize the identity-config and topology-config documents.
//!
//! Both documents are built as typed records and serialized with `serde_yaml`.
//! Organization entries are constructed once and cloned into every section
//! that refers to them, so references can never drift from their declaration.
//! Synthesis is pure: identical [BootstrapParameters] always yield
//! byte-identical documents.

use crate::{
    config::{BootstrapParameters, Mode, OrgName},
    Error,
};
use std::collections::BTreeMap;

pub mod identity;
pub mod topology;

use identity::{CryptoConfig, OrdererOrg};
use topology::{
    AnchorPeer, Application, BatchSize, Channel, ChannelProfile, ConfigTx, Consortium,
    GenesisProfile, Kafka, Orderer, Organization, Policies, Policy, Profiles,
};

/// Maximum time to wait before cutting a batch
pub const BATCH_TIMEOUT: &str = "2s";

/// Maximum number of messages in a batch
pub const MAX_MESSAGE_COUNT: u32 = 10;

/// Hard upper bound on the serialized size of a batch
pub const ABSOLUTE_MAX_BYTES: &str = "98 MB";

/// Preferred serialized size of a batch
pub const PREFERRED_MAX_BYTES: &str = "512 KB";

/// Consortium holding the peer organization
pub const CONSORTIUM: &str = "SingleMemberConsortium";

/// Number of brokers (and coordination nodes) in a replicated-log deployment
pub const REPLICAS: usize = 3;

/// Role prefix of broker hosts
pub const BROKER_ROLE: &str = "kafka";

/// Port brokers listen on
pub const BROKER_PORT: u16 = 9093;

/// Role prefix of coordination-service hosts
pub const COORDINATION_ROLE: &str = "zookeeper";

/// Port coordination nodes listen on
pub const COORDINATION_PORT: u16 = 2181;

/// Suffix of in-cluster service names
const CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// Channel-level policies, each satisfied by any member of its sub-policy
const POLICY_NAMES: [&str; 3] = ["Readers", "Writers", "Admins"];

/// Domain the orderer organization's material is issued under.
pub fn orderer_domain(org: &OrgName) -> String {
    format!("orderer.{}.com", org.lower())
}

/// Domain the peer organization's material is issued under.
pub fn peer_domain(peer_org: &OrgName) -> String {
    format!("peer.{}.com", peer_org.lower())
}

/// Hostname of the `index`-th replica of a stateful service owned by `org`.
pub fn service_host(role: &str, org: &OrgName, namespace: &str, index: usize) -> String {
    let org = org.lower();
    format!("{role}-{org}-{index}.{role}-svc-{org}.{namespace}.{CLUSTER_DOMAIN}")
}

/// Addresses of every broker owned by `org`.
pub fn broker_addresses(org: &OrgName, namespace: &str) -> Vec<String> {
    (0..REPLICAS)
        .map(|i| format!("{}:{BROKER_PORT}", service_host(BROKER_ROLE, org, namespace, i)))
        .collect()
}

/// The two documents written before invoking the external generators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Documents {
    /// Contents of `crypto-config.yaml`
    pub identity: String,
    /// Contents of `configtx.yaml`
    pub topology: String,
}

/// Synthesize both documents from `params`.
pub fn synthesize(params: &BootstrapParameters) -> Result<Documents, Error> {
    Ok(Documents {
        identity: serde_yaml::to_string(&crypto_config(params))?,
        topology: serde_yaml::to_string(&config_tx(params))?,
    })
}

/// Build the identity-config record.
pub fn crypto_config(params: &BootstrapParameters) -> CryptoConfig {
    CryptoConfig {
        orderer_orgs: vec![OrdererOrg {
            name: params.org.canonical().to_string(),
            domain: orderer_domain(&params.org),
        }],
    }
}

/// Build the topology-config record.
pub fn config_tx(params: &BootstrapParameters) -> ConfigTx {
    let orderer_name = format!("{}Orderer", params.org.canonical());
    let orderer_org = Organization {
        name: orderer_name.clone(),
        id: orderer_name,
        msp_dir: format!(
            "crypto-config/ordererOrganizations/{}/msp",
            orderer_domain(&params.org)
        ),
        anchor_peers: Vec::new(),
    };
    let peer_org = Organization {
        name: params.peer_org.canonical().to_string(),
        id: params.peer_org.canonical().to_string(),
        msp_dir: format!(
            "crypto-config/peerOrganizations/{}/msp",
            peer_domain(&params.peer_org)
        ),
        anchor_peers: vec![AnchorPeer {
            host: params.peer_anchor_host.clone(),
            port: params.peer_anchor_port,
        }],
    };

    let policies: Policies = POLICY_NAMES
        .into_iter()
        .map(|name| {
            (
                name,
                Policy {
                    kind: "ImplicitMeta",
                    rule: format!("ANY {name}"),
                },
            )
        })
        .collect();

    let kafka = match &params.mode {
        Mode::Kafka { namespace } => Some(Kafka {
            brokers: broker_addresses(&params.org, namespace),
        }),
        Mode::Solo | Mode::Other(_) => None,
    };

    let mut consortiums = BTreeMap::new();
    consortiums.insert(
        CONSORTIUM,
        Consortium {
            organizations: vec![peer_org.clone()],
        },
    );

    ConfigTx {
        organizations: vec![orderer_org.clone(), peer_org.clone()],
        channel: Channel {
            policies: policies.clone(),
        },
        profiles: Profiles {
            genesis: GenesisProfile {
                policies,
                orderer: Orderer {
                    orderer_type: params.mode.as_str().to_string(),
                    addresses: vec![format!("{}:{}", params.worker_node_ip, params.orderer_port)],
                    batch_timeout: BATCH_TIMEOUT,
                    batch_size: BatchSize {
                        max_message_count: MAX_MESSAGE_COUNT,
                        absolute_max_bytes: ABSOLUTE_MAX_BYTES,
                        preferred_max_bytes: PREFERRED_MAX_BYTES,
                    },
                    kafka,
                    organizations: vec![orderer_org],
                },
                consortiums,
            },
            channel: ChannelProfile {
                consortium: CONSORTIUM,
                application: Application {
                    organizations: vec![peer_org],
                },
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Binaries;
    use serde_yaml::Value;
    use std::path::PathBuf;

    fn params(org: &str, mode: Mode) -> BootstrapParameters {
        BootstrapParameters {
            org: OrgName::new(org).unwrap(),
            peer_org: OrgName::new("globex industries").unwrap(),
            peer_admin_cert: Some("admin".into()),
            peer_ca_cert: Some("ca".into()),
            share_dir: PathBuf::from("./crypto"),
            worker_node_ip: "10.0.0.1".into(),
            orderer_port: 7050,
            peer_anchor_host: "10.0.0.2".into(),
            peer_anchor_port: 7051,
            mode,
            instance_id: None,
            binaries: Binaries::default(),
        }
    }

    fn kafka(namespace: &str) -> Mode {
        Mode::Kafka {
            namespace: namespace.into(),
        }
    }

    fn topology(params: &BootstrapParameters) -> Value {
        serde_yaml::from_str(&synthesize(params).unwrap().topology).unwrap()
    }

    #[test]
    fn test_deterministic() {
        let params = params("Acme", kafka("ns1"));
        assert_eq!(synthesize(&params).unwrap(), synthesize(&params).unwrap());
    }

    #[test]
    fn test_identity_document() {
        let docs = synthesize(&params("acme corp", Mode::Solo)).unwrap();
        let doc: Value = serde_yaml::from_str(&docs.identity).unwrap();
        let org = &doc["OrdererOrgs"][0];
        assert_eq!(org["Name"], "AcmeCorp");
        assert_eq!(org["Domain"], "orderer.acmecorp.com");
    }

    #[test]
    fn test_kafka_brokers() {
        let doc = topology(&params("Acme", kafka("ns1")));
        let orderer = &doc["Profiles"]["OneOrgGenesis"]["Orderer"];
        assert_eq!(orderer["OrdererType"], "kafka");
        let brokers = orderer["Kafka"]["Brokers"].as_sequence().unwrap();
        assert_eq!(brokers.len(), 3);
        for (i, broker) in brokers.iter().enumerate() {
            assert_eq!(
                broker.as_str().unwrap(),
                format!("kafka-acme-{i}.kafka-svc-acme.ns1.svc.cluster.local:9093")
            );
        }
    }

    #[test]
    fn test_solo_has_no_brokers() {
        let docs = synthesize(&params("Acme", Mode::Solo)).unwrap();
        assert!(!docs.topology.contains("Kafka"));
        assert!(!docs.topology.contains("svc.cluster.local"));
        let doc: Value = serde_yaml::from_str(&docs.topology).unwrap();
        assert_eq!(doc["Profiles"]["OneOrgGenesis"]["Orderer"]["OrdererType"], "solo");
    }

    #[test]
    fn test_other_mode_verbatim() {
        let doc = topology(&params("Acme", Mode::Other("etcdraft".into())));
        let orderer = &doc["Profiles"]["OneOrgGenesis"]["Orderer"];
        assert_eq!(orderer["OrdererType"], "etcdraft");
        assert!(orderer.get("Kafka").is_none());
    }

    #[test]
    fn test_fixed_batch_defaults() {
        let doc = topology(&params("Acme", Mode::Solo));
        let orderer = &doc["Profiles"]["OneOrgGenesis"]["Orderer"];
        assert_eq!(orderer["BatchTimeout"], "2s");
        assert_eq!(orderer["BatchSize"]["MaxMessageCount"], 10);
        assert_eq!(orderer["BatchSize"]["AbsoluteMaxBytes"], "98 MB");
        assert_eq!(orderer["BatchSize"]["PreferredMaxBytes"], "512 KB");
        assert_eq!(orderer["Addresses"][0], "10.0.0.1:7050");
    }

    #[test]
    fn test_references_match_declarations() {
        let doc = topology(&params("Acme", kafka("ns1")));
        let declared = doc["Organizations"].as_sequence().unwrap();
        assert_eq!(declared.len(), 2);
        let (orderer_org, peer_org) = (&declared[0], &declared[1]);

        let genesis = &doc["Profiles"]["OneOrgGenesis"];
        assert_eq!(&genesis["Orderer"]["Organizations"][0], orderer_org);
        assert_eq!(
            &genesis["Consortiums"][CONSORTIUM]["Organizations"][0],
            peer_org
        );
        let channel = &doc["Profiles"]["OneOrgChannel"];
        assert_eq!(channel["Consortium"], CONSORTIUM);
        assert_eq!(&channel["Application"]["Organizations"][0], peer_org);

        // Channel defaults are merged into the genesis profile
        assert_eq!(genesis["Policies"], doc["Channel"]["Policies"]);
        assert_eq!(genesis["Policies"]["Writers"]["Rule"], "ANY Writers");
        assert_eq!(genesis["Policies"]["Admins"]["Type"], "ImplicitMeta");
    }

    #[test]
    fn test_normalization_consistency() {
        let doc = topology(&params("acme corp", kafka("ns1")));
        let orderer_org = &doc["Organizations"][0];
        assert_eq!(orderer_org["Name"], "AcmeCorpOrderer");
        assert_eq!(orderer_org["ID"], "AcmeCorpOrderer");
        assert_eq!(
            orderer_org["MSPDir"],
            "crypto-config/ordererOrganizations/orderer.acmecorp.com/msp"
        );
        let peer_org = &doc["Organizations"][1];
        assert_eq!(peer_org["Name"], "GlobexIndustries");
        assert_eq!(
            peer_org["MSPDir"],
            "crypto-config/peerOrganizations/peer.globexindustries.com/msp"
        );
        assert_eq!(peer_org["AnchorPeers"][0]["Host"], "10.0.0.2");
        assert_eq!(peer_org["AnchorPeers"][0]["Port"], 7051);
        let broker = doc["Profiles"]["OneOrgGenesis"]["Orderer"]["Kafka"]["Brokers"][0]
            .as_str()
            .unwrap();
        assert_eq!(
            broker,
            "kafka-acmecorp-0.kafka-svc-acmecorp.ns1.svc.cluster.local:9093"
        );

        // No derived token may carry the raw or differently-cased name
        let raw = synthesize(&params("acme corp", kafka("ns1"))).unwrap();
        for text in [&raw.identity, &raw.topology] {
            assert!(!text.contains("acme corp"));
            assert!(!text.contains("Acmecorp"));
            assert!(!text.contains("acmeCorp"));
        }
    }

    #[test]
    fn test_service_host() {
        let org = OrgName::new("Acme").unwrap();
        assert_eq!(
            service_host(COORDINATION_ROLE, &org, "ns1", 2),
            "zookeeper-acme-2.zookeeper-svc-acme.ns1.svc.cluster.local"
        );
    }
}
