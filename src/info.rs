use serde::{Deserialize, Serialize};

use crate::lightning::{NodeInfo, NodeInformation};

/// Port assumed when an announced address omits it.
pub const DEFAULT_LIGHTNING_PORT: u16 = 9735;

/// Body of `GET info`, which Charge proxies from lightningd's `getinfo`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInfoResponse {
    pub id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub blockheight: u32,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub address: Vec<GetInfoAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInfoAddress {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

impl GetInfoResponse {
    /// One [`NodeInfo`] per announced address.
    #[must_use]
    pub fn to_node_information(&self) -> NodeInformation {
        NodeInformation {
            node_info_list: self
                .address
                .iter()
                .map(|addr| NodeInfo {
                    node_id: self.id.clone(),
                    host: addr.address.clone(),
                    port: if addr.port == 0 {
                        DEFAULT_LIGHTNING_PORT
                    } else {
                        addr.port
                    },
                })
                .collect(),
            block_height: self.blockheight,
            version: self.version.clone(),
            alias: self.alias.clone(),
            network: self.network.clone(),
        }
    }
}
