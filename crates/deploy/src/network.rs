//! Network identity resolution.

use std::{collections::BTreeMap, str::FromStr};

use alloy_core::primitives::Address;
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::DeployError;

/// Per-network configuration, as found in the `networks` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The chain id of the network. Zero is treated as unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// JSON-RPC endpoint of the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    /// Unlocked account used to send the creation transactions.
    /// Defaults to the first account returned by `eth_accounts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
}

impl NetworkConfig {
    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id: Some(chain_id),
            ..Default::default()
        }
    }
}

/// The environment a run executes against: the active network and the table of
/// known networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub active_network: Option<String>,
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Environment {
    pub fn new(active_network: impl Into<String>) -> Self {
        Self {
            active_network: Some(active_network.into()),
            networks: BTreeMap::new(),
        }
    }

    /// Add (or replace) a network configuration.
    pub fn network(mut self, name: impl Into<String>, config: NetworkConfig) -> Self {
        self.networks.insert(name.into(), config);
        self
    }

    /// Configuration of the active network, if both are present.
    pub fn active_config(&self) -> Option<&NetworkConfig> {
        self.active_network
            .as_ref()
            .and_then(|name| self.networks.get(name))
    }
}

/// The resolved identity of the network a run deploys to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkIdentity {
    pub name: String,
    pub chain_id: u64,
}

impl NetworkIdentity {
    /// Resolve the active network name and its chain id.
    ///
    /// Fails closed: a missing name, a missing config entry, and a missing or
    /// zero chain id are all errors.
    pub fn resolve(env: &Environment) -> Result<Self, DeployError> {
        let name = env
            .active_network
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(DeployError::UnknownNetwork)?;

        let config = env
            .networks
            .get(name)
            .ok_or_else(|| DeployError::MissingNetworkConfig {
                network: name.to_string(),
            })?;

        let chain_id = config
            .chain_id
            .filter(|id| *id != 0)
            .ok_or_else(|| DeployError::MissingChainId {
                network: name.to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            chain_id,
        })
    }

    /// The registry key of this network.
    pub fn key(&self) -> NetworkKey {
        NetworkKey(format!("{}.{}", self.name, self.chain_id))
    }
}

/// Registry key of a network: `<networkName>.<chainId>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkKey(String);

impl NetworkKey {
    /// Build a key, checking the name is non-empty and the chain id positive.
    pub fn new(name: &str, chain_id: u64) -> Result<Self, DeployError> {
        NetworkIdentity::resolve(
            &Environment::new(name).network(name, NetworkConfig::with_chain_id(chain_id)),
        )
        .map(|identity| identity.key())
    }

    /// Split the key back into its network name and chain id.
    ///
    /// Network names may themselves contain dots, so the chain id is whatever
    /// follows the last one.
    pub fn parts(&self) -> Option<(&str, u64)> {
        let (name, chain_id) = self.0.rsplit_once('.')?;
        let chain_id = chain_id.parse().ok()?;
        Some((name, chain_id))
    }
}

impl FromStr for NetworkKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, chain_id) = s
            .rsplit_once('.')
            .ok_or_else(|| anyhow::anyhow!("Invalid network key '{}': expected <name>.<chainId>", s))?;
        let chain_id: u64 = chain_id
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid chain id in network key '{}': {}", s, e))?;
        Ok(Self::new(name, chain_id)?)
    }
}
