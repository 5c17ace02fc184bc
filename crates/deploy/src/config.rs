//! Layered configuration of a deployment.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    AddressRegistry, DEFAULT_ADDRESS_FILE, DEFAULT_PRODUCTION_NETWORKS, DeploymentPlan,
    Environment, NetworkConfig, Orchestrator, Overrides,
};

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Relay.toml";

/// Prefix of the environment variables overriding configuration values.
///
/// Nested keys use a double underscore, e.g. `RELAY_OVERRIDES__GAS_LIMIT`.
pub const ENV_PREFIX: &str = "RELAY_";

/// Environment variable selecting the address file, kept for compatibility with
/// existing deployment scripts.
pub const ADDRESS_FILE_ENV: &str = "ADDRESS_FILE";

/// Default directory holding the compiled contract artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Configuration of a deployment.
///
/// Values are layered: defaults, then the TOML file, then `RELAY_*` variables,
/// then `ADDRESS_FILE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Path to the address file.
    pub address_file: PathBuf,
    /// Networks on which test-only components are not deployed.
    pub production_networks: Vec<String>,
    /// Static parameters applied to every creation transaction.
    #[serde(default)]
    pub overrides: Overrides,
    /// Directory searched for `<Contract>.json` artifacts.
    pub artifacts_dir: PathBuf,
    /// Known networks, keyed by name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            address_file: PathBuf::from(DEFAULT_ADDRESS_FILE),
            production_networks: DEFAULT_PRODUCTION_NETWORKS
                .iter()
                .map(|n| n.to_string())
                .collect(),
            overrides: Overrides::default(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            networks: BTreeMap::new(),
        }
    }
}

impl DeployConfig {
    /// The provider stack used by [`DeployConfig::load`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&[ADDRESS_FILE_ENV]))
    }

    /// Load the configuration.
    ///
    /// An explicitly given file must exist. Without one, `Relay.toml` in the
    /// working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let config: Self = Self::figment(&path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        tracing::debug!(path = %path.display(), ?config, "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// The environment of a run against `active_network`.
    pub fn environment(&self, active_network: Option<String>) -> Environment {
        Environment {
            active_network,
            networks: self.networks.clone(),
        }
    }

    pub fn registry(&self) -> AddressRegistry {
        AddressRegistry::new(&self.address_file)
    }

    pub fn plan(&self) -> DeploymentPlan {
        DeploymentPlan::canonical(self.production_networks.iter().cloned())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.plan(), self.registry()).overrides(self.overrides)
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    const RELAY_TOML: &str = r#"
address_file = "deployments/addresses.json"
production_networks = ["mainnet", "rsk-mainnet"]

[overrides]
gas_price = 65164000
gas_limit = 6800000

[networks.testnet]
chain_id = 31
url = "https://public-node.testnet.rsk.co"

[networks.regtest]
chain_id = 33
url = "http://localhost:4444"
from = "0xcd2a3d9f938e13cd947ec05abc7fe734df8dd826"
"#;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new("relay-deploy-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, RELAY_TOML).unwrap();

        let config = DeployConfig::load(Some(temp_dir.path())).expect("Failed to load config");

        assert_eq!(config.production_networks, ["mainnet", "rsk-mainnet"]);
        assert_eq!(config.overrides.gas_limit, Some(6_800_000));
        assert_eq!(config.artifacts_dir, PathBuf::from(DEFAULT_ARTIFACTS_DIR));
        assert_eq!(config.networks["testnet"].chain_id, Some(31));
        assert!(config.networks["regtest"].from.is_some());

        let env = config.environment(Some("regtest".to_string()));
        let identity = crate::NetworkIdentity::resolve(&env).unwrap();
        assert_eq!(identity.key().to_string(), "regtest.33");
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let temp_dir = TempDir::new("relay-deploy-test").expect("Failed to create temp dir");
        assert!(DeployConfig::load(Some(&temp_dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new("relay-deploy-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);

        let mut config = DeployConfig::default();
        config
            .networks
            .insert("testnet".to_string(), NetworkConfig::with_chain_id(31));
        config.save_to_file(&path).unwrap();

        let loaded = DeployConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.networks, config.networks);
        assert_eq!(loaded.production_networks, config.production_networks);
    }

    #[test]
    fn test_plan_uses_production_networks() {
        let config = DeployConfig {
            production_networks: vec!["rsk-mainnet".to_string()],
            ..Default::default()
        };
        let plan = config.plan();
        let util_token = plan.specs().last().unwrap();
        assert_eq!(util_token.name, "UtilToken");
        assert!(util_token.is_skipped_on("rsk-mainnet"));
        assert!(!util_token.is_skipped_on("mainnet"));
    }
}
