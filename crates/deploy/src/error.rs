//! Error taxonomy for a deployment run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the deployment core.
///
/// Identity and plan errors happen before any contract is created. A
/// [`DeployError::RegistryPersistFailed`] happens after every contract of the run
/// was created on-chain, so the address file no longer matches the chain.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Unknown network: no active network name is set")]
    UnknownNetwork,

    #[error("No network configuration found for {network}")]
    MissingNetworkConfig { network: String },

    #[error("Unknown chain id for network {network}")]
    MissingChainId { network: String },

    #[error("Invalid deployment plan: {0}")]
    InvalidPlan(String),

    #[error("Failed to create component {component}: {source:#}")]
    ComponentCreationFailed {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load address registry from {}: {source:#}", .path.display())]
    RegistryLoadFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to persist address registry to {}: {source:#}", .path.display())]
    RegistryPersistFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    /// The component whose creation failed, if this is a creation error.
    pub fn component(&self) -> Option<&str> {
        match self {
            DeployError::ComponentCreationFailed { component, .. } => Some(component),
            _ => None,
        }
    }
}
