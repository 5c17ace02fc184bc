//! relay-deploy - Deployment library for the relay contracts.
//!
//! This crate creates the relay hub, its penalizer, the smart wallet variants and
//! their verifiers in dependency order, then records the resulting addresses in
//! an address file keyed by `<network>.<chainId>`.

mod config;
pub use config::{ADDRESS_FILE_ENV, CONFIG_FILENAME, DEFAULT_ARTIFACTS_DIR, DeployConfig, ENV_PREFIX};

mod error;
pub use error::DeployError;

mod factory;
pub use factory::{ArgValue, ComponentFactory, Overrides};

mod network;
pub use network::{Environment, NetworkConfig, NetworkIdentity, NetworkKey};

mod orchestrator;
pub use orchestrator::{Orchestrator, RunReport};

mod plan;
pub use plan::{
    ComponentSpec, ConstructorArg, DEFAULT_PRODUCTION_NETWORKS, DeploymentPlan,
    DeploymentPlanBuilder, DeploymentResult, VariantChain,
};

mod registry;
pub use registry::{AddressRegistry, DEFAULT_ADDRESS_FILE, RegistryMap};

pub mod rpc;

mod rpc_factory;
pub use rpc_factory::{ArtifactStore, RpcComponentFactory};
