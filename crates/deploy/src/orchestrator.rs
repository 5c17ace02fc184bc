//! End-to-end deployment run.

use std::path::PathBuf;

use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    AddressRegistry, ComponentFactory, DeployError, DeploymentPlan, DeploymentResult, Environment,
    NetworkIdentity, NetworkKey, Overrides,
};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Registry key the result was recorded under.
    pub key: NetworkKey,
    pub result: DeploymentResult,
    /// Location of the address file.
    pub registry_path: PathBuf,
}

impl RunReport {
    /// One row per component; skipped components show `-`.
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Component", "Address"]);

        for (name, address) in self.result.iter() {
            let address = address.map_or_else(|| "-".to_string(), |a| a.to_string());
            table.add_row(vec![name.to_string(), address]);
        }

        table
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.table())?;
        write!(
            f,
            "Address file available at: \"{}\"",
            self.registry_path.display()
        )
    }
}

/// Drives a deployment: resolve the network, create the components, record the
/// addresses.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    plan: DeploymentPlan,
    registry: AddressRegistry,
    overrides: Overrides,
}

impl Orchestrator {
    pub fn new(plan: DeploymentPlan, registry: AddressRegistry) -> Self {
        Self {
            plan,
            registry,
            overrides: Overrides::default(),
        }
    }

    /// Static parameters applied to every creation of the run.
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    /// Run the deployment against the active network of `env`.
    ///
    /// Identity and creation errors abort before the address file is touched.
    /// The report is printed to stdout and returned.
    pub async fn run<F: ComponentFactory>(
        &self,
        env: &Environment,
        factory: &F,
    ) -> Result<RunReport, DeployError> {
        let identity = NetworkIdentity::resolve(env)?;
        let key = identity.key();

        tracing::info!(
            network = %identity.name,
            chain_id = identity.chain_id,
            components = self.plan.specs().len(),
            "Deploying contracts..."
        );

        let result = self
            .plan
            .execute(factory, &identity.name, &self.overrides)
            .await?;

        tracing::info!(%key, "Generating network config...");

        let existing = self.registry.load();
        let merged = AddressRegistry::merge(&existing, key.clone(), result.clone());

        if let Err(err) = self.registry.persist(&merged) {
            // The contracts exist on-chain: rerunning would create new ones.
            tracing::error!(
                error = %err,
                %key,
                addresses = %serde_json::to_string(&result).unwrap_or_default(),
                "Contracts were created but their addresses were not recorded, update the address file manually"
            );
            return Err(err);
        }

        let report = RunReport {
            key,
            result,
            registry_path: self.registry.path().to_path_buf(),
        };

        println!("{}", report);

        Ok(report)
    }
}
