//! Dependency-ordered deployment plan for the relay contracts.
//!
//! The plan is data: an ordered list of [`ComponentSpec`]s whose constructor
//! arguments may reference the address of an earlier component. Variant chains
//! (wallet, factory, verifiers) are declared once and expanded per variant.

use std::collections::{HashMap, HashSet};

use alloy_core::primitives::Address;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::{ArgValue, ComponentFactory, DeployError, Overrides};

/// Network names on which test-only components are not deployed.
pub const DEFAULT_PRODUCTION_NETWORKS: &[&str] = &["mainnet"];

/// A constructor argument of a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstructorArg {
    /// A fixed value.
    Literal(ArgValue),
    /// The address of a component created earlier in the same run.
    Ref(String),
}

/// One component of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Entry name in the deployment result.
    pub name: String,
    /// Contract type handed to the factory.
    pub contract: String,
    pub args: Vec<ConstructorArg>,
    /// Networks on which this component is skipped.
    pub skip_on: Vec<String>,
}

impl ComponentSpec {
    /// A component whose contract type is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            contract: name.clone(),
            name,
            args: Vec::new(),
            skip_on: Vec::new(),
        }
    }

    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = contract.into();
        self
    }

    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(ConstructorArg::Literal(value.into()));
        self
    }

    /// Pass the address of component `name` as the next constructor argument.
    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.args.push(ConstructorArg::Ref(name.into()));
        self
    }

    pub fn skip_on<I, S>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_on.extend(networks.into_iter().map(Into::into));
        self
    }

    pub fn is_skipped_on(&self, network: &str) -> bool {
        self.skip_on.iter().any(|n| n == network)
    }

    /// Names of the components this one depends on.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Ref(name) => Some(name.as_str()),
            ConstructorArg::Literal(_) => None,
        })
    }

    fn resolve_args(&self, created: &DeploymentResult) -> Result<Vec<ArgValue>, DeployError> {
        self.args
            .iter()
            .map(|arg| match arg {
                ConstructorArg::Literal(value) => Ok(*value),
                ConstructorArg::Ref(name) => created
                    .get(name)
                    .map(ArgValue::Address)
                    .ok_or_else(|| {
                        DeployError::InvalidPlan(format!(
                            "{} references {} which has no address in this run",
                            self.name, name
                        ))
                    }),
            })
            .collect()
    }
}

/// A smart wallet variant: wallet implementation, wallet factory, deploy verifier
/// and relay verifier, each created once per variant.
///
/// Entry names are derived from `prefix`. The default variant (empty prefix)
/// keeps the short verifier names `DeployVerifier` and `RelayVerifier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantChain {
    pub prefix: String,
    pub wallet: String,
    pub factory: String,
    pub deploy_verifier: String,
    pub relay_verifier: String,
}

impl VariantChain {
    /// The plain smart wallet.
    pub fn default_wallet() -> Self {
        Self {
            prefix: String::new(),
            wallet: "SmartWallet".to_string(),
            factory: "SmartWalletFactory".to_string(),
            deploy_verifier: "DeployVerifier".to_string(),
            relay_verifier: "RelayVerifier".to_string(),
        }
    }

    /// The customizable smart wallet, with its own factory and deploy verifier.
    pub fn custom_wallet() -> Self {
        Self {
            prefix: "Custom".to_string(),
            wallet: "CustomSmartWallet".to_string(),
            factory: "CustomSmartWalletFactory".to_string(),
            deploy_verifier: "CustomSmartWalletDeployVerifier".to_string(),
            relay_verifier: "RelayVerifier".to_string(),
        }
    }

    /// The smart wallet able to hold native currency.
    pub fn native_holder_wallet() -> Self {
        Self {
            prefix: "NativeHolder".to_string(),
            wallet: "NativeHolderSmartWallet".to_string(),
            factory: "SmartWalletFactory".to_string(),
            deploy_verifier: "DeployVerifier".to_string(),
            relay_verifier: "RelayVerifier".to_string(),
        }
    }

    pub fn wallet_name(&self) -> String {
        format!("{}SmartWallet", self.prefix)
    }

    pub fn factory_name(&self) -> String {
        format!("{}SmartWalletFactory", self.prefix)
    }

    pub fn deploy_verifier_name(&self) -> String {
        self.verifier_name("DeployVerifier")
    }

    pub fn relay_verifier_name(&self) -> String {
        self.verifier_name("RelayVerifier")
    }

    fn verifier_name(&self, kind: &str) -> String {
        if self.prefix.is_empty() {
            kind.to_string()
        } else {
            format!("{}SmartWallet{}", self.prefix, kind)
        }
    }

    /// The chain's components, in dependency order.
    pub fn specs(&self) -> Vec<ComponentSpec> {
        let factory_name = self.factory_name();
        vec![
            ComponentSpec::new(self.wallet_name()).contract(&self.wallet),
            ComponentSpec::new(&factory_name)
                .contract(&self.factory)
                .reference(self.wallet_name()),
            ComponentSpec::new(self.deploy_verifier_name())
                .contract(&self.deploy_verifier)
                .reference(&factory_name),
            ComponentSpec::new(self.relay_verifier_name())
                .contract(&self.relay_verifier)
                .reference(&factory_name),
        ]
    }
}

/// Addresses produced by one run, in creation order.
///
/// A component skipped on the target network keeps its entry with no address.
/// Addresses are serialized in their EIP-55 checksummed form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DeploymentResult(IndexMap<String, Option<Address>>);

impl DeploymentResult {
    /// Address of a created component. `None` if skipped or unknown.
    pub fn get(&self, name: &str) -> Option<Address> {
        self.0.get(name).copied().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<Address>)> {
        self.0.iter().map(|(name, address)| (name.as_str(), *address))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Components that were actually created.
    pub fn created(&self) -> impl Iterator<Item = (&str, Address)> {
        self.0
            .iter()
            .filter_map(|(name, address)| address.map(|a| (name.as_str(), a)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn record(&mut self, name: &str, address: Option<Address>) {
        self.0.insert(name.to_string(), address);
    }
}

impl Serialize for DeploymentResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, address) in &self.0 {
            map.serialize_entry(name, &address.map(|a| a.to_checksum(None)))?;
        }
        map.end()
    }
}

impl FromIterator<(String, Option<Address>)> for DeploymentResult {
    fn from_iter<T: IntoIterator<Item = (String, Option<Address>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builder for a [`DeploymentPlan`]. Components are created in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlanBuilder {
    specs: Vec<ComponentSpec>,
}

impl DeploymentPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(mut self, spec: ComponentSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Append every component of a variant chain.
    pub fn variant(mut self, chain: &VariantChain) -> Self {
        self.specs.extend(chain.specs());
        self
    }

    /// Validate the dependency graph and build the plan.
    pub fn build(self) -> Result<DeploymentPlan, DeployError> {
        let plan = DeploymentPlan { specs: self.specs };
        plan.validate()?;
        Ok(plan)
    }
}

/// The ordered sequence of component creations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    specs: Vec<ComponentSpec>,
}

impl DeploymentPlan {
    pub fn builder() -> DeploymentPlanBuilder {
        DeploymentPlanBuilder::new()
    }

    /// The relay contracts, in their canonical creation order.
    ///
    /// The penalizer precedes the hub that registers it, each wallet variant
    /// precedes its factory and the factory precedes its verifiers. The version
    /// registry has no dependencies. The utility token is skipped on
    /// `production_networks`.
    pub fn canonical<I, S>(production_networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder()
            .component(ComponentSpec::new("Penalizer"))
            .component(
                ComponentSpec::new("RelayHub")
                    .reference("Penalizer")
                    .arg(1u64)
                    .arg(1u64)
                    .arg(1u64)
                    .arg(1u64),
            )
            .variant(&VariantChain::default_wallet())
            .variant(&VariantChain::custom_wallet())
            .variant(&VariantChain::native_holder_wallet())
            .component(ComponentSpec::new("VersionRegistry"))
            .component(ComponentSpec::new("UtilToken").skip_on(production_networks))
            .build()
            .expect("canonical deployment plan should always be valid")
    }

    pub fn specs(&self) -> &[ComponentSpec] {
        &self.specs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    /// Check that names are unique and that every reference points to an earlier
    /// component that is deployed wherever the referencing component is.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut seen: HashMap<&str, &ComponentSpec> = HashMap::new();

        for spec in &self.specs {
            for dependency in spec.dependencies() {
                let target = seen.get(dependency).ok_or_else(|| {
                    DeployError::InvalidPlan(format!(
                        "{} references {} which is not created before it",
                        spec.name, dependency
                    ))
                })?;

                let skipped: HashSet<&str> = spec.skip_on.iter().map(String::as_str).collect();
                if let Some(network) = target
                    .skip_on
                    .iter()
                    .find(|network| !skipped.contains(network.as_str()))
                {
                    return Err(DeployError::InvalidPlan(format!(
                        "{} references {} which is skipped on {}",
                        spec.name, dependency, network
                    )));
                }
            }

            if seen.insert(spec.name.as_str(), spec).is_some() {
                return Err(DeployError::InvalidPlan(format!(
                    "component {} is declared twice",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    /// Create every component in order against `factory`.
    ///
    /// The first failing creation aborts the run; nothing is returned for the
    /// components created before it.
    pub async fn execute<F: ComponentFactory>(
        &self,
        factory: &F,
        network: &str,
        overrides: &Overrides,
    ) -> Result<DeploymentResult, DeployError> {
        let mut result = DeploymentResult::default();

        for spec in &self.specs {
            if spec.is_skipped_on(network) {
                tracing::info!(component = %spec.name, network, "Skipping component on this network");
                result.record(&spec.name, None);
                continue;
            }

            let args = spec.resolve_args(&result)?;

            tracing::debug!(
                component = %spec.name,
                contract = %spec.contract,
                args = ?args,
                overrides = ?overrides,
                "Creating component..."
            );

            let address = factory
                .create(&spec.contract, &args, overrides)
                .await
                .map_err(|source| DeployError::ComponentCreationFailed {
                    component: spec.name.clone(),
                    source,
                })?;

            tracing::info!(component = %spec.name, %address, "Component created");

            result.record(&spec.name, Some(address));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Factory returning `0x…a0`, `0x…a1`, … in call order.
    #[derive(Default)]
    struct SequentialFactory {
        calls: Mutex<Vec<(String, Vec<ArgValue>)>>,
        fail_on: Option<&'static str>,
    }

    impl ComponentFactory for SequentialFactory {
        async fn create(
            &self,
            contract: &str,
            args: &[ArgValue],
            _overrides: &Overrides,
        ) -> anyhow::Result<Address> {
            let mut calls = self.calls.lock().unwrap();
            if self.fail_on == Some(contract) {
                anyhow::bail!("execution reverted");
            }
            let address = Address::with_last_byte(0xa0 + calls.len() as u8);
            calls.push((contract.to_string(), args.to_vec()));
            Ok(address)
        }
    }

    const CANONICAL_ORDER: &[&str] = &[
        "Penalizer",
        "RelayHub",
        "SmartWallet",
        "SmartWalletFactory",
        "DeployVerifier",
        "RelayVerifier",
        "CustomSmartWallet",
        "CustomSmartWalletFactory",
        "CustomSmartWalletDeployVerifier",
        "CustomSmartWalletRelayVerifier",
        "NativeHolderSmartWallet",
        "NativeHolderSmartWalletFactory",
        "NativeHolderSmartWalletDeployVerifier",
        "NativeHolderSmartWalletRelayVerifier",
        "VersionRegistry",
        "UtilToken",
    ];

    #[test]
    fn test_canonical_order() {
        let plan = DeploymentPlan::canonical(DEFAULT_PRODUCTION_NETWORKS.iter().copied());
        assert_eq!(plan.names().collect::<Vec<_>>(), CANONICAL_ORDER);
    }

    #[test]
    fn test_variant_contract_types() {
        let plan = DeploymentPlan::canonical(["mainnet"]);
        let contract_of = |name: &str| {
            plan.specs()
                .iter()
                .find(|spec| spec.name == name)
                .map(|spec| spec.contract.as_str())
                .unwrap()
        };

        assert_eq!(contract_of("CustomSmartWalletDeployVerifier"), "CustomSmartWalletDeployVerifier");
        assert_eq!(contract_of("CustomSmartWalletRelayVerifier"), "RelayVerifier");
        assert_eq!(contract_of("NativeHolderSmartWalletFactory"), "SmartWalletFactory");
        assert_eq!(contract_of("NativeHolderSmartWalletDeployVerifier"), "DeployVerifier");
    }

    #[tokio::test]
    async fn test_references_resolve_to_earlier_addresses() {
        let factory = SequentialFactory::default();
        let plan = DeploymentPlan::canonical(["mainnet"]);
        let result = plan
            .execute(&factory, "testnet", &Overrides::default())
            .await
            .unwrap();

        let calls = factory.calls.lock().unwrap();
        for (index, spec) in plan.specs().iter().enumerate() {
            let (_, args) = &calls[index];
            for (arg, resolved) in spec.args.iter().zip(args) {
                if let ConstructorArg::Ref(dependency) = arg {
                    let position = plan.names().position(|n| n == dependency).unwrap();
                    assert!(position < index, "{} created before {}", spec.name, dependency);
                    assert_eq!(*resolved, ArgValue::Address(result.get(dependency).unwrap()));
                }
            }
        }

        let (contract, hub_args) = &calls[1];
        assert_eq!(contract, "RelayHub");
        assert_eq!(
            hub_args,
            &vec![
                ArgValue::Address(Address::with_last_byte(0xa0)),
                ArgValue::from(1u64),
                ArgValue::from(1u64),
                ArgValue::from(1u64),
                ArgValue::from(1u64),
            ]
        );
    }

    #[tokio::test]
    async fn test_util_token_skipped_on_production() {
        let plan = DeploymentPlan::canonical(["mainnet"]);

        let factory = SequentialFactory::default();
        let result = plan
            .execute(&factory, "mainnet", &Overrides::default())
            .await
            .unwrap();
        assert!(result.contains("UtilToken"));
        assert_eq!(result.get("UtilToken"), None);
        assert_eq!(result.len(), CANONICAL_ORDER.len());
        assert_eq!(factory.calls.lock().unwrap().len(), CANONICAL_ORDER.len() - 1);

        let factory = SequentialFactory::default();
        let result = plan
            .execute(&factory, "testnet", &Overrides::default())
            .await
            .unwrap();
        assert_eq!(result.get("UtilToken"), Some(Address::with_last_byte(0xaf)));
    }

    #[tokio::test]
    async fn test_failure_aborts_with_component_name() {
        let factory = SequentialFactory {
            fail_on: Some("CustomSmartWalletFactory"),
            ..Default::default()
        };
        let plan = DeploymentPlan::canonical(["mainnet"]);
        let err = plan
            .execute(&factory, "testnet", &Overrides::default())
            .await
            .unwrap_err();

        assert_eq!(err.component(), Some("CustomSmartWalletFactory"));
        // Nothing after the failing component was attempted.
        assert_eq!(factory.calls.lock().unwrap().len(), 7);
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let err = DeploymentPlan::builder()
            .component(ComponentSpec::new("RelayHub").reference("Penalizer"))
            .component(ComponentSpec::new("Penalizer"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidPlan(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_self_reference() {
        let duplicate = DeploymentPlan::builder()
            .variant(&VariantChain::default_wallet())
            .variant(&VariantChain::default_wallet())
            .build();
        assert!(matches!(duplicate, Err(DeployError::InvalidPlan(_))));

        let cyclic = DeploymentPlan::builder()
            .component(ComponentSpec::new("Penalizer").reference("Penalizer"))
            .build();
        assert!(matches!(cyclic, Err(DeployError::InvalidPlan(_))));
    }

    #[test]
    fn test_validate_rejects_reference_to_skippable_component() {
        let plan = DeploymentPlan::builder()
            .component(ComponentSpec::new("UtilToken").skip_on(["mainnet"]))
            .component(ComponentSpec::new("Faucet").reference("UtilToken"))
            .build();
        assert!(matches!(plan, Err(DeployError::InvalidPlan(_))));

        let plan = DeploymentPlan::builder()
            .component(ComponentSpec::new("UtilToken").skip_on(["mainnet"]))
            .component(
                ComponentSpec::new("Faucet")
                    .reference("UtilToken")
                    .skip_on(["mainnet"]),
            )
            .build();
        assert!(plan.is_ok());
    }

    #[test]
    fn test_extra_variant_expands_chain() {
        let chain = VariantChain {
            prefix: "Boltz".to_string(),
            wallet: "BoltzSmartWallet".to_string(),
            factory: "BoltzSmartWalletFactory".to_string(),
            deploy_verifier: "BoltzDeployVerifier".to_string(),
            relay_verifier: "RelayVerifier".to_string(),
        };
        let plan = DeploymentPlan::builder().variant(&chain).build().unwrap();
        assert_eq!(
            plan.names().collect::<Vec<_>>(),
            [
                "BoltzSmartWallet",
                "BoltzSmartWalletFactory",
                "BoltzSmartWalletDeployVerifier",
                "BoltzSmartWalletRelayVerifier"
            ]
        );
        assert_eq!(
            plan.specs()[3].dependencies().collect::<Vec<_>>(),
            ["BoltzSmartWalletFactory"]
        );
    }

    #[test]
    fn test_result_serializes_checksummed_addresses() {
        let address: Address = "0x52908400098527886e0f7030069857d2e4169ee7".parse().unwrap();
        let result: DeploymentResult = [
            ("RelayHub".to_string(), Some(address)),
            ("UtilToken".to_string(), None),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"RelayHub":"0x52908400098527886E0F7030069857D2E4169EE7","UtilToken":null}"#
        );
        assert_eq!(serde_json::from_str::<DeploymentResult>(&json).unwrap(), result);
    }
}
