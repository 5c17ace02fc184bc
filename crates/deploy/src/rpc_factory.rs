//! [`ComponentFactory`] backed by an Ethereum JSON-RPC node.
//!
//! Creation transactions are sent with `eth_sendTransaction` from an account
//! unlocked on the node, and the contract address is read from the receipt.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{ArgValue, ComponentFactory, NetworkConfig, NetworkIdentity, Overrides, rpc};

/// Interval between two receipt queries.
const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum number of receipt queries before giving up on a transaction.
const DEFAULT_RECEIPT_MAX_POLLS: usize = 150;

/// A compiled contract artifact (Hardhat layout).
#[derive(Debug, Deserialize)]
struct Artifact {
    bytecode: Bytes,
}

/// Lookup of compiled contract artifacts by contract name.
///
/// `<Contract>.json` files are searched recursively under the root directory, so
/// both `artifacts/contracts/Foo.sol/Foo.json` and a flat directory work.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the artifact of `contract`.
    pub fn find(&self, contract: &str) -> Result<PathBuf> {
        let file_name = format!("{}.json", contract);
        find_file(&self.root, &file_name)?.with_context(|| {
            format!(
                "No artifact {} found under {}",
                file_name,
                self.root.display()
            )
        })
    }

    /// Creation bytecode of `contract`.
    pub fn bytecode(&self, contract: &str) -> Result<Bytes> {
        let path = self.find(contract)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse artifact {} (unlinked libraries are not supported)",
                path.display()
            )
        })?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!("Artifact {} has no bytecode (abstract contract or interface?)", path.display());
        }

        Ok(artifact.bytecode)
    }
}

fn find_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|name| name == file_name) {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_file(&subdir, file_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

/// Concatenate creation bytecode and ABI-encoded constructor arguments.
fn deploy_data(bytecode: &Bytes, args: &[ArgValue]) -> String {
    let encoded_args: String = args.iter().map(|arg| hex::encode(arg.abi_word())).collect();
    format!("0x{}{}", hex::encode(bytecode), encoded_args)
}

/// Build the `eth_sendTransaction` object of a creation.
fn creation_transaction(from: Address, data: String, overrides: &Overrides) -> Value {
    let mut tx = serde_json::json!({
        "from": from,
        "data": data,
    });

    if let Some(gas_limit) = overrides.gas_limit {
        tx["gas"] = Value::String(format!("0x{:x}", gas_limit));
    }
    if let Some(gas_price) = overrides.gas_price {
        tx["gasPrice"] = Value::String(format!("0x{:x}", gas_price));
    }

    tx
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    contract_address: Option<Address>,
    status: Option<String>,
}

/// Creates components by sending creation transactions to a JSON-RPC node.
#[derive(Debug, Clone)]
pub struct RpcComponentFactory {
    client: reqwest::Client,
    url: Url,
    from: Address,
    artifacts: ArtifactStore,
    receipt_poll_interval: Duration,
    receipt_max_polls: usize,
}

impl RpcComponentFactory {
    /// Connect to the node of `config`.
    ///
    /// Checks that the node serves the resolved chain id, and picks the first
    /// account of the node when no sender is configured.
    pub async fn connect(
        identity: &NetworkIdentity,
        config: &NetworkConfig,
        artifacts: ArtifactStore,
    ) -> Result<Self> {
        let url = config
            .url
            .clone()
            .with_context(|| format!("No RPC url configured for network {}", identity.name))?;
        let client = rpc::create_client()?;

        let chain_id: String = rpc::json_rpc_call(&client, url.as_str(), "eth_chainId", vec![])
            .await
            .context("Failed to query chain id")?;
        let chain_id = u64::from_str_radix(chain_id.trim_start_matches("0x"), 16)
            .with_context(|| format!("Invalid chain id returned by node: {}", chain_id))?;
        if chain_id != identity.chain_id {
            anyhow::bail!(
                "Node at {} serves chain id {} but network {} is configured with {}",
                url,
                chain_id,
                identity.name,
                identity.chain_id
            );
        }

        let from = match config.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to query node accounts")?;
                accounts
                    .first()
                    .copied()
                    .context("Node has no unlocked account to deploy from")?
            }
        };

        tracing::info!(%url, %from, chain_id, "Connected to network");

        Ok(Self {
            client,
            url,
            from,
            artifacts,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_max_polls: DEFAULT_RECEIPT_MAX_POLLS,
        })
    }

    /// Change how receipts are polled.
    pub fn receipt_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_max_polls = max_polls;
        self
    }

    pub fn from_address(&self) -> Address {
        self.from
    }

    /// Poll the receipt of `tx_hash` until it is mined.
    ///
    /// Only the read is repeated; the transaction itself is sent once.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        let client = &self.client;
        let url = self.url.as_str();
        let fetch = move || async move {
            let receipt: Option<TransactionReceipt> = rpc::json_rpc_call(
                client,
                url,
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx_hash)],
            )
            .await?;
            receipt.with_context(|| format!("Transaction {} is still pending", tx_hash))
        };

        fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.receipt_poll_interval)
                    .with_max_times(self.receipt_max_polls),
            )
            .notify(|err, _| {
                tracing::trace!(error = %err, tx_hash, "Receipt not available, retrying...");
            })
            .await
            .with_context(|| format!("Timeout waiting for receipt of transaction {}", tx_hash))
    }
}

impl ComponentFactory for RpcComponentFactory {
    async fn create(&self, contract: &str, args: &[ArgValue], overrides: &Overrides) -> Result<Address> {
        let bytecode = self.artifacts.bytecode(contract)?;
        let tx = creation_transaction(self.from, deploy_data(&bytecode, args), overrides);

        let tx_hash: String =
            rpc::json_rpc_call(&self.client, self.url.as_str(), "eth_sendTransaction", vec![tx])
                .await
                .with_context(|| format!("Failed to send creation transaction of {}", contract))?;

        tracing::debug!(contract, tx_hash = %tx_hash, "Creation transaction sent");

        let receipt = self.wait_for_receipt(&tx_hash).await?;

        if receipt.status.as_deref() == Some("0x0") {
            anyhow::bail!("Creation of {} reverted in transaction {}", contract, tx_hash);
        }

        receipt
            .contract_address
            .with_context(|| format!("Receipt of transaction {} has no contract address", tx_hash))
    }
}
