//! relay-deploy is a CLI tool to deploy the relay contracts and keep track of their addresses.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, OutputFormat};
use relay_deploy::{
    ArtifactStore, DeployConfig, NetworkIdentity, RegistryMap, RpcComponentFactory, RunReport,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = DeployConfig::load(cli.config.as_deref())?;
    if let Some(address_file) = cli.address_file {
        config.address_file = address_file;
    }
    if let Some(artifacts_dir) = cli.artifacts_dir {
        config.artifacts_dir = artifacts_dir;
    }

    match cli.command.unwrap_or_default() {
        Command::Deploy => deploy(&config, cli.network).await,
        Command::Addresses { format } => print_addresses(&config, cli.network.as_deref(), format),
    }
}

async fn deploy(config: &DeployConfig, network: Option<String>) -> Result<()> {
    let env = config.environment(network);
    let identity = NetworkIdentity::resolve(&env)?;
    let network_config = env
        .active_config()
        .context("Active network has no configuration")?;

    tracing::info!(
        network = %identity.name,
        chain_id = identity.chain_id,
        address_file = %config.address_file.display(),
        artifacts_dir = %config.artifacts_dir.display(),
        overrides = ?config.overrides,
        "Starting deployment..."
    );

    let factory = RpcComponentFactory::connect(
        &identity,
        network_config,
        ArtifactStore::new(&config.artifacts_dir),
    )
    .await
    .context("Failed to connect to network")?;

    config.orchestrator().run(&env, &factory).await?;

    Ok(())
}

fn print_addresses(config: &DeployConfig, network: Option<&str>, format: OutputFormat) -> Result<()> {
    let registry = config.registry();
    let entries: Vec<_> = registry
        .try_load()?
        .into_iter()
        .filter(|(key, _)| match network {
            Some(network) => key.parts().is_some_and(|(name, _)| name == network),
            None => true,
        })
        .collect();

    if entries.is_empty() {
        tracing::warn!(network = ?network, "No addresses recorded");
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let entries: RegistryMap = entries.into_iter().collect();
            let json = serde_json::to_string_pretty(&entries)
                .context("Failed to serialize addresses")?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            for (key, result) in entries {
                let report = RunReport {
                    key,
                    result,
                    registry_path: registry.path().to_path_buf(),
                };
                println!("{}", report.key);
                println!("{}", report.table());
            }
        }
    }

    Ok(())
}
