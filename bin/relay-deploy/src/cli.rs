use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Output format of the `addresses` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Default, Subcommand)]
pub enum Command {
    /// Deploy every contract to the selected network and record the addresses.
    #[default]
    Deploy,
    /// Print the addresses recorded in the address file.
    ///
    /// Only the entries of the selected network are shown when one is given.
    Addresses {
        /// Output format.
        #[arg(long, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Parser)]
#[command(name = "relay-deploy")]
#[command(
    author,
    version,
    about = "Deploy the relay contracts and record their addresses"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "RELAY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to deploy to. Must be declared in the `networks` table of the
    /// configuration file.
    #[arg(short, long, env = "RELAY_NETWORK")]
    pub network: Option<String>,

    /// Path to the configuration file (or a directory containing `Relay.toml`).
    ///
    /// If not provided, `Relay.toml` in the current directory is used when present.
    #[arg(long, alias = "conf", env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the address file. Overrides the configuration file.
    #[arg(long, env = "ADDRESS_FILE")]
    pub address_file: Option<PathBuf>,

    /// Directory containing the compiled contract artifacts.
    #[arg(long, alias = "artifacts", env = "RELAY_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}
