use crate::init_config::CmdConfig;
use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use std::path::PathBuf;

mod bundle;
mod cmd;
mod config;
mod init_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modify the publisher config
    Config {
        #[command(subcommand)]
        cmd: CmdConfig,
    },
    /// Share a note bundle, or update its existing share
    Publish {
        /// Directory containing bundle.toml
        bundle: PathBuf,
        /// Re-upload theme assets and attachments even if already stored
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Delete the shared copy of a note bundle
    Delete {
        /// Directory containing bundle.toml
        bundle: PathBuf,
        /// Do not ask for confirmation
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Check that the configured store accepts writes
    Check,
    /// Decrypt a published artifact and print its content
    Decrypt {
        /// The published HTML file
        artifact: PathBuf,
        /// Share link or bare key
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    // Default config location: ~/.config/sharenote/config.toml
    // Default local publish root: ~/.local/share/sharenote/published
    let dirs = ProjectDirs::from("", "", "sharenote")
        .context("failed to determine config directory path")?;
    let config_file = cli
        .config
        .unwrap_or_else(|| dirs.config_dir().join("config.toml"));

    cmd::run_command(config_file, dirs.data_dir(), cli.cmd).await
}
