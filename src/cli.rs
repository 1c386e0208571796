use clap::{Parser, Subcommand};
use std::path::PathBuf;

use statepruner::config::Config;

#[derive(Parser, Debug)]
#[command(name = "statepruner")]
#[command(about = "Prune application store versions and block history of a node", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $PRUNER_CONFIG or config/pruner.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report version statistics and anomalies for every store
    CheckStoreVersions(CheckArgs),
    /// Prune the versions of a single store
    PruneStore(PruneStoreArgs),
    /// Prune application stores and block/state history
    Prune(PruneArgs),
}

/// Options shared by every command
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Node home directory
    pub home: PathBuf,

    /// Application variant selecting extra stores to mount
    #[arg(long)]
    pub app: Option<String>,

    /// Data directory, absolute or relative to the home directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(app) = &self.app {
            config.stores.app = Some(app.clone());
        }
        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(clap::Args, Debug)]
pub struct PruneStoreArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Name of the store to prune
    pub name: String,

    /// Number of recent versions to keep
    #[arg(long)]
    pub versions: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct PruneArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Number of recent application store versions to keep
    #[arg(long)]
    pub versions: Option<u64>,

    /// Number of recent blocks to keep
    #[arg(long)]
    pub blocks: Option<u64>,

    /// Do not prune application stores
    #[arg(long)]
    pub skip_application: bool,

    /// Do not prune the block and state stores
    #[arg(long)]
    pub skip_history: bool,

    /// Run the two tracks one after the other
    #[arg(long)]
    pub sequential: bool,

    /// Heights removed per state store write batch (0 = single batch)
    #[arg(long)]
    pub state_batch_size: Option<u64>,
}

impl Commands {
    pub fn home(&self) -> &PathBuf {
        match self {
            Commands::CheckStoreVersions(args) => &args.store.home,
            Commands::PruneStore(args) => &args.store.home,
            Commands::Prune(args) => &args.store.home,
        }
    }

    /// Apply command-line flags on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        match self {
            Commands::CheckStoreVersions(args) => args.store.apply(config),
            Commands::PruneStore(args) => {
                args.store.apply(config);
                if let Some(versions) = args.versions {
                    config.pruning.versions = versions;
                }
            }
            Commands::Prune(args) => {
                args.store.apply(config);
                if let Some(versions) = args.versions {
                    config.pruning.versions = versions;
                }
                if let Some(blocks) = args.blocks {
                    config.pruning.blocks = blocks;
                }
                if let Some(size) = args.state_batch_size {
                    config.pruning.state_batch_size = size;
                }
                if args.skip_application {
                    config.tracks.application = false;
                }
                if args.skip_history {
                    config.tracks.history = false;
                }
                if args.sequential {
                    config.pruning.parallel = false;
                }
            }
        }
    }
}
