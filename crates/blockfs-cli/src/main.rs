//! blockfs - command-line access to a content-addressed block store
//!
//! Subcommands:
//! - `blockfs init` - Create (or verify) a store root
//! - `blockfs export [FILE]` - Chunk a file or stdin, print its hash list
//! - `blockfs restore [LIST]` - Reassemble a stream from a hash list
//! - `blockfs cat <CHECKSUM>` - Write one block to stdout
//! - `blockfs exists <CHECKSUM>...` - Report which checksums are stored
//! - `blockfs missing [LIST]` - Print the checksums of a list not yet stored
//! - `blockfs list` - Print every stored checksum

use std::path::PathBuf;

use anyhow::{Context, Result};
use blockfs::StoreConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "blockfs")]
#[command(about = "Content-addressed block store for deduplicating backups")]
#[command(version)]
struct Cli {
    /// Store root directory (overrides config and BLOCKFS_ROOT)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// TOML config file with a [blockfs] section
    #[arg(short, long, global = true, env = "BLOCKFS_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum block size in bytes (overrides config)
    #[arg(long, global = true)]
    block_size: Option<usize>,

    /// Enable debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store directories if needed
    Init,

    /// Chunk a stream into the store and print its hash list
    Export {
        /// Input file (stdin if omitted or "-")
        input: Option<PathBuf>,

        /// Write the hash list here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the hash list as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Reassemble a stream from a hash list
    Restore {
        /// Hash list file, one checksum per line (stdin if omitted or "-")
        list: Option<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a single block to stdout
    Cat {
        /// Block checksum
        checksum: String,
    },

    /// Report whether each checksum is stored
    Exists {
        /// Block checksums
        #[arg(required = true)]
        checksums: Vec<String>,
    },

    /// Print the checksums from a hash list that the store lacks
    Missing {
        /// Hash list file, one checksum per line (stdin if omitted or "-")
        list: Option<PathBuf>,
    },

    /// Print every stored checksum
    List,
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path)?,
            None => StoreConfig::from_env()?,
        };

        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }

        config.validate().context("invalid store configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries hash lists and block data.
    let default_directive = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let config = cli.store_config()?;

    match cli.command {
        Commands::Init => commands::init(config)?,
        Commands::Export {
            input,
            output,
            json,
        } => commands::export(config, input.as_deref(), output.as_deref(), json)?,
        Commands::Restore { list, output } => {
            commands::restore(config, list.as_deref(), output.as_deref())?
        }
        Commands::Cat { checksum } => commands::cat(config, &checksum)?,
        Commands::Exists { checksums } => commands::exists(config, &checksums)?,
        Commands::Missing { list } => commands::missing(config, list.as_deref())?,
        Commands::List => commands::list(config)?,
    }

    Ok(())
}
