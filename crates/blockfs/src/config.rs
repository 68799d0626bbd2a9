//! Block store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `BLOCKFS_ROOT`: Root directory of the store
//! - `BLOCKFS_BLOCK_SIZE`: Maximum block size in bytes
//! - `BLOCKFS_READONLY`: Set to "true" for read-only mode
//! - `BLOCKFS_VERIFY`: Set to "false" to skip digest checks on read
//!
//! Default root: `~/.blockfs`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::block::DEFAULT_BLOCK_SIZE;

/// Default name of the reserved subdirectory holding block files.
pub const DEFAULT_BLOCKS_DIR: &str = "blocks";

/// Configuration for a block store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory. Blocks live in `{root}/{blocks_dir}/`.
    pub root: PathBuf,

    /// Maximum block size in bytes. Exports cut the stream at this size and
    /// reads refuse files larger than it.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Name of the block subdirectory under the root.
    #[serde(default = "default_blocks_dir")]
    pub blocks_dir: String,

    /// Permission bits for created directories (Unix only).
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,

    /// Permission bits for committed block files (Unix only).
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    /// Recompute the digest of every block read and reject mismatches.
    #[serde(default = "default_true")]
    pub verify_on_read: bool,

    /// Read-only mode - prevents any writes and skips directory creation.
    #[serde(default)]
    pub read_only: bool,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_blocks_dir() -> String {
    DEFAULT_BLOCKS_DIR.to_string()
}

fn default_dir_mode() -> u32 {
    0o755
}

fn default_file_mode() -> u32 {
    0o644
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_root(default_root())
    }
}

/// Get the default store root (~/.blockfs).
fn default_root() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".blockfs"))
        .unwrap_or_else(|| PathBuf::from(".blockfs"))
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(root) = env::var("BLOCKFS_ROOT") {
            config.root = PathBuf::from(root);
        }

        if let Ok(size) = env::var("BLOCKFS_BLOCK_SIZE") {
            config.block_size = size
                .trim()
                .parse()
                .with_context(|| format!("invalid BLOCKFS_BLOCK_SIZE: {size}"))?;
        }

        if let Some(read_only) = env_flag("BLOCKFS_READONLY") {
            config.read_only = read_only;
        }

        if let Some(verify) = env_flag("BLOCKFS_VERIFY") {
            config.verify_on_read = verify;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[blockfs]` section:
    /// ```toml
    /// [blockfs]
    /// root = "/srv/backup/store"
    /// block_size = 2097152
    /// verify_on_read = true
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        if let Some(section) = table.get("blockfs") {
            let config: StoreConfig = section
                .clone()
                .try_into()
                .context("failed to parse [blockfs] section")?;
            config.validate()?;
            Ok(config)
        } else {
            Self::from_env()
        }
    }

    /// Create a config with a specific root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            blocks_dir: default_blocks_dir(),
            dir_mode: default_dir_mode(),
            file_mode: default_file_mode(),
            verify_on_read: true,
            read_only: false,
        }
    }

    /// Create a read-only config with a specific root.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::with_root(root)
        }
    }

    /// Builder-style block size override.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Get the block directory path.
    pub fn blocks_dir_path(&self) -> PathBuf {
        self.root.join(&self.blocks_dir)
    }

    /// Reject settings the store can't operate with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            anyhow::bail!("block_size must be greater than zero");
        }
        if self.blocks_dir.is_empty()
            || self.blocks_dir.contains(['/', '\\'])
            || self.blocks_dir == "."
            || self.blocks_dir == ".."
        {
            anyhow::bail!("blocks_dir must be a single path component: {:?}", self.blocks_dir);
        }
        Ok(())
    }
}
