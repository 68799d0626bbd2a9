//! FileStore: filesystem-backed block storage.
//!
//! Implements the [`BlockStore`] trait with one file per distinct checksum.
//!
//! Layout:
//! ```text
//! {root}/
//! └── blocks/
//!     ├── 3f1a9c...e07b   # raw block bytes, named by full checksum
//!     ├── 91d0c2...4a18
//!     └── .tmp-XXXXXX     # in-flight write, never visible under a checksum name
//! ```
//!
//! Writes go to a temp file inside the block directory and are renamed onto
//! the checksum name only once fully written and synced, so a block file is
//! either absent or complete.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::block::Block;
use crate::checksum::{Checksum, HashList};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Prefix for uncommitted block files.
pub const TEMP_PREFIX: &str = ".tmp-";

/// Trait for block storage backends.
///
/// [`FileStore`] is the durable implementation; [`crate::MemoryStore`] keeps
/// blocks in memory for tests and embedding.
pub trait BlockStore: Send + Sync {
    /// Persist a block under its checksum.
    ///
    /// Writing a checksum that is already stored leaves the stored copy alone.
    fn write(&self, block: &Block) -> Result<()>;

    /// Read the block stored under `checksum`.
    ///
    /// Returns [`Error::NotFound`] if nothing was ever stored under it.
    fn read(&self, checksum: &Checksum) -> Result<Block>;

    /// Check whether a block is stored. Absence is `false`, never an error.
    fn exists(&self, checksum: &Checksum) -> bool;

    /// Largest block this store accepts, if it has a limit.
    ///
    /// A [`crate::Chunker`] never cuts windows larger than this.
    fn max_block_size(&self) -> Option<usize> {
        None
    }

    /// The subsequence of `candidates` not yet stored, in input order.
    ///
    /// A peer advertising the hash list of a stream it wants to send gets back
    /// exactly the blocks it still has to transfer.
    fn missing_blocks(&self, candidates: &HashList) -> HashList {
        candidates
            .iter()
            .filter(|checksum| !self.exists(checksum))
            .cloned()
            .collect()
    }
}

/// Filesystem-based block store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
    blocks_dir: PathBuf,
}

impl FileStore {
    /// Open a store with the given configuration.
    ///
    /// Creates the root and block directories if they don't exist (unless in
    /// read-only mode). Opening an existing store is fine.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let blocks_dir = config.blocks_dir_path();

        if config.read_only {
            if !blocks_dir.is_dir() {
                return Err(Error::Init {
                    path: blocks_dir,
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        "block directory does not exist",
                    ),
                });
            }
        } else {
            create_dir(&config.root, config.dir_mode)?;
            create_dir(&blocks_dir, config.dir_mode)?;
        }

        info!(
            root = %config.root.display(),
            block_size = config.block_size,
            read_only = config.read_only,
            "opened block store"
        );

        Ok(Self { config, blocks_dir })
    }

    /// Open a store at a specific root with default settings.
    pub fn at_path(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::with_root(root))
    }

    /// Open an existing store read-only.
    pub fn read_only_at(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::read_only(root))
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Maximum block size this store reads and chunks with.
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Directory holding the block files.
    pub fn blocks_dir(&self) -> &Path {
        &self.blocks_dir
    }

    /// Get the path where a block would be stored.
    pub fn block_path(&self, checksum: &Checksum) -> PathBuf {
        self.blocks_dir.join(checksum.as_str())
    }

    /// Get the filesystem path of a stored block, if present.
    pub fn path(&self, checksum: &Checksum) -> Option<PathBuf> {
        let path = self.block_path(checksum);
        if is_file(&path) {
            Some(path)
        } else {
            None
        }
    }

    /// List every stored checksum, sorted.
    ///
    /// In-flight temp files and anything else not named like a checksum are
    /// skipped.
    pub fn list(&self) -> Result<Vec<Checksum>> {
        let entries =
            fs::read_dir(&self.blocks_dir).map_err(|e| Error::io(&self.blocks_dir, e))?;

        let mut checksums = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.blocks_dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(checksum) = name.parse::<Checksum>() {
                if checksum.as_str() == name {
                    checksums.push(checksum);
                }
            }
        }
        checksums.sort();
        Ok(checksums)
    }

    fn commit(&self, block: &Block, path: &Path) -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.blocks_dir)
            .map_err(|e| Error::io(&self.blocks_dir, e))?;

        tmp.write_all(block.data())
            .and_then(|()| tmp.flush())
            .and_then(|()| set_mode(tmp.as_file(), self.config.file_mode))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;

        // Dropping `tmp` on an earlier error removes the temp file.
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
        Ok(())
    }

    /// Classify a block file that holds more than `block_size` bytes.
    ///
    /// The rest of the file is hashed in a streaming pass, never buffered.
    /// Content that digests to its name is intact, just stored under a
    /// larger limit; anything else is corrupt.
    fn oversize(&self, checksum: &Checksum, path: &Path, head: &[u8], mut rest: File) -> Error {
        let mut hasher = blake3::Hasher::new();
        hasher.update(head);
        let tail = match io::copy(&mut rest, &mut hasher) {
            Ok(n) => n,
            Err(e) => return Error::io(path, e),
        };
        let size = head.len() as u64 + tail;
        let actual = Checksum::from_hash(&hasher.finalize());

        if self.config.verify_on_read && &actual != checksum {
            warn!(
                checksum = checksum.short(),
                actual = actual.short(),
                size,
                "oversize block content does not match its name"
            );
            return Error::Corrupted {
                checksum: checksum.clone(),
                reason: format!("content digests to {actual}"),
            };
        }

        warn!(
            checksum = checksum.short(),
            size,
            limit = self.config.block_size,
            "block file exceeds block size"
        );
        Error::TooLarge {
            checksum: checksum.clone(),
            size,
            limit: self.config.block_size,
        }
    }
}

impl BlockStore for FileStore {
    fn write(&self, block: &Block) -> Result<()> {
        if self.config.read_only {
            return Err(Error::ReadOnly);
        }

        if block.len() > self.config.block_size {
            warn!(
                checksum = block.checksum().short(),
                size = block.len(),
                limit = self.config.block_size,
                "refusing oversize block"
            );
            return Err(Error::TooLarge {
                checksum: block.checksum().clone(),
                size: block.len() as u64,
                limit: self.config.block_size,
            });
        }

        let path = self.block_path(block.checksum());

        // Content-addressed: an existing file already holds these bytes.
        if is_file(&path) {
            debug!(checksum = block.checksum().short(), "block already stored");
            return Ok(());
        }

        self.commit(block, &path)?;
        debug!(
            checksum = block.checksum().short(),
            size = block.len(),
            "wrote block"
        );
        Ok(())
    }

    fn read(&self, checksum: &Checksum) -> Result<Block> {
        let path = self.block_path(checksum);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(checksum.clone()));
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        // One byte past the limit tells an oversize file from a full block.
        let limit = self.config.block_size as u64 + 1;
        let mut data = Vec::new();
        (&mut file)
            .take(limit)
            .read_to_end(&mut data)
            .map_err(|e| Error::io(&path, e))?;

        if data.len() > self.config.block_size {
            return Err(self.oversize(checksum, &path, &data, file));
        }

        let block = Block::new(data);
        if self.config.verify_on_read && block.checksum() != checksum {
            warn!(
                checksum = checksum.short(),
                actual = block.checksum().short(),
                "block content does not match its name"
            );
            return Err(Error::Corrupted {
                checksum: checksum.clone(),
                reason: format!("content digests to {}", block.checksum()),
            });
        }

        debug!(checksum = checksum.short(), size = block.len(), "read block");
        Ok(block)
    }

    fn exists(&self, checksum: &Checksum) -> bool {
        is_file(&self.block_path(checksum))
    }

    fn max_block_size(&self) -> Option<usize> {
        Some(self.config.block_size)
    }
}

fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn create_dir(path: &Path, mode: u32) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder.create(path).map_err(|source| Error::Init {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}
