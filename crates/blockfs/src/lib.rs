//! Content-addressed block storage for deduplicating backup and sync.
//!
//! A stream is cut into fixed-size blocks (2 MiB by default). Each block is
//! named by the BLAKE3 digest of its bytes and stored once, no matter how
//! many streams reference it. The ordered list of digests ([`HashList`]) is
//! all a caller needs to put the stream back together.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use blockfs::{BlockStore, FileStore};
//!
//! let store = FileStore::at_path("/srv/backup/store").unwrap();
//!
//! // Chunk and store a stream
//! let input = std::fs::File::open("disk.img").unwrap();
//! let hashes = store.chunker().export(input).unwrap();
//!
//! // Ask which blocks a peer's list still needs
//! let missing = store.missing_blocks(&hashes);
//! assert!(missing.is_empty());
//!
//! // Put the stream back together
//! let output = std::fs::File::create("disk.img.restored").unwrap();
//! store.chunker().restore(&hashes, output).unwrap();
//! ```
//!
//! # Configuration
//!
//! [`StoreConfig`] carries the tunables (block size, block directory name,
//! permission modes, read verification). It loads from `BLOCKFS_*`
//! environment variables or a `[blockfs]` TOML section.
//!
//! # Concurrency
//!
//! - Block files are written to a temp file and renamed into place
//! - Readers see a block as absent or complete, never partial
//! - Writers racing on one checksum produce the same bytes
//! - No locking required

pub mod block;
pub mod checksum;
pub mod chunker;
pub mod config;
pub mod error;
pub mod memory;
pub mod store;

// Re-exports for convenience
pub use block::{Block, DEFAULT_BLOCK_SIZE};
pub use checksum::{Checksum, ChecksumError, HashList};
pub use chunker::Chunker;
pub use config::StoreConfig;
pub use error::{Error, ExportError, Result};
pub use memory::MemoryStore;
pub use store::{BlockStore, FileStore};
