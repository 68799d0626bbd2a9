//! Error types for the block store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::checksum::{Checksum, ChecksumError, HashList};

/// Result type alias for block store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in block store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The store root or its block directory could not be created or opened.
    #[error("failed to initialize block store at {path}: {source}")]
    Init { path: PathBuf, source: io::Error },

    /// A block file could not be written or read.
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// No block has ever been stored under this checksum.
    #[error("block not found: {0}")]
    NotFound(Checksum),

    /// A stored block does not match its checksum.
    #[error("corrupted block {checksum}: {reason}")]
    Corrupted { checksum: Checksum, reason: String },

    /// A block is larger than the store's block size.
    ///
    /// Returned by writes that would exceed the limit, and by reads of an
    /// intact block that was stored under a larger limit.
    #[error("block {checksum} is {size} bytes, over the {limit}-byte block size")]
    TooLarge {
        checksum: Checksum,
        size: u64,
        limit: usize,
    },

    /// Write attempted on a store opened read-only.
    #[error("block store is in read-only mode")]
    ReadOnly,

    /// Reading the input stream failed.
    #[error("stream read failed: {0}")]
    Stream(#[source] io::Error),

    /// Writing reassembled output failed.
    #[error("output write failed: {0}")]
    Output(#[source] io::Error),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

impl Error {
    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// An export that stopped early.
///
/// `hashes` holds every checksum confirmed written before the failure, in
/// stream order. Those blocks stay valid and addressable.
#[derive(Debug, Error)]
#[error("export failed after {} block(s): {source}", .hashes.len())]
pub struct ExportError {
    pub hashes: HashList,
    #[source]
    pub source: Error,
}

impl ExportError {
    /// Split into the partial hash list and the underlying error.
    pub fn into_parts(self) -> (HashList, Error) {
        (self.hashes, self.source)
    }
}
