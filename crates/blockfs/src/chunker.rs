//! Chunker: cuts a byte stream into fixed-size blocks and stores them.
//!
//! Boundaries fall purely on byte offsets (every `block_size` bytes), not on
//! content. Only the final block of a stream may be shorter.

use std::io::{self, Read, Write};

use tracing::{debug, info};

use crate::block::{Block, DEFAULT_BLOCK_SIZE};
use crate::checksum::HashList;
use crate::error::{Error, ExportError, Result};
use crate::store::{BlockStore, FileStore};

/// Splits streams into blocks written to a [`BlockStore`].
#[derive(Debug)]
pub struct Chunker<'a, S: BlockStore + ?Sized> {
    store: &'a S,
    block_size: usize,
}

impl<'a, S: BlockStore + ?Sized> Chunker<'a, S> {
    /// Chunk with the store's block size, or 2 MiB for an unbounded store.
    pub fn new(store: &'a S) -> Self {
        let block_size = store.max_block_size().unwrap_or(DEFAULT_BLOCK_SIZE);
        Self::with_block_size(store, block_size)
    }

    /// Chunk with a custom block size.
    ///
    /// Clamped to the store's [`BlockStore::max_block_size`] so every window
    /// can be read back. Zero is treated as one byte.
    pub fn with_block_size(store: &'a S, block_size: usize) -> Self {
        let block_size = match store.max_block_size() {
            Some(max) if block_size > max => {
                debug!(requested = block_size, max, "clamping chunk size to store limit");
                max
            }
            _ => block_size,
        };
        Self {
            store,
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Read `reader` to the end, storing one block per window.
    ///
    /// Returns the checksums in stream order. On failure the error carries
    /// every checksum written so far; a block whose write failed is not
    /// included, so each returned checksum is retrievable from the store.
    ///
    /// If the stream fails mid-window, the bytes already read are still
    /// stored as a final block before the error is returned.
    pub fn export<R: Read>(&self, mut reader: R) -> std::result::Result<HashList, ExportError> {
        let mut hashes = HashList::new();
        let mut buffer = vec![0u8; self.block_size];
        let mut total: u64 = 0;

        loop {
            let (filled, read_err) = fill_window(&mut reader, &mut buffer);

            if filled > 0 {
                let block = Block::new(&buffer[..filled]);
                if let Err(source) = self.store.write(&block) {
                    return Err(ExportError { hashes, source });
                }
                debug!(
                    index = hashes.len(),
                    checksum = block.checksum().short(),
                    size = filled,
                    "exported block"
                );
                hashes.push(block.checksum().clone());
                total += filled as u64;
            }

            if let Some(e) = read_err {
                return Err(ExportError {
                    hashes,
                    source: Error::Stream(e),
                });
            }

            // A short window means the stream hit EOF.
            if filled < self.block_size {
                break;
            }
        }

        info!(blocks = hashes.len(), bytes = total, "export complete");
        Ok(hashes)
    }

    /// Write the blocks named by `hashes`, in order, to `writer`.
    ///
    /// Returns the number of bytes written. Stops at the first block that
    /// can't be read or written.
    pub fn restore<W: Write>(&self, hashes: &HashList, mut writer: W) -> Result<u64> {
        let mut total: u64 = 0;
        for checksum in hashes {
            let block = self.store.read(checksum)?;
            writer.write_all(block.data()).map_err(Error::Output)?;
            total += block.len() as u64;
        }
        writer.flush().map_err(Error::Output)?;

        info!(blocks = hashes.len(), bytes = total, "restore complete");
        Ok(total)
    }
}

impl FileStore {
    /// A chunker using this store's configured block size.
    pub fn chunker(&self) -> Chunker<'_, FileStore> {
        Chunker::new(self)
    }
}

/// Read until `buf` is full, the reader reports EOF, or a hard error occurs.
///
/// Returns the number of bytes read alongside any hard error; `Interrupted`
/// is retried.
fn fill_window<R: Read>(reader: &mut R, buf: &mut [u8]) -> (usize, Option<io::Error>) {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (filled, Some(e)),
        }
    }
    (filled, None)
}
